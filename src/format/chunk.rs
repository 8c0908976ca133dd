use crate::error::{AnimError, AnimResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub const ANIM_MAGIC: &[u8; 8] = b"WKA1\r\n\x1a\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    Header,
    Frame,
    End,
}

impl ChunkType {
    pub fn as_bytes(&self) -> [u8; 4] {
        match self {
            Self::Header => *b"AHDR",
            Self::Frame => *b"FRMD",
            Self::End => *b"IEND",
        }
    }

    pub fn from_bytes(bytes: &[u8; 4]) -> AnimResult<Self> {
        match bytes {
            b"AHDR" => Ok(Self::Header),
            b"FRMD" => Ok(Self::Frame),
            b"IEND" => Ok(Self::End),
            _ => Err(AnimError::InvalidChunk(format!(
                "Unknown chunk: {:?}",
                String::from_utf8_lossy(bytes)
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub chunk_type: ChunkType,
    pub data: Vec<u8>,
    pub crc: u32,
}

impl Chunk {
    pub fn new(chunk_type: ChunkType, data: Vec<u8>) -> Self {
        let crc = Self::compute_crc(&chunk_type, &data);
        Self {
            chunk_type,
            data,
            crc,
        }
    }

    fn compute_crc(chunk_type: &ChunkType, data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&chunk_type.as_bytes());
        hasher.update(data);
        hasher.finalize()
    }

    pub fn verify_crc(&self) -> bool {
        Self::compute_crc(&self.chunk_type, &self.data) == self.crc
    }
}

pub struct ChunkReader<R: Read> {
    reader: R,
    magic_verified: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            magic_verified: false,
        }
    }

    pub fn verify_magic(&mut self) -> AnimResult<()> {
        let mut magic = [0u8; 8];
        self.reader.read_exact(&mut magic)?;
        if &magic != ANIM_MAGIC {
            return Err(AnimError::InvalidFormat(
                "Invalid magic number. Not a WKA1 animation.".into(),
            ));
        }
        self.magic_verified = true;
        Ok(())
    }

    pub fn read_chunk(&mut self) -> AnimResult<Chunk> {
        if !self.magic_verified {
            self.verify_magic()?;
        }

        let mut type_bytes = [0u8; 4];
        self.reader.read_exact(&mut type_bytes)?;
        let chunk_type = ChunkType::from_bytes(&type_bytes)?;

        let size = self.reader.read_u32::<LittleEndian>()? as usize;
        let mut data = Vec::new();
        (&mut self.reader).take(size as u64).read_to_end(&mut data)?;
        if data.len() != size {
            return Err(AnimError::InvalidChunk(format!(
                "Truncated {:?} chunk: expected {} bytes, got {}",
                chunk_type,
                size,
                data.len()
            )));
        }

        let crc = self.reader.read_u32::<LittleEndian>()?;
        let chunk = Chunk {
            chunk_type,
            data,
            crc,
        };

        if !chunk.verify_crc() {
            return Err(AnimError::CrcMismatch {
                expected: chunk.crc,
                actual: Chunk::compute_crc(&chunk.chunk_type, &chunk.data),
            });
        }

        Ok(chunk)
    }

    pub fn read_all_chunks(&mut self) -> AnimResult<Vec<Chunk>> {
        let mut chunks = Vec::new();
        loop {
            let chunk = self.read_chunk()?;
            let is_end = chunk.chunk_type == ChunkType::End;
            chunks.push(chunk);
            if is_end {
                break;
            }
        }
        Ok(chunks)
    }
}

pub struct ChunkWriter<W: Write> {
    writer: W,
    magic_written: bool,
}

impl<W: Write> ChunkWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            magic_written: false,
        }
    }

    pub fn write_chunk(&mut self, chunk: &Chunk) -> AnimResult<()> {
        if !self.magic_written {
            self.writer.write_all(ANIM_MAGIC)?;
            self.magic_written = true;
        }

        let len = u32::try_from(chunk.data.len()).map_err(|_| {
            AnimError::InvalidChunk(format!("{:?} chunk exceeds 4 GiB", chunk.chunk_type))
        })?;
        self.writer.write_all(&chunk.chunk_type.as_bytes())?;
        self.writer.write_u32::<LittleEndian>(len)?;
        self.writer.write_all(&chunk.data)?;
        self.writer.write_u32::<LittleEndian>(chunk.crc)?;
        Ok(())
    }

    pub fn finish(mut self) -> AnimResult<W> {
        self.write_chunk(&Chunk::new(ChunkType::End, Vec::new()))?;
        Ok(self.writer)
    }
}
