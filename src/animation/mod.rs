pub mod frame;

pub use frame::{AnimationConfig, AnimationFrame, DEFAULT_FRAME_DELAY_MS};

use crate::error::{AnimError, AnimResult};
use crate::format::{AnimationHeader, Chunk, ChunkType, ChunkWriter};
use serde::{Deserialize, Serialize};

/// An in-memory animation that can be packed into a WKA1 container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Animation {
    pub config: AnimationConfig,
    pub frames: Vec<AnimationFrame>,
}

impl Animation {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            config: AnimationConfig::new(width, height),
            frames: Vec::new(),
        }
    }

    pub fn with_loop_count(mut self, count: u32) -> Self {
        self.config.loop_count = count;
        self
    }

    pub fn infinite_loop(mut self) -> Self {
        self.config.loop_count = 0;
        self
    }

    pub fn with_background(mut self, rgba: [u8; 4]) -> Self {
        self.config.background_color = rgba;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.config.compression_level = level.min(9);
        self
    }

    pub fn add_frame(&mut self, frame: AnimationFrame) -> AnimResult<()> {
        let expected = self.config.frame_len();
        if frame.pixels.len() != expected {
            return Err(AnimError::InvalidFormat(format!(
                "Frame {} has {} bytes, expected {} for {}x{} RGBA",
                self.frames.len(),
                frame.pixels.len(),
                expected,
                self.config.width,
                self.config.height
            )));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn total_duration_ms(&self) -> u32 {
        self.frames.iter().map(|f| f.delay_ms).sum()
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn encode(&self) -> AnimResult<Vec<u8>> {
        if self.frames.is_empty() {
            return Err(AnimError::NoFrames);
        }
        let frame_count = u32::try_from(self.frames.len())
            .map_err(|_| AnimError::InvalidFormat("Too many frames".into()))?;

        let mut header = AnimationHeader::new(
            self.config.width,
            self.config.height,
            frame_count,
            self.config.loop_count,
        );
        header.background_color = self.config.background_color;

        let mut writer = ChunkWriter::new(Vec::new());
        writer.write_chunk(&Chunk::new(ChunkType::Header, header.encode()?))?;
        for frame in &self.frames {
            writer.write_chunk(&frame.to_chunk(self.config.compression_level)?)?;
        }
        writer.finish()
    }
}
