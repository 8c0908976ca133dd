use crate::error::{AnimError, AnimResult};
use crate::format::{compress_pixels, Chunk, ChunkType};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationConfig {
    pub width: u32,
    pub height: u32,
    pub loop_count: u32,
    pub background_color: [u8; 4],
    pub compression_level: u32,
}

impl AnimationConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            loop_count: 0,
            background_color: [0, 0, 0, 0],
            compression_level: 6,
        }
    }

    pub fn frame_len(&self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }
}

/// One full-canvas RGBA8 frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationFrame {
    pub delay_ms: u32,
    pub pixels: Vec<u8>,
}

impl AnimationFrame {
    pub fn new(pixels: Vec<u8>) -> Self {
        Self {
            delay_ms: DEFAULT_FRAME_DELAY_MS,
            pixels,
        }
    }

    pub fn from_image(image: &DynamicImage) -> Self {
        Self::new(image.to_rgba8().into_raw())
    }

    pub fn with_delay(mut self, delay_ms: u32) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms as u64)
    }

    pub(crate) fn to_chunk(&self, compression_level: u32) -> AnimResult<Chunk> {
        let payload = compress_pixels(&self.pixels, compression_level)?;
        let mut data = Vec::with_capacity(payload.len() + 4);
        data.write_u32::<LittleEndian>(self.delay_ms)?;
        data.extend_from_slice(&payload);
        Ok(Chunk::new(ChunkType::Frame, data))
    }
}

/// Splits a FRMD chunk body into its delay and the still-compressed pixels.
pub(crate) fn split_frame_chunk(data: &[u8]) -> AnimResult<(u32, &[u8])> {
    if data.len() < 4 {
        return Err(AnimError::InvalidChunk(format!(
            "Frame chunk too short: {} bytes",
            data.len()
        )));
    }
    let mut head = &data[..4];
    let delay_ms = head.read_u32::<LittleEndian>()?;
    Ok((delay_ms, &data[4..]))
}
