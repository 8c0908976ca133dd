use crate::error::{AnimError, AnimResult};
use serde::{Deserialize, Serialize};

pub const FORMAT_VERSION: u16 = 1;

/// Largest width or height a container may declare.
pub const MAX_DIMENSION: u32 = 16_384;

/// RGBA8 byte length of a `width` x `height` frame, `None` on overflow.
pub fn frame_byte_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(4)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationHeader {
    pub version: u16,
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
    pub loop_count: u32,
    pub background_color: [u8; 4],
}

impl AnimationHeader {
    pub fn new(width: u32, height: u32, frame_count: u32, loop_count: u32) -> Self {
        Self {
            version: FORMAT_VERSION,
            width,
            height,
            frame_count,
            loop_count,
            background_color: [0, 0, 0, 0],
        }
    }

    pub fn bytes_per_frame(&self) -> Option<usize> {
        frame_byte_len(self.width, self.height)
    }

    /// Checks the declared canvas and returns the byte length of one frame.
    pub fn validate_dimensions(&self) -> AnimResult<usize> {
        if self.width == 0 || self.height == 0 {
            return Err(AnimError::InvalidFormat(format!(
                "Empty canvas {}x{}",
                self.width, self.height
            )));
        }
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(AnimError::InvalidFormat(format!(
                "Canvas {}x{} exceeds the {} pixel limit",
                self.width, self.height, MAX_DIMENSION
            )));
        }
        self.bytes_per_frame().ok_or_else(|| {
            AnimError::InvalidFormat(format!(
                "Canvas {}x{} is too large to address",
                self.width, self.height
            ))
        })
    }

    pub fn encode(&self) -> AnimResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| AnimError::MetadataError(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> AnimResult<Self> {
        let header: Self =
            bincode::deserialize(data).map_err(|e| AnimError::MetadataError(e.to_string()))?;
        if header.version != FORMAT_VERSION {
            return Err(AnimError::UnsupportedFormat(format!(
                "WKA1 container version {}",
                header.version
            )));
        }
        Ok(header)
    }
}
