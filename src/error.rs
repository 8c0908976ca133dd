use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid animation data: {0}")]
    InvalidFormat(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("CRC mismatch: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("Metadata error: {0}")]
    MetadataError(String),

    #[error("Animation contains no frames")]
    NoFrames,

    #[error("Animation has zero size ({width}x{height})")]
    ZeroSize { width: u32, height: u32 },

    #[error("Failed to decode frame {index}: {reason}")]
    FrameDecode { index: usize, reason: String },

    #[error("Frame index {index} out of range (frame count {frame_count})")]
    IndexOutOfRange { index: usize, frame_count: usize },

    #[error("Diagnostics were already initialized")]
    LoggingAlreadyInitialized,
}

impl AnimError {
    pub fn frame_decode(index: usize, reason: impl ToString) -> Self {
        Self::FrameDecode {
            index,
            reason: reason.to_string(),
        }
    }
}

pub type AnimResult<T> = Result<T, AnimError>;
