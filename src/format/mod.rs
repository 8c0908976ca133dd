pub mod chunk;
pub mod header;
pub mod payload;

pub use chunk::{Chunk, ChunkReader, ChunkType, ChunkWriter, ANIM_MAGIC};
pub use header::{frame_byte_len, AnimationHeader, MAX_DIMENSION};
pub use payload::{compress_pixels, decompress_pixels};
