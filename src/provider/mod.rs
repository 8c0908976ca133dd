pub mod container;
pub mod gif;

pub use container::ContainerProvider;
pub use gif::GifProvider;

use crate::error::{AnimError, AnimResult};
use crate::format::ANIM_MAGIC;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::sync::Arc;
use std::time::Duration;

/// A decoded, presentation-ready frame. Cloning is cheap.
pub type Frame = Arc<RgbaImage>;

/// Source of decoded frames for an animated image.
///
/// `decoded_frame` may be slow; it is called from the background filler and from
/// explicit synchronous decodes, never from a cached lookup.
pub trait FrameProvider: Send + Sync {
    fn frame_count(&self) -> usize;

    fn size(&self) -> (u32, u32);

    /// 0 means repeat forever.
    fn loop_count(&self) -> u32;

    fn delay_time(&self, index: usize) -> Duration;

    fn decoded_frame(&self, index: usize) -> AnimResult<DynamicImage>;
}

/// Picks a provider for raw encoded bytes: WKA1 containers by magic, GIF otherwise.
pub fn provider_for_data(data: &[u8]) -> AnimResult<Arc<dyn FrameProvider>> {
    if data.is_empty() {
        return Err(AnimError::InvalidFormat("No image data".into()));
    }
    if data.starts_with(ANIM_MAGIC) {
        return Ok(Arc::new(ContainerProvider::from_bytes(data)?));
    }

    match image::guess_format(data)? {
        ImageFormat::Gif => Ok(Arc::new(GifProvider::from_bytes(data)?)),
        other => Err(AnimError::UnsupportedFormat(format!("{:?}", other))),
    }
}
