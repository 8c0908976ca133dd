pub mod animated;
pub mod animation;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod guard;
pub mod predraw;
pub mod provider;
pub mod sizer;

mod filler;

pub use animated::{size_for_image, AnimatedImage, ImageExtent, ImageHandle};
pub use animation::{Animation, AnimationConfig, AnimationFrame};
pub use cache::{CacheStats, FrameCache, POSTER_FRAME_INDEX};
pub use config::{CacheConfig, MemoryBudget};
pub use diagnostics::{LogConfig, LogLevel};
pub use error::{AnimError, AnimResult};
pub use format::{AnimationHeader, ANIM_MAGIC};
pub use provider::{provider_for_data, ContainerProvider, Frame, FrameProvider, GifProvider};
pub use sizer::FrameSizer;

pub const VERSION: &str = "3.2.1";
