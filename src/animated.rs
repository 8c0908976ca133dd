use crate::anim_log;
use crate::cache::{CacheStats, FrameCache, POSTER_FRAME_INDEX};
use crate::config::CacheConfig;
use crate::diagnostics::LogLevel;
use crate::error::{AnimError, AnimResult};
use crate::guard::{Owner, WeakProxy};
use crate::predraw::prepare_frame;
use crate::provider::{provider_for_data, Frame, FrameProvider};
use crate::sizer::FrameSizer;
use image::{DynamicImage, RgbaImage};
use std::sync::Arc;
use std::time::Duration;

/// Delays shorter than this are treated as unset, the way browsers do.
pub const DELAY_TIME_MINIMUM: Duration = Duration::from_millis(20);
pub const DELAY_TIME_DEFAULT: Duration = Duration::from_millis(100);

/// A multi-frame image that decodes lazily and caches an adaptive window of frames.
///
/// `poster_image`, `size`, `loop_count`, `delay_times_for_indexes` and `frame_count`
/// never change after construction. Frames are fetched with [`lookup`](Self::lookup)
/// from the display loop; it never blocks and returns `None` until the background
/// filler has produced the frame.
pub struct AnimatedImage {
    poster_image: Frame,
    size: (u32, u32),
    loop_count: u32,
    frame_count: usize,
    delay_times: Arc<[Duration]>,
    data: Option<Arc<[u8]>>,
    provider: Arc<dyn FrameProvider>,
    predrawing: bool,
    cache: Owner<FrameCache>,
}

impl AnimatedImage {
    pub fn from_data(data: &[u8]) -> AnimResult<Self> {
        Self::from_data_with_config(data, &CacheConfig::default())
    }

    pub fn from_data_with_config(data: &[u8], config: &CacheConfig) -> AnimResult<Self> {
        let built = provider_for_data(data)
            .and_then(|provider| Self::build(provider, Some(Arc::from(data)), config));
        log_construction_failure(built)
    }

    pub fn from_provider(provider: Arc<dyn FrameProvider>) -> AnimResult<Self> {
        Self::from_provider_with_config(provider, &CacheConfig::default())
    }

    pub fn from_provider_with_config(
        provider: Arc<dyn FrameProvider>,
        config: &CacheConfig,
    ) -> AnimResult<Self> {
        log_construction_failure(Self::build(provider, None, config))
    }

    fn build(
        provider: Arc<dyn FrameProvider>,
        data: Option<Arc<[u8]>>,
        config: &CacheConfig,
    ) -> AnimResult<Self> {
        let frame_count = provider.frame_count();
        if frame_count == 0 {
            return Err(AnimError::NoFrames);
        }
        let (width, height) = provider.size();
        if width == 0 || height == 0 {
            return Err(AnimError::ZeroSize { width, height });
        }

        let poster = provider.decoded_frame(POSTER_FRAME_INDEX)?;
        let poster_image = prepare_frame(poster, config.predrawing);
        let delay_times: Arc<[Duration]> = (0..frame_count)
            .map(|index| normalize_delay(provider.delay_time(index)))
            .collect();

        let bytes_per_frame = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        let optimal = FrameSizer::new(config.memory_budget).compute_initial_cache_size(
            frame_count,
            bytes_per_frame,
            config.optimal_frame_cache_size,
        );
        let cache = FrameCache::spawn(Arc::clone(&provider), optimal, config)?;
        cache.store(POSTER_FRAME_INDEX, Arc::clone(&poster_image))?;

        anim_log!(
            LogLevel::Info,
            "Animated image {}x{}, {} frames, loop count {}, frame cache size {}",
            width,
            height,
            frame_count,
            provider.loop_count(),
            cache.frame_cache_size_current()
        );

        Ok(Self {
            poster_image,
            size: (width, height),
            loop_count: provider.loop_count(),
            frame_count,
            delay_times,
            data,
            provider,
            predrawing: config.predrawing,
            cache: Owner::new(cache),
        })
    }

    pub fn poster_image(&self) -> &Frame {
        &self.poster_image
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Display duration of every frame, indexed by frame number.
    pub fn delay_times_for_indexes(&self) -> &[Duration] {
        &self.delay_times
    }

    pub fn delay_time(&self, index: usize) -> Option<Duration> {
        self.delay_times.get(index).copied()
    }

    pub fn total_duration(&self) -> Duration {
        self.delay_times.iter().sum()
    }

    /// The encoded bytes this image was created from, if any.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    pub fn provider(&self) -> &Arc<dyn FrameProvider> {
        &self.provider
    }

    pub fn is_predrawing_enabled(&self) -> bool {
        self.predrawing
    }

    pub fn lookup(&self, index: usize) -> Option<Frame> {
        self.cache.lookup(index)
    }

    /// Decodes `index` right now, bypassing the cache. May block.
    pub fn image_at_index(&self, index: usize) -> AnimResult<Frame> {
        if index >= self.frame_count {
            return Err(AnimError::IndexOutOfRange {
                index,
                frame_count: self.frame_count,
            });
        }
        if index == POSTER_FRAME_INDEX {
            return Ok(Arc::clone(&self.poster_image));
        }
        let image = self.provider.decoded_frame(index)?;
        Ok(prepare_frame(image, self.predrawing))
    }

    pub fn frame_cache_size_current(&self) -> usize {
        self.cache.frame_cache_size_current()
    }

    pub fn frame_cache_size_max(&self) -> usize {
        self.cache.frame_cache_size_max()
    }

    /// 0 removes the cap.
    pub fn set_frame_cache_size_max(&self, max: usize) {
        self.cache.set_max_size(max);
    }

    pub fn frame_cache_size_optimal(&self) -> usize {
        self.cache.frame_cache_size_optimal()
    }

    pub fn handle_memory_pressure(&self) {
        self.cache.handle_memory_pressure();
    }

    pub fn relieve_memory_pressure(&self) {
        self.cache.relieve_memory_pressure();
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// A handle for timers and display drivers that does not keep the image alive.
    pub fn handle(&self) -> ImageHandle {
        ImageHandle {
            cache: self.cache.proxy(),
            delay_times: Arc::clone(&self.delay_times),
            loop_count: self.loop_count,
        }
    }
}

impl std::fmt::Debug for AnimatedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimatedImage")
            .field("size", &self.size)
            .field("frame_count", &self.frame_count)
            .field("loop_count", &self.loop_count)
            .field("predrawing", &self.predrawing)
            .finish_non_exhaustive()
    }
}

/// Weak reference to an [`AnimatedImage`]'s frames. Every call returns `None` once
/// the image has been dropped.
#[derive(Clone)]
pub struct ImageHandle {
    cache: WeakProxy<FrameCache>,
    delay_times: Arc<[Duration]>,
    loop_count: u32,
}

impl ImageHandle {
    pub fn lookup(&self, index: usize) -> Option<Frame> {
        self.cache.with(|cache| cache.lookup(index)).flatten()
    }

    pub fn is_failed(&self, index: usize) -> Option<bool> {
        self.cache.with(|cache| cache.is_failed(index))
    }

    pub fn frame_count(&self) -> Option<usize> {
        self.cache.with(|cache| cache.frame_count())
    }

    pub fn delay_time(&self, index: usize) -> Option<Duration> {
        if !self.cache.is_alive() {
            return None;
        }
        self.delay_times.get(index).copied()
    }

    pub fn loop_count(&self) -> Option<u32> {
        self.cache.is_alive().then_some(self.loop_count)
    }

    pub fn is_alive(&self) -> bool {
        self.cache.is_alive()
    }
}

/// Anything with a pixel size: still images and animated images alike.
pub trait ImageExtent {
    fn extent(&self) -> (u32, u32);
}

impl ImageExtent for RgbaImage {
    fn extent(&self) -> (u32, u32) {
        self.dimensions()
    }
}

impl ImageExtent for DynamicImage {
    fn extent(&self) -> (u32, u32) {
        (self.width(), self.height())
    }
}

impl ImageExtent for AnimatedImage {
    fn extent(&self) -> (u32, u32) {
        self.size
    }
}

pub fn size_for_image<I: ImageExtent + ?Sized>(image: &I) -> (u32, u32) {
    image.extent()
}

fn normalize_delay(delay: Duration) -> Duration {
    if delay < DELAY_TIME_MINIMUM {
        DELAY_TIME_DEFAULT
    } else {
        delay
    }
}

fn log_construction_failure(result: AnimResult<AnimatedImage>) -> AnimResult<AnimatedImage> {
    if let Err(e) = &result {
        anim_log!(LogLevel::Error, "Failed to create animated image: {}", e);
    }
    result
}
