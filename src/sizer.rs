use crate::config::MemoryBudget;

pub const FRAME_CACHE_SIZE_NO_LIMIT: usize = 0;
pub const FRAME_CACHE_SIZE_LOW_MEMORY: usize = 1;
pub const FRAME_CACHE_SIZE_GROW_AFTER_MEMORY_WARNING: usize = 2;
pub const FRAME_CACHE_SIZE_DEFAULT: usize = 5;

pub const MEGABYTE: usize = 1024 * 1024;

/// Chooses how many decoded frames to keep around.
///
/// Small animations are cached whole so playback costs no CPU after the first loop;
/// heavy ones fall back to a short window, or a single frame, to bound memory.
#[derive(Debug, Clone, Default)]
pub struct FrameSizer {
    budget: MemoryBudget,
}

impl FrameSizer {
    pub fn new(budget: MemoryBudget) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> &MemoryBudget {
        &self.budget
    }

    pub fn compute_initial_cache_size(
        &self,
        frame_count: usize,
        bytes_per_frame: usize,
        requested_optimal_size: usize,
    ) -> usize {
        if requested_optimal_size > 0 {
            return clamp_to_frames(requested_optimal_size, frame_count);
        }

        let total_bytes = bytes_per_frame.saturating_mul(frame_count);
        let size = if total_bytes <= self.budget.cache_all_bytes {
            frame_count
        } else if total_bytes <= self.budget.default_window_bytes {
            FRAME_CACHE_SIZE_DEFAULT
        } else {
            FRAME_CACHE_SIZE_LOW_MEMORY
        };
        clamp_to_frames(size, frame_count)
    }

    pub fn shrink_under_pressure(&self, current: usize) -> usize {
        FRAME_CACHE_SIZE_LOW_MEMORY.min(current).max(1)
    }

    pub fn grow_if_under_budget(&self, current: usize, frame_count: usize, max: usize) -> usize {
        let mut grown = current
            .saturating_mul(2)
            .max(FRAME_CACHE_SIZE_GROW_AFTER_MEMORY_WARNING);
        if max != FRAME_CACHE_SIZE_NO_LIMIT {
            grown = grown.min(max);
        }
        clamp_to_frames(grown, frame_count)
    }

    /// Current window from the optimal size and the user and pressure caps (0 = no cap).
    pub fn clamp_window(
        &self,
        optimal: usize,
        max: usize,
        internal_max: usize,
        frame_count: usize,
    ) -> usize {
        let mut size = optimal;
        for cap in [max, internal_max] {
            if cap != FRAME_CACHE_SIZE_NO_LIMIT {
                size = size.min(cap);
            }
        }
        clamp_to_frames(size, frame_count)
    }
}

fn clamp_to_frames(size: usize, frame_count: usize) -> usize {
    size.clamp(1, frame_count.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_size_is_clamped() {
        let sizer = FrameSizer::default();
        assert_eq!(sizer.compute_initial_cache_size(30, 4, 5), 5);
        assert_eq!(sizer.compute_initial_cache_size(3, 4, 5), 3);
    }

    #[test]
    fn test_small_animation_cached_whole() {
        let sizer = FrameSizer::default();
        // 100x100 RGBA, 20 frames: well under 10 MB
        assert_eq!(sizer.compute_initial_cache_size(20, 100 * 100 * 4, 0), 20);
    }

    #[test]
    fn test_medium_animation_uses_default_window() {
        let sizer = FrameSizer::default();
        // 500x500 RGBA = 1 MB per frame, 40 frames = 40 MB
        assert_eq!(
            sizer.compute_initial_cache_size(40, 500 * 500 * 4, 0),
            FRAME_CACHE_SIZE_DEFAULT
        );
    }

    #[test]
    fn test_heavy_animation_uses_low_memory_window() {
        let sizer = FrameSizer::default();
        // 2000x2000 RGBA = 16 MB per frame
        assert_eq!(
            sizer.compute_initial_cache_size(50, 2000 * 2000 * 4, 0),
            FRAME_CACHE_SIZE_LOW_MEMORY
        );
    }

    #[test]
    fn test_default_window_clamped_to_frame_count() {
        let sizer = FrameSizer::new(MemoryBudget::new(0, 100 * MEGABYTE));
        assert_eq!(sizer.compute_initial_cache_size(3, MEGABYTE, 0), 3);
    }

    #[test]
    fn test_shrink_never_below_one() {
        let sizer = FrameSizer::default();
        assert_eq!(sizer.shrink_under_pressure(10), 1);
        assert_eq!(sizer.shrink_under_pressure(1), 1);
        assert_eq!(sizer.shrink_under_pressure(0), 1);
    }

    #[test]
    fn test_grow_respects_caps() {
        let sizer = FrameSizer::default();
        assert_eq!(sizer.grow_if_under_budget(1, 30, 0), 2);
        assert_eq!(sizer.grow_if_under_budget(2, 30, 0), 4);
        assert_eq!(sizer.grow_if_under_budget(8, 30, 6), 6);
        assert_eq!(sizer.grow_if_under_budget(20, 30, 0), 30);
    }

    #[test]
    fn test_clamp_window() {
        let sizer = FrameSizer::default();
        assert_eq!(sizer.clamp_window(10, 0, 0, 30), 10);
        assert_eq!(sizer.clamp_window(10, 4, 0, 30), 4);
        assert_eq!(sizer.clamp_window(10, 4, 2, 30), 2);
        assert_eq!(sizer.clamp_window(10, 0, 0, 6), 6);
    }
}
