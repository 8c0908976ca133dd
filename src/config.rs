use crate::sizer::MEGABYTE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBudget {
    /// Decoded footprint at or below which every frame is kept.
    pub cache_all_bytes: usize,
    /// Decoded footprint at or below which the default window is used.
    pub default_window_bytes: usize,
}

impl MemoryBudget {
    pub fn new(cache_all_bytes: usize, default_window_bytes: usize) -> Self {
        Self {
            cache_all_bytes,
            default_window_bytes: default_window_bytes.max(cache_all_bytes),
        }
    }
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self::new(10 * MEGABYTE, 75 * MEGABYTE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub optimal_frame_cache_size: usize,
    pub frame_cache_size_max: usize,
    pub predrawing: bool,
    pub memory_budget: MemoryBudget,
    pub grow_delay: Duration,
    pub reset_delay: Duration,
    pub max_grow_attempts: u32,
    pub request_queue_capacity: usize,
    pub completion_queue_capacity: usize,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self {
            optimal_frame_cache_size: 0,
            frame_cache_size_max: 0,
            predrawing: true,
            memory_budget: MemoryBudget::default(),
            grow_delay: Duration::from_secs(2),
            reset_delay: Duration::from_secs(3),
            max_grow_attempts: 2,
            request_queue_capacity: 8,
            completion_queue_capacity: 16,
        }
    }

    pub fn with_optimal_frame_cache_size(mut self, size: usize) -> Self {
        self.optimal_frame_cache_size = size;
        self
    }

    pub fn with_frame_cache_size_max(mut self, max: usize) -> Self {
        self.frame_cache_size_max = max;
        self
    }

    pub fn with_predrawing(mut self, enabled: bool) -> Self {
        self.predrawing = enabled;
        self
    }

    pub fn with_memory_budget(mut self, budget: MemoryBudget) -> Self {
        self.memory_budget = budget;
        self
    }

    pub fn with_relief_delays(mut self, grow_delay: Duration, reset_delay: Duration) -> Self {
        self.grow_delay = grow_delay;
        self.reset_delay = reset_delay;
        self
    }

    pub fn with_max_grow_attempts(mut self, attempts: u32) -> Self {
        self.max_grow_attempts = attempts;
        self
    }

    pub fn with_queue_capacities(mut self, requests: usize, completions: usize) -> Self {
        self.request_queue_capacity = requests.max(1);
        self.completion_queue_capacity = completions.max(1);
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.optimal_frame_cache_size, 0);
        assert_eq!(config.frame_cache_size_max, 0);
        assert!(config.predrawing);
        assert_eq!(config.memory_budget.cache_all_bytes, 10 * MEGABYTE);
    }

    #[test]
    fn test_queue_capacities_never_zero() {
        let config = CacheConfig::new().with_queue_capacities(0, 0);
        assert_eq!(config.request_queue_capacity, 1);
        assert_eq!(config.completion_queue_capacity, 1);
    }

    #[test]
    fn test_config_roundtrips_through_bincode() {
        let config = CacheConfig::new()
            .with_optimal_frame_cache_size(7)
            .with_predrawing(false);
        let bytes = bincode::serialize(&config).unwrap();
        let decoded: CacheConfig = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.optimal_frame_cache_size, 7);
        assert!(!decoded.predrawing);
        assert_eq!(decoded.grow_delay, Duration::from_secs(2));
    }
}
