//! Windowed frame cache shared between the presentation thread and the filler.
//!
//! The window is the `frame_cache_size_current` indices starting at the cursor (the
//! last looked-up index) and walking forward, wrapping at `frame_count` so looped
//! playback can read ahead across the end. Everything outside the window except the
//! poster frame is eligible for eviction.

use crate::anim_log;
use crate::config::CacheConfig;
use crate::diagnostics::LogLevel;
use crate::error::{AnimError, AnimResult};
use crate::filler::{BackgroundFiller, FillCompletion, FillOutcome, FillWorker};
use crate::guard::{Lifecycle, Teardown, WeakProxy};
use crate::provider::{Frame, FrameProvider};
use crate::sizer::{FrameSizer, FRAME_CACHE_SIZE_NO_LIMIT};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub const POSTER_FRAME_INDEX: usize = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub decode_failures: u64,
    pub memory_warnings: u32,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct PressureState {
    /// Cap imposed by memory pressure; 0 when none.
    internal_max: usize,
    warnings: u32,
    next_step_at: Option<Instant>,
}

struct CacheState {
    frames: HashMap<usize, Frame>,
    cursor: usize,
    optimal: usize,
    max: usize,
    current: usize,
    pressure: PressureState,
    in_flight: HashSet<usize>,
    failed: HashSet<usize>,
    completions: Receiver<FillCompletion>,
    filler: BackgroundFiller,
    stats: CacheStats,
}

pub struct FrameCache {
    frame_count: usize,
    sizer: FrameSizer,
    grow_delay: Duration,
    reset_delay: Duration,
    max_grow_attempts: u32,
    state: Mutex<CacheState>,
    lifecycle: Lifecycle,
}

impl FrameCache {
    /// Builds the cache and starts its filler thread.
    pub fn spawn(
        provider: Arc<dyn FrameProvider>,
        optimal: usize,
        config: &CacheConfig,
    ) -> AnimResult<Arc<Self>> {
        let frame_count = provider.frame_count();
        if frame_count == 0 {
            return Err(AnimError::NoFrames);
        }

        let sizer = FrameSizer::new(config.memory_budget);
        let optimal = sizer.clamp_window(optimal, 0, 0, frame_count);
        let max = config.frame_cache_size_max;
        let current = sizer.clamp_window(optimal, max, FRAME_CACHE_SIZE_NO_LIMIT, frame_count);

        let (request_tx, request_rx) = mpsc::sync_channel(config.request_queue_capacity.max(1));
        let (completion_tx, completion_rx) =
            mpsc::sync_channel(config.completion_queue_capacity.max(1));

        let cache = Arc::new(Self {
            frame_count,
            sizer,
            grow_delay: config.grow_delay,
            reset_delay: config.reset_delay,
            max_grow_attempts: config.max_grow_attempts,
            state: Mutex::new(CacheState {
                frames: HashMap::new(),
                cursor: POSTER_FRAME_INDEX,
                optimal,
                max,
                current,
                pressure: PressureState::default(),
                in_flight: HashSet::new(),
                failed: HashSet::new(),
                completions: completion_rx,
                filler: BackgroundFiller::new(request_tx),
                stats: CacheStats::default(),
            }),
            lifecycle: Lifecycle::new(),
        });

        FillWorker {
            requests: request_rx,
            completions: completion_tx,
            cache: WeakProxy::new(Arc::downgrade(&cache)),
            provider,
            predrawing: config.predrawing,
        }
        .spawn()?;

        Ok(cache)
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Returns the cached frame at `index`, or `None` if it has not been decoded yet.
    ///
    /// Never decodes and never waits for the filler. On a miss the caller should hold
    /// the current frame and poll again on the next tick.
    pub fn lookup(&self, index: usize) -> Option<Frame> {
        if index >= self.frame_count {
            anim_log!(
                LogLevel::Warn,
                "Skipping lookup of frame {} beyond frame count {}",
                index,
                self.frame_count
            );
            return None;
        }
        if self.lifecycle.is_torn_down() {
            return None;
        }

        let mut state = self.state();
        self.drain_completions(&mut state);
        self.apply_scheduled_growth(&mut state, Instant::now());

        state.cursor = index;
        if state.frames.len() < self.frame_count {
            self.request_window(&mut state, index);
        }

        let frame = state.frames.get(&index).cloned();
        if frame.is_some() {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }

        self.evict_overflow(&mut state);
        frame
    }

    /// Applies finished decodes without moving the cursor.
    pub fn pump_completions(&self) {
        if self.lifecycle.is_torn_down() {
            return;
        }
        let mut state = self.state();
        self.drain_completions(&mut state);
    }

    pub fn store(&self, index: usize, frame: Frame) -> AnimResult<()> {
        if index >= self.frame_count {
            return Err(AnimError::IndexOutOfRange {
                index,
                frame_count: self.frame_count,
            });
        }
        if self.lifecycle.is_torn_down() {
            return Ok(());
        }

        let mut state = self.state();
        state.failed.remove(&index);
        state.frames.insert(index, frame);
        self.evict_overflow(&mut state);
        Ok(())
    }

    pub fn set_max_size(&self, max: usize) {
        let mut state = self.state();
        let previous = state.current;
        state.max = max;
        self.recompute_window(&mut state);
        self.evict_overflow(&mut state);
        anim_log!(
            LogLevel::Info,
            "Frame cache max set to {}, window {} -> {}",
            max,
            previous,
            state.current
        );
    }

    pub fn handle_memory_pressure(&self) {
        let mut state = self.state();
        let previous = state.current;

        state.pressure.warnings += 1;
        state.stats.memory_warnings += 1;
        state.pressure.internal_max = self.sizer.shrink_under_pressure(state.current);
        self.recompute_window(&mut state);
        self.evict_overflow(&mut state);

        // Cap the regrow attempts so repeated warnings don't turn into a sawtooth.
        state.pressure.next_step_at = if state.pressure.warnings <= self.max_grow_attempts + 1 {
            Some(Instant::now() + self.grow_delay)
        } else {
            None
        };

        anim_log!(
            LogLevel::Warn,
            "Memory pressure #{}: frame cache window {} -> {}",
            state.pressure.warnings,
            previous,
            state.current
        );
    }

    /// Grows the window one step now instead of waiting for the relief timer.
    pub fn relieve_memory_pressure(&self) {
        let mut state = self.state();
        self.step_growth(&mut state, Instant::now());
    }

    pub fn frame_cache_size_current(&self) -> usize {
        self.state().current
    }

    pub fn frame_cache_size_max(&self) -> usize {
        self.state().max
    }

    pub fn frame_cache_size_optimal(&self) -> usize {
        self.state().optimal
    }

    pub fn is_under_pressure(&self) -> bool {
        self.state().pressure.internal_max != FRAME_CACHE_SIZE_NO_LIMIT
    }

    pub fn contains(&self, index: usize) -> bool {
        self.state().frames.contains_key(&index)
    }

    pub fn is_failed(&self, index: usize) -> bool {
        self.state().failed.contains(&index)
    }

    pub fn cached_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.state().frames.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    pub fn in_flight_count(&self) -> usize {
        self.state().in_flight.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.state().stats
    }

    /// Whether the filler should still decode `index`.
    pub(crate) fn wants(&self, index: usize) -> bool {
        let state = self.state();
        !state.frames.contains_key(&index)
            && in_window(index, state.cursor, state.current, self.frame_count)
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain_completions(&self, state: &mut CacheState) {
        let mut received = false;
        while let Ok(FillCompletion { index, outcome }) = state.completions.try_recv() {
            received = true;
            state.in_flight.remove(&index);
            match outcome {
                FillOutcome::Decoded(frame) => {
                    state.frames.insert(index, frame);
                }
                FillOutcome::Failed => {
                    state.failed.insert(index);
                    state.stats.decode_failures += 1;
                }
                FillOutcome::Discarded => {}
            }
        }
        if received {
            self.evict_overflow(state);
        }
    }

    fn request_window(&self, state: &mut CacheState, index: usize) {
        let batch: Vec<usize> = window_indices(index, state.current, self.frame_count)
            .filter(|i| {
                !state.frames.contains_key(i)
                    && !state.in_flight.contains(i)
                    && !state.failed.contains(i)
            })
            .collect();
        if batch.is_empty() {
            return;
        }

        match state.filler.request(batch.clone()) {
            Ok(()) => state.in_flight.extend(batch),
            Err(_) => anim_log!(
                LogLevel::Verbose,
                "Filler queue busy, frames {:?} will be requested again",
                batch
            ),
        }
    }

    fn recompute_window(&self, state: &mut CacheState) {
        state.current = self.sizer.clamp_window(
            state.optimal,
            state.max,
            state.pressure.internal_max,
            self.frame_count,
        );
    }

    fn apply_scheduled_growth(&self, state: &mut CacheState, now: Instant) {
        if state.pressure.next_step_at.is_some_and(|at| now >= at) {
            self.step_growth(state, now);
        }
    }

    fn step_growth(&self, state: &mut CacheState, now: Instant) {
        if state.pressure.internal_max == FRAME_CACHE_SIZE_NO_LIMIT {
            state.pressure.next_step_at = None;
            return;
        }

        let target = self.sizer.clamp_window(
            state.optimal,
            state.max,
            FRAME_CACHE_SIZE_NO_LIMIT,
            self.frame_count,
        );
        let grown = self.sizer.grow_if_under_budget(
            state.pressure.internal_max,
            self.frame_count,
            state.max,
        );

        if grown >= target {
            state.pressure.internal_max = FRAME_CACHE_SIZE_NO_LIMIT;
            state.pressure.next_step_at = None;
        } else {
            state.pressure.internal_max = grown;
            state.pressure.next_step_at = Some(now + self.reset_delay);
        }
        self.recompute_window(state);

        anim_log!(
            LogLevel::Info,
            "Frame cache window grew to {}",
            state.current
        );
    }

    /// Evicts frames outside the window, oldest-played first, until the set fits.
    fn evict_overflow(&self, state: &mut CacheState) {
        if state.frames.len() <= state.current {
            return;
        }

        let (cursor, current, count) = (state.cursor, state.current, self.frame_count);
        let mut candidates: Vec<usize> = state
            .frames
            .keys()
            .copied()
            .filter(|&i| i != POSTER_FRAME_INDEX && !in_window(i, cursor, current, count))
            .collect();
        candidates.sort_unstable_by_key(|&i| Reverse(distance_behind(i, cursor, count)));

        for index in candidates {
            if state.frames.len() <= current {
                break;
            }
            state.frames.remove(&index);
            state.stats.evictions += 1;
        }
    }
}

impl Teardown for FrameCache {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn teardown(&self) {
        let mut state = self.state();
        state.frames.clear();
        state.in_flight.clear();
        state.filler.shutdown();
        drop(state);
        anim_log!(LogLevel::Debug, "Frame cache torn down");
    }
}

fn window_indices(start: usize, len: usize, frame_count: usize) -> impl Iterator<Item = usize> {
    (0..len.min(frame_count)).map(move |offset| (start + offset) % frame_count)
}

fn in_window(index: usize, cursor: usize, current: usize, frame_count: usize) -> bool {
    (index + frame_count - cursor) % frame_count < current
}

fn distance_behind(index: usize, cursor: usize, frame_count: usize) -> usize {
    (cursor + frame_count - index) % frame_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::SyntheticProvider;
    use image::{Rgba, RgbaImage};
    use std::thread;

    fn frame(index: usize) -> Frame {
        Arc::new(RgbaImage::from_pixel(1, 1, Rgba([index as u8, 0, 0, 255])))
    }

    fn cache_with(
        provider: SyntheticProvider,
        optimal: usize,
        config: CacheConfig,
    ) -> (Arc<SyntheticProvider>, Arc<FrameCache>) {
        let provider = Arc::new(provider);
        let cache = FrameCache::spawn(provider.clone(), optimal, &config).unwrap();
        (provider, cache)
    }

    fn poll_until(cache: &FrameCache, index: usize, done: impl Fn(&FrameCache) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(cache) {
            assert!(Instant::now() < deadline, "timed out waiting for filler");
            cache.lookup(index);
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_window_helpers_wrap() {
        let indices: Vec<_> = window_indices(28, 5, 30).collect();
        assert_eq!(indices, vec![28, 29, 0, 1, 2]);
        assert!(in_window(1, 28, 5, 30));
        assert!(!in_window(3, 28, 5, 30));
        assert_eq!(distance_behind(27, 28, 30), 1);
        assert_eq!(distance_behind(3, 28, 30), 25);
    }

    #[test]
    fn test_primed_window_hits_and_far_frame_misses() {
        let (_, cache) = cache_with(SyntheticProvider::new(30), 5, CacheConfig::default());
        for i in 0..5 {
            cache.store(i, frame(i)).unwrap();
        }

        let hit = cache.lookup(2).expect("frame 2 is primed");
        assert_eq!(hit.get_pixel(0, 0)[0], 2);
        assert!(cache.lookup(29).is_none());
    }

    #[test]
    fn test_store_then_lookup_returns_same_frame() {
        let (_, cache) = cache_with(SyntheticProvider::new(10), 3, CacheConfig::default());
        let stored = frame(4);
        cache.store(4, stored.clone()).unwrap();
        let found = cache.lookup(4).unwrap();
        assert!(Arc::ptr_eq(&stored, &found));
    }

    #[test]
    fn test_store_out_of_range_is_error() {
        let (_, cache) = cache_with(SyntheticProvider::new(4), 2, CacheConfig::default());
        assert!(matches!(
            cache.store(4, frame(4)),
            Err(AnimError::IndexOutOfRange { index: 4, frame_count: 4 })
        ));
    }

    #[test]
    fn test_lookup_out_of_range_is_absent() {
        let (_, cache) = cache_with(SyntheticProvider::new(4), 2, CacheConfig::default());
        assert!(cache.lookup(10).is_none());
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_eviction_keeps_window_and_poster() {
        let (_, cache) = cache_with(SyntheticProvider::new(30), 3, CacheConfig::default());
        cache.set_max_size(3);
        cache.store(0, frame(0)).unwrap();
        for i in 10..13 {
            cache.store(i, frame(i)).unwrap();
        }
        // cursor still at 0: window {0,1,2}; only the poster is in it
        let cached = cache.cached_indices();
        assert!(cached.contains(&0));
        assert!(cached.len() <= 3);
        for index in cached {
            assert!(index == POSTER_FRAME_INDEX || (10..13).contains(&index));
        }
    }

    #[test]
    fn test_eviction_drops_oldest_played_first() {
        let (_, cache) = cache_with(SyntheticProvider::new(10), 2, CacheConfig::default());
        cache.store(0, frame(0)).unwrap();
        cache.store(5, frame(5)).unwrap();
        cache.lookup(7);
        cache.store(6, frame(6)).unwrap();
        // window from 7 is {7,8}; 5 was played longest ago, then 6
        let cached = cache.cached_indices();
        assert!(cached.contains(&0));
        assert!(!cached.contains(&5));
    }

    #[test]
    fn test_window_size_stays_in_bounds() {
        let (_, cache) = cache_with(SyntheticProvider::new(6), 50, CacheConfig::default());
        assert_eq!(cache.frame_cache_size_current(), 6);
        cache.set_max_size(2);
        assert_eq!(cache.frame_cache_size_current(), 2);
        cache.set_max_size(0);
        assert_eq!(cache.frame_cache_size_current(), 6);
    }

    #[test]
    fn test_lowering_max_evicts_immediately() {
        let (_, cache) = cache_with(SyntheticProvider::new(20), 10, CacheConfig::default());
        for i in 0..10 {
            cache.store(i, frame(i)).unwrap();
        }
        cache.set_max_size(3);
        assert_eq!(cache.frame_cache_size_current(), 3);
        assert!(cache.cached_indices().len() <= 3);
    }

    #[test]
    fn test_memory_pressure_shrinks_then_grows_back() {
        let config = CacheConfig::default().with_relief_delays(
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        );
        let (_, cache) = cache_with(SyntheticProvider::new(30), 10, config);
        for i in 0..10 {
            cache.store(i, frame(i)).unwrap();
        }
        assert_eq!(cache.frame_cache_size_current(), 10);

        cache.handle_memory_pressure();
        let shrunk = cache.frame_cache_size_current();
        assert!(shrunk >= 1 && shrunk < 10);
        assert!(cache.cached_indices().len() <= shrunk + 1);
        assert!(cache.is_under_pressure());

        let mut sizes = vec![shrunk];
        for _ in 0..10 {
            cache.relieve_memory_pressure();
            sizes.push(cache.frame_cache_size_current());
        }
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(cache.frame_cache_size_current(), 10);
        assert!(!cache.is_under_pressure());
    }

    #[test]
    fn test_growth_after_pressure_respects_cap() {
        let config = CacheConfig::default().with_relief_delays(Duration::ZERO, Duration::ZERO);
        let (_, cache) = cache_with(SyntheticProvider::new(30), 10, config);
        cache.set_max_size(6);
        cache.handle_memory_pressure();
        for _ in 0..10 {
            cache.relieve_memory_pressure();
        }
        assert_eq!(cache.frame_cache_size_current(), 6);
        assert!(!cache.is_under_pressure());
    }

    #[test]
    fn test_scheduled_growth_applies_on_lookup() {
        let config = CacheConfig::default().with_relief_delays(Duration::ZERO, Duration::ZERO);
        let (_, cache) = cache_with(SyntheticProvider::new(30), 8, config);
        cache.handle_memory_pressure();
        assert_eq!(cache.frame_cache_size_current(), 1);

        for _ in 0..10 {
            cache.lookup(0);
        }
        assert_eq!(cache.frame_cache_size_current(), 8);
    }

    #[test]
    fn test_repeated_pressure_stops_scheduled_growth() {
        let config = CacheConfig::default()
            .with_relief_delays(Duration::ZERO, Duration::ZERO)
            .with_max_grow_attempts(0);
        let (_, cache) = cache_with(SyntheticProvider::new(30), 8, config);
        cache.handle_memory_pressure();
        cache.handle_memory_pressure();

        for _ in 0..5 {
            cache.lookup(0);
        }
        assert_eq!(cache.frame_cache_size_current(), 1);
        assert_eq!(cache.stats().memory_warnings, 2);
    }

    #[test]
    fn test_filler_populates_window() {
        let (_, cache) = cache_with(SyntheticProvider::new(12), 4, CacheConfig::default());
        poll_until(&cache, 3, |c| (3..7).all(|i| c.contains(i)));

        let frame = cache.lookup(5).unwrap();
        assert_eq!(frame.get_pixel(0, 0)[0], 5);
        assert!(cache.stats().hits >= 1);
    }

    #[test]
    fn test_failed_frame_stays_absent_neighbours_fill() {
        let provider = SyntheticProvider::new(12).failing_at(7);
        let (_, cache) = cache_with(provider, 3, CacheConfig::default());
        poll_until(&cache, 6, |c| c.is_failed(7) && c.contains(6) && c.contains(8));

        for _ in 0..5 {
            assert!(cache.lookup(7).is_none());
        }
        assert!(cache.is_failed(7));
        assert_eq!(cache.stats().decode_failures, 1);
        assert!(cache.lookup(8).is_some());
    }

    #[test]
    fn test_store_clears_failure() {
        let provider = SyntheticProvider::new(6).failing_at(2);
        let (_, cache) = cache_with(provider, 3, CacheConfig::default());
        poll_until(&cache, 2, |c| c.is_failed(2));

        cache.store(2, frame(2)).unwrap();
        assert!(!cache.is_failed(2));
        assert!(cache.lookup(2).is_some());
    }

    #[test]
    fn test_teardown_clears_frames_and_ignores_store() {
        let (_, cache) = cache_with(SyntheticProvider::new(5), 5, CacheConfig::default());
        cache.store(0, frame(0)).unwrap();
        cache.store(1, frame(1)).unwrap();

        assert!(cache.lifecycle().begin_teardown());
        cache.teardown();

        assert!(cache.cached_indices().is_empty());
        assert!(cache.store(2, frame(2)).is_ok());
        assert!(!cache.contains(2));
        assert!(cache.lookup(1).is_none());
    }
}
