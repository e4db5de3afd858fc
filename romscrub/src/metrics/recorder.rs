//! Live metrics recorder.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::snapshot::MetricsSnapshot;

/// Maximum retained response-time samples; the oldest is dropped beyond
/// this.
pub const RESPONSE_TIME_SAMPLE_CAP: usize = 100;

/// Running counters for the preview pipeline.
///
/// All counters are updated only by the coordinator; worker tasks never
/// touch this type directly.
#[derive(Debug, Default)]
pub struct PreviewMetrics {
    memory_hits: AtomicU64,
    memory_misses: AtomicU64,
    persistent_hits: AtomicU64,
    persistent_misses: AtomicU64,
    decodes: AtomicU64,
    stale_drops: AtomicU64,
    response_times_ms: Mutex<VecDeque<f64>>,
}

impl PreviewMetrics {
    /// Creates a zeroed recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a memory-tier hit.
    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a memory-tier miss.
    pub fn record_memory_miss(&self) {
        self.memory_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a persistent-tier hit.
    pub fn record_persistent_hit(&self) {
        self.persistent_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a persistent-tier miss.
    pub fn record_persistent_miss(&self) {
        self.persistent_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one completed decode (generation).
    pub fn record_decode(&self) {
        self.decodes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completion discarded as stale.
    pub fn record_stale_drop(&self) {
        self.stale_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a request-to-delivery response time.
    pub fn record_response_time(&self, elapsed: Duration) {
        let mut samples = self.response_times_ms.lock();
        if samples.len() >= RESPONSE_TIME_SAMPLE_CAP {
            samples.pop_front();
        }
        samples.push_back(elapsed.as_secs_f64() * 1000.0);
    }

    /// Takes a point-in-time snapshot with derived rates.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let samples = self.response_times_ms.lock().clone();
        MetricsSnapshot::compute(
            self.memory_hits.load(Ordering::Relaxed),
            self.memory_misses.load(Ordering::Relaxed),
            self.persistent_hits.load(Ordering::Relaxed),
            self.persistent_misses.load(Ordering::Relaxed),
            self.decodes.load(Ordering::Relaxed),
            self.stale_drops.load(Ordering::Relaxed),
            &samples,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = PreviewMetrics::new();
        metrics.record_memory_hit();
        metrics.record_memory_hit();
        metrics.record_memory_miss();
        metrics.record_persistent_hit();
        metrics.record_persistent_miss();
        metrics.record_decode();
        metrics.record_stale_drop();

        let snap = metrics.snapshot();
        assert_eq!(snap.memory_hits, 2);
        assert_eq!(snap.memory_misses, 1);
        assert_eq!(snap.persistent_hits, 1);
        assert_eq!(snap.persistent_misses, 1);
        assert_eq!(snap.decodes, 1);
        assert_eq!(snap.stale_drops, 1);
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let metrics = PreviewMetrics::new();
        metrics.record_memory_hit();
        metrics.record_response_time(Duration::from_millis(5));

        let a = metrics.snapshot();
        let b = metrics.snapshot();
        assert_eq!(a.memory_hits, b.memory_hits);
        assert_eq!(a.response_samples, b.response_samples);
    }

    #[test]
    fn test_response_time_ring_caps_at_limit() {
        let metrics = PreviewMetrics::new();
        for i in 0..(RESPONSE_TIME_SAMPLE_CAP + 20) {
            metrics.record_response_time(Duration::from_millis(i as u64));
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.response_samples, RESPONSE_TIME_SAMPLE_CAP as u64);
        // Oldest samples (0..19 ms) were dropped.
        assert!(snap.min_response_ms >= 20.0);
    }
}
