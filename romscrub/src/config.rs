//! Configuration for the preview coordinator and its collaborators.
//!
//! `PreviewConfig` is the single configuration surface passed to
//! [`PreviewCoordinator::spawn`](crate::coordinator::PreviewCoordinator::spawn).
//! Defaults are tuned for an interactive position control refreshing at
//! 60 Hz; hosts override individual knobs through the `with_*` builders.

use std::time::Duration;

/// Default debounce latency applied while the control is being dragged.
///
/// One 60 Hz frame budget: coalesces the burst of move events a drag
/// produces while still updating the preview every frame.
pub const DEFAULT_DRAG_DEBOUNCE: Duration = Duration::from_millis(16);

/// Default debounce latency for the post-release high-quality pass.
pub const DEFAULT_SETTLE_DEBOUNCE: Duration = Duration::from_millis(200);

/// Default delay before the state machine returns from `Settling` to `Idle`.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_millis(500);

/// Default memory-tier capacity in entries.
///
/// 20 entries bounds the footprint to a few megabytes at typical preview
/// sizes while still covering a back-and-forth scrub over a hot region.
pub const DEFAULT_MEMORY_CAPACITY: usize = 20;

/// Default number of decode workers.
///
/// Two workers hide decode latency behind the debounce window without
/// oversubscribing decode-heavy work.
pub const DEFAULT_POOL_SIZE: usize = 2;

/// Default stale-result lag window in request ids.
///
/// A completion whose request id trails the latest issued id by more than
/// this many ids is discarded as stale.
pub const DEFAULT_STALE_LAG: u64 = 2;

/// Configuration for a [`PreviewCoordinator`](crate::coordinator::PreviewCoordinator).
#[derive(Clone, Debug)]
pub struct PreviewConfig {
    /// Debounce latency while `Dragging`.
    pub drag_debounce: Duration,

    /// Debounce latency while `Settling` or `Idle`.
    pub settle_debounce: Duration,

    /// Delay before `Settling` transitions back to `Idle`.
    pub settle_timeout: Duration,

    /// Memory-tier capacity in entries (LRU beyond this).
    pub memory_capacity: usize,

    /// Number of decode worker tasks.
    pub pool_size: usize,

    /// Stale-result lag window in request ids.
    pub stale_lag: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            drag_debounce: DEFAULT_DRAG_DEBOUNCE,
            settle_debounce: DEFAULT_SETTLE_DEBOUNCE,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            pool_size: DEFAULT_POOL_SIZE,
            stale_lag: DEFAULT_STALE_LAG,
        }
    }
}

impl PreviewConfig {
    /// Set the drag-debounce latency.
    pub fn with_drag_debounce(mut self, latency: Duration) -> Self {
        self.drag_debounce = latency;
        self
    }

    /// Set the settle-debounce latency.
    pub fn with_settle_debounce(mut self, latency: Duration) -> Self {
        self.settle_debounce = latency;
        self
    }

    /// Set the settle-to-idle timeout.
    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    /// Set the memory-tier capacity in entries.
    pub fn with_memory_capacity(mut self, entries: usize) -> Self {
        self.memory_capacity = entries;
        self
    }

    /// Set the decode worker pool size.
    pub fn with_pool_size(mut self, workers: usize) -> Self {
        self.pool_size = workers;
        self
    }

    /// Set the stale-result lag window.
    pub fn with_stale_lag(mut self, ids: u64) -> Self {
        self.stale_lag = ids;
        self
    }
}

/// Formats a byte count as a human-readable size.
pub fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PreviewConfig::default();
        assert_eq!(config.drag_debounce, Duration::from_millis(16));
        assert_eq!(config.settle_debounce, Duration::from_millis(200));
        assert_eq!(config.settle_timeout, Duration::from_millis(500));
        assert_eq!(config.memory_capacity, 20);
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.stale_lag, 2);
    }

    #[test]
    fn test_latencies_differ_by_order_of_magnitude() {
        // Drag latency must stay well below the settle latency so the two
        // load regimes get distinct treatment.
        let config = PreviewConfig::default();
        assert!(config.settle_debounce >= config.drag_debounce * 10);
    }

    #[test]
    fn test_builders() {
        let config = PreviewConfig::default()
            .with_drag_debounce(Duration::from_millis(8))
            .with_settle_debounce(Duration::from_millis(100))
            .with_settle_timeout(Duration::from_millis(250))
            .with_memory_capacity(5)
            .with_pool_size(4)
            .with_stale_lag(1);

        assert_eq!(config.drag_debounce, Duration::from_millis(8));
        assert_eq!(config.settle_debounce, Duration::from_millis(100));
        assert_eq!(config.settle_timeout, Duration::from_millis(250));
        assert_eq!(config.memory_capacity, 5);
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.stale_lag, 1);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
