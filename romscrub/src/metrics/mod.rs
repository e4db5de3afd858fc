//! Preview pipeline metrics for observability and tuning.
//!
//! Counters are lock-free atomics updated only by the coordinator on the
//! relevant event; response-time samples live in a small capped ring.
//! Readers take a [`MetricsSnapshot`] - a point-in-time copy with derived
//! rates - so read access never mutates recorder state.
//!
//! ```text
//! Coordinator ─────► PreviewMetrics ─────► MetricsSnapshot ─────► Views
//!                    (atomic counters)     (point-in-time copy)   (CLI, UI)
//! ```

mod recorder;
mod snapshot;

pub use recorder::{PreviewMetrics, RESPONSE_TIME_SAMPLE_CAP};
pub use snapshot::MetricsSnapshot;
