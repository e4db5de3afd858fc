//! Point-in-time metrics view with derived rates.

use std::fmt;

/// Immutable snapshot of the preview pipeline counters.
///
/// Rates are computed at snapshot time from the raw counters; a tier with
/// no lookups reports a rate of zero rather than NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    /// Memory-tier hits.
    pub memory_hits: u64,
    /// Memory-tier misses.
    pub memory_misses: u64,
    /// Persistent-tier hits.
    pub persistent_hits: u64,
    /// Persistent-tier misses.
    pub persistent_misses: u64,
    /// Completed decodes.
    pub decodes: u64,
    /// Completions discarded as stale.
    pub stale_drops: u64,
    /// Memory-tier hit rate in `[0, 1]`.
    pub memory_hit_rate: f64,
    /// Persistent-tier hit rate in `[0, 1]`.
    pub persistent_hit_rate: f64,
    /// Share of requests served by either tier, in `[0, 1]`.
    pub overall_hit_rate: f64,
    /// Number of retained response-time samples.
    pub response_samples: u64,
    /// Mean response time over retained samples, in milliseconds.
    pub avg_response_ms: f64,
    /// Fastest retained response, in milliseconds.
    pub min_response_ms: f64,
    /// Slowest retained response, in milliseconds.
    pub max_response_ms: f64,
}

impl MetricsSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn compute(
        memory_hits: u64,
        memory_misses: u64,
        persistent_hits: u64,
        persistent_misses: u64,
        decodes: u64,
        stale_drops: u64,
        samples: &std::collections::VecDeque<f64>,
    ) -> Self {
        let (avg, min, max) = if samples.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let sum: f64 = samples.iter().sum();
            let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
            let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (sum / samples.len() as f64, min, max)
        };

        Self {
            memory_hits,
            memory_misses,
            persistent_hits,
            persistent_misses,
            decodes,
            stale_drops,
            memory_hit_rate: rate(memory_hits, memory_misses),
            persistent_hit_rate: rate(persistent_hits, persistent_misses),
            // Every request runs the memory lookup, so memory lookups are
            // the total request count either tier could have served.
            overall_hit_rate: {
                let lookups = memory_hits + memory_misses;
                if lookups == 0 {
                    0.0
                } else {
                    (memory_hits + persistent_hits) as f64 / lookups as f64
                }
            },
            response_samples: samples.len() as u64,
            avg_response_ms: avg,
            min_response_ms: min,
            max_response_ms: max,
        }
    }

    /// Total lookups that reached the memory tier.
    pub fn memory_lookups(&self) -> u64 {
        self.memory_hits + self.memory_misses
    }

    /// Total lookups that reached the persistent tier.
    pub fn persistent_lookups(&self) -> u64 {
        self.persistent_hits + self.persistent_misses
    }
}

fn rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "memory tier:     {} hits / {} lookups ({:.1}%)",
            self.memory_hits,
            self.memory_lookups(),
            self.memory_hit_rate * 100.0
        )?;
        writeln!(
            f,
            "persistent tier: {} hits / {} lookups ({:.1}%)",
            self.persistent_hits,
            self.persistent_lookups(),
            self.persistent_hit_rate * 100.0
        )?;
        writeln!(
            f,
            "overall:         {:.1}% served from cache",
            self.overall_hit_rate * 100.0
        )?;
        writeln!(
            f,
            "decodes:         {} completed, {} dropped stale",
            self.decodes, self.stale_drops
        )?;
        if self.response_samples > 0 {
            writeln!(
                f,
                "response time:   avg {:.1} ms, min {:.1} ms, max {:.1} ms ({} samples)",
                self.avg_response_ms, self.min_response_ms, self.max_response_ms,
                self.response_samples
            )?;
        } else {
            writeln!(f, "response time:   no samples")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[test]
    fn test_rates_derived_from_counters() {
        let snap = MetricsSnapshot::compute(3, 1, 1, 3, 4, 0, &VecDeque::new());
        assert!((snap.memory_hit_rate - 0.75).abs() < f64::EPSILON);
        assert!((snap.persistent_hit_rate - 0.25).abs() < f64::EPSILON);
        assert_eq!(snap.memory_lookups(), 4);
        assert_eq!(snap.persistent_lookups(), 4);
    }

    #[test]
    fn test_zero_lookups_yield_zero_rate() {
        let snap = MetricsSnapshot::compute(0, 0, 0, 0, 0, 0, &VecDeque::new());
        assert_eq!(snap.memory_hit_rate, 0.0);
        assert_eq!(snap.persistent_hit_rate, 0.0);
        assert_eq!(snap.overall_hit_rate, 0.0);
        assert_eq!(snap.avg_response_ms, 0.0);
    }

    #[test]
    fn test_overall_hit_rate_spans_both_tiers() {
        // 4 requests: 2 memory hits, 1 persistent hit, 1 full miss.
        let snap = MetricsSnapshot::compute(2, 2, 1, 1, 1, 0, &VecDeque::new());
        assert!((snap.overall_hit_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_response_stats() {
        let samples: VecDeque<f64> = [10.0, 20.0, 30.0].into_iter().collect();
        let snap = MetricsSnapshot::compute(0, 0, 0, 0, 3, 0, &samples);
        assert!((snap.avg_response_ms - 20.0).abs() < f64::EPSILON);
        assert_eq!(snap.min_response_ms, 10.0);
        assert_eq!(snap.max_response_ms, 30.0);
        assert_eq!(snap.response_samples, 3);
    }

    #[test]
    fn test_display_renders_all_sections() {
        let samples: VecDeque<f64> = [12.5].into_iter().collect();
        let snap = MetricsSnapshot::compute(1, 1, 0, 2, 2, 1, &samples);
        let text = snap.to_string();
        assert!(text.contains("memory tier"));
        assert!(text.contains("persistent tier"));
        assert!(text.contains("dropped stale"));
        assert!(text.contains("avg 12.5 ms"));
    }
}
