//! Overload counters emitted by the admission queue and the dispatch loop.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Sink for the dispatcher's monotonically increasing counters.
///
/// Implementations must be cheap and infallible; counters are observability
/// only and never influence dispatch decisions.
pub trait MetricsSink: Send + Sync {
    /// The dispatch loop found the execution pool saturated.
    fn inc_overload(&self);
    /// An `offer` was rejected because the admission queue stayed over capacity.
    fn inc_admission_queue_full(&self);
}

/// Point-in-time copy of [`WorkerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Times the dispatch loop backed off because the pool was saturated.
    pub overload_count: u64,
    /// Offers rejected by the admission queue.
    pub admission_queue_full_count: u64,
}

/// In-process counter sink backed by atomics.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    overload: AtomicU64,
    admission_queue_full: AtomicU64,
}

impl WorkerMetrics {
    /// Create a sink with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            overload_count: self.overload.load(Ordering::Relaxed),
            admission_queue_full_count: self.admission_queue_full.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for WorkerMetrics {
    fn inc_overload(&self) {
        self.overload.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_admission_queue_full(&self) {
        self.admission_queue_full.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_increments() {
        let metrics = WorkerMetrics::new();
        metrics.inc_overload();
        metrics.inc_overload();
        metrics.inc_admission_queue_full();

        let snap = metrics.snapshot();
        assert_eq!(snap.overload_count, 2);
        assert_eq!(snap.admission_queue_full_count, 1);
    }
}
