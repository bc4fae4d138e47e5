//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single sink, shared by every channel that writes to it
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Messages handed to the backend
    write_count: AtomicU64,
    /// Backend errors
    failure_count: AtomicU64,
    /// Messages rejected by the sink's own settings
    filtered_count: AtomicU64,
    /// try_lock attempts that found the sink busy
    contended_count: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn inc_write_count(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn filtered_count(&self) -> u64 {
        self.filtered_count.load(Ordering::Relaxed)
    }

    pub fn inc_filtered_count(&self) {
        self.filtered_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn contended_count(&self) -> u64 {
        self.contended_count.load(Ordering::Relaxed)
    }

    pub fn inc_contended_count(&self) {
        self.contended_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            filtered_count: self.filtered_count(),
            contended_count: self.contended_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub write_count: u64,
    pub failure_count: u64,
    pub filtered_count: u64,
    pub contended_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = SinkMetrics::new();
        metrics.inc_write_count();
        metrics.inc_write_count();
        metrics.inc_failure_count();
        metrics.inc_contended_count();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                write_count: 2,
                failure_count: 1,
                filtered_count: 0,
                contended_count: 1,
            }
        );
    }
}
