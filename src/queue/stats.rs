//! Counters for queue traffic and backpressure.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Statistics for a [`BoundedJobQueue`](super::BoundedJobQueue).
///
/// A backpressure event is recorded whenever a producer finds no free slot
/// and has to wait.
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Jobs placed in the buffer
    jobs_enqueued: AtomicU64,
    /// Jobs taken out of the buffer
    jobs_dequeued: AtomicU64,
    /// Times a producer found the buffer full
    backpressure_events: AtomicU64,
    /// Bounded waits that expired
    timeout_events: AtomicU64,
    /// Largest occupancy observed
    high_water_mark: AtomicUsize,
}

impl QueueStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a placement leaving `occupancy` jobs queued.
    pub fn record_enqueue(&self, occupancy: usize) {
        self.jobs_enqueued.fetch_add(1, Ordering::Relaxed);
        self.high_water_mark.fetch_max(occupancy, Ordering::Relaxed);
    }

    /// Records a removal.
    pub fn record_dequeue(&self) {
        self.jobs_dequeued.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a producer blocking on a full buffer.
    pub fn record_backpressure(&self) {
        self.backpressure_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an expired bounded wait.
    pub fn record_timeout(&self) {
        self.timeout_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the number of jobs enqueued.
    pub fn jobs_enqueued(&self) -> u64 {
        self.jobs_enqueued.load(Ordering::Relaxed)
    }

    /// Gets the number of jobs dequeued.
    pub fn jobs_dequeued(&self) -> u64 {
        self.jobs_dequeued.load(Ordering::Relaxed)
    }

    /// Gets the number of backpressure events.
    pub fn backpressure_events(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }

    /// Gets the number of timeout events.
    pub fn timeout_events(&self) -> u64 {
        self.timeout_events.load(Ordering::Relaxed)
    }

    /// Gets the largest occupancy observed.
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            jobs_enqueued: self.jobs_enqueued(),
            jobs_dequeued: self.jobs_dequeued(),
            backpressure_events: self.backpressure_events(),
            timeout_events: self.timeout_events(),
            high_water_mark: self.high_water_mark(),
        }
    }
}

/// A snapshot of queue statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatsSnapshot {
    /// Jobs placed in the buffer
    pub jobs_enqueued: u64,
    /// Jobs taken out of the buffer
    pub jobs_dequeued: u64,
    /// Times a producer found the buffer full
    pub backpressure_events: u64,
    /// Bounded waits that expired
    pub timeout_events: u64,
    /// Largest occupancy observed
    pub high_water_mark: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_stats() {
        let stats = QueueStats::new();

        stats.record_enqueue(1);
        stats.record_enqueue(2);
        stats.record_dequeue();
        assert_eq!(stats.jobs_enqueued(), 2);
        assert_eq!(stats.jobs_dequeued(), 1);
        assert_eq!(stats.high_water_mark(), 2);

        stats.record_enqueue(2);
        assert_eq!(stats.high_water_mark(), 2);

        stats.record_backpressure();
        stats.record_timeout();
        assert_eq!(stats.backpressure_events(), 1);
        assert_eq!(stats.timeout_events(), 1);
    }

    #[test]
    fn test_queue_stats_snapshot() {
        let stats = QueueStats::new();
        stats.record_enqueue(1);
        stats.record_backpressure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.jobs_enqueued, 1);
        assert_eq!(snapshot.jobs_dequeued, 0);
        assert_eq!(snapshot.backpressure_events, 1);
        assert_eq!(snapshot.high_water_mark, 1);
    }
}
