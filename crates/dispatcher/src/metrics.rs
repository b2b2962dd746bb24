//! Dispatch metrics for observability
//!
//! Local counters for status reporting and tests. Every increment is mirrored
//! to the `metrics` facade through `observability`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for a single dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Frames handed to a recipient successfully
    sent: AtomicU64,
    /// Sends the transport refused
    failures: AtomicU64,
    /// Queue entries dropped because the recipient had disconnected
    skipped_inactive: AtomicU64,
    /// Recipients appended to the delivery queue
    enqueued: AtomicU64,
    /// Pump ticks executed
    drain_ticks: AtomicU64,
    /// Rotation ticks executed
    rotations: AtomicU64,
    /// Queue length after the last enqueue or drain
    queue_len: AtomicUsize,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn inc_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped_inactive(&self) -> u64 {
        self.skipped_inactive.load(Ordering::Relaxed)
    }

    pub fn inc_skipped_inactive(&self) {
        self.skipped_inactive.fetch_add(1, Ordering::Relaxed);
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn add_enqueued(&self, n: usize) {
        self.enqueued.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn drain_ticks(&self) -> u64 {
        self.drain_ticks.load(Ordering::Relaxed)
    }

    pub fn inc_drain_ticks(&self) {
        self.drain_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    pub fn inc_rotations(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    ///
    /// Cache figures are filled in by the dispatcher, which owns the cache.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sent: self.sent(),
            failures: self.failures(),
            skipped_inactive: self.skipped_inactive(),
            enqueued: self.enqueued(),
            drain_ticks: self.drain_ticks(),
            rotations: self.rotations(),
            queue_len: self.queue_len(),
            cache_entries: 0,
            cache_hits: 0,
            cache_misses: 0,
        }
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sent: u64,
    pub failures: u64,
    pub skipped_inactive: u64,
    pub enqueued: u64,
    pub drain_ticks: u64,
    pub rotations: u64,
    pub queue_len: usize,
    pub cache_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = DispatchMetrics::new();
        metrics.inc_sent();
        metrics.inc_sent();
        metrics.inc_failures();
        metrics.add_enqueued(5);
        metrics.set_queue_len(3);

        let snap = metrics.snapshot();
        assert_eq!(snap.sent, 2);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.enqueued, 5);
        assert_eq!(snap.queue_len, 3);
        assert_eq!(snap.rotations, 0);
    }
}
