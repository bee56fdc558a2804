use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters describing the batches a store has seen.
#[derive(Debug, Default)]
pub struct BatchStats {
    committed: AtomicU64,
    committed_ops: AtomicU64,
    largest: AtomicUsize,
    failed: AtomicU64,
}

/// Point-in-time copy of [`BatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStatsSnapshot {
    /// Batches that applied.
    pub committed: u64,
    /// Operations across all applied batches.
    pub committed_ops: u64,
    /// Size of the largest batch submitted, applied or not.
    pub largest: usize,
    /// Batches rejected (too large or an operation failed).
    pub failed: u64,
}

impl BatchStats {
    pub(crate) fn record_submitted(&self, size: usize) {
        self.largest.fetch_max(size, Ordering::SeqCst);
    }

    pub(crate) fn record_committed(&self, size: usize) {
        self.committed.fetch_add(1, Ordering::SeqCst);
        self.committed_ops.fetch_add(size as u64, Ordering::SeqCst);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> BatchStatsSnapshot {
        BatchStatsSnapshot {
            committed: self.committed.load(Ordering::SeqCst),
            committed_ops: self.committed_ops.load(Ordering::SeqCst),
            largest: self.largest.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    pub fn reset(&self) {
        self.committed.store(0, Ordering::SeqCst);
        self.committed_ops.store(0, Ordering::SeqCst);
        self.largest.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
    }
}
