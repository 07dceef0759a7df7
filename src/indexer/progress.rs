//! Index run counters and snapshots.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Live counters for one index run.
#[derive(Debug)]
pub struct IndexStats {
    started: Instant,
    pub files_seen: AtomicU64,
    pub files_indexed: AtomicU64,
    pub chunks_written: AtomicU64,
    pub files_hashed: AtomicU64,
    pub files_failed: AtomicU64,
    pub files_pruned: AtomicU64,
    cancelled: AtomicBool,
}

impl Default for IndexStats {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexStats {
    /// Start counting.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            files_seen: AtomicU64::new(0),
            files_indexed: AtomicU64::new(0),
            chunks_written: AtomicU64::new(0),
            files_hashed: AtomicU64::new(0),
            files_failed: AtomicU64::new(0),
            files_pruned: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Increment a counter by one.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Flag the run as cancelled.
    pub fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self, done: bool) -> IndexProgress {
        IndexProgress {
            files_seen: self.files_seen.load(Ordering::Relaxed),
            files_indexed: self.files_indexed.load(Ordering::Relaxed),
            chunks_written: self.chunks_written.load(Ordering::Relaxed),
            files_hashed: self.files_hashed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            files_pruned: self.files_pruned.load(Ordering::Relaxed),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            done,
            cancelled: self.is_cancelled(),
        }
    }

    /// Final totals.
    #[must_use]
    pub fn summary(&self) -> IndexSummary {
        IndexSummary::from(self.snapshot(true))
    }
}

/// Progress notification, sent at each batch boundary and once at the end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexProgress {
    pub files_seen: u64,
    pub files_indexed: u64,
    pub chunks_written: u64,
    pub files_hashed: u64,
    pub files_failed: u64,
    pub files_pruned: u64,
    pub elapsed_secs: f64,
    /// Set only on the final notification.
    pub done: bool,
    pub cancelled: bool,
}

/// Result of an index run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub files_seen: u64,
    pub files_indexed: u64,
    pub chunks_written: u64,
    pub files_hashed: u64,
    pub files_failed: u64,
    pub files_pruned: u64,
    /// Stopped early on request; not an error.
    pub cancelled: bool,
}

impl From<IndexProgress> for IndexSummary {
    fn from(p: IndexProgress) -> Self {
        Self {
            files_seen: p.files_seen,
            files_indexed: p.files_indexed,
            chunks_written: p.chunks_written,
            files_hashed: p.files_hashed,
            files_failed: p.files_failed,
            files_pruned: p.files_pruned,
            cancelled: p.cancelled,
        }
    }
}
