//! Per-file change detection.
//!
//! Three signals decide what a visit costs: filesystem metadata, the age of
//! the last index pass, and the age of the last content digest.

use crate::storage::{FileEntry, FileStat};

const SECS_PER_DAY: i64 = 86_400;

/// Staleness horizons, in seconds. A horizon of 0 disables it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Horizons {
    /// Maximum age of an index pass before it is redone.
    pub reindex_secs: i64,
    /// Maximum age of a digest before it is recomputed.
    pub verify_secs: i64,
}

impl Horizons {
    /// Build horizons from day counts.
    #[must_use]
    pub fn from_days(reindex_days: u32, verify_days: u32) -> Self {
        Self {
            reindex_secs: i64::from(reindex_days) * SECS_PER_DAY,
            verify_secs: i64::from(verify_days) * SECS_PER_DAY,
        }
    }
}

/// What the stored record says about a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    /// Size, modification time and identity all match the stored entry.
    pub metadata_unchanged: bool,
    /// The last index pass is recent enough to trust.
    pub index_fresh: bool,
}

impl Assessment {
    /// Compare the current stat with the previous entry.
    #[must_use]
    pub fn new(prev: Option<&FileEntry>, stat: &FileStat, horizons: Horizons, now: i64) -> Self {
        let metadata_unchanged = prev.is_some_and(|p| p.metadata_matches(stat));
        let index_fresh = prev.and_then(|p| p.last_indexed_at).is_some_and(|at| {
            horizons.reindex_secs == 0 || now - at < horizons.reindex_secs
        });

        Self {
            metadata_unchanged,
            index_fresh,
        }
    }

    /// Only bookkeeping is needed: no hashing, no extraction.
    #[must_use]
    pub const fn is_fast_path(&self) -> bool {
        self.metadata_unchanged && self.index_fresh
    }

    /// Whether the stored digest must be recomputed on the slow path.
    #[must_use]
    pub fn needs_verify(&self, prev: Option<&FileEntry>, horizons: Horizons, now: i64) -> bool {
        let Some(checked_at) = prev.and_then(|p| p.hash_checked_at) else {
            return true;
        };

        horizons.verify_secs == 0
            || now - checked_at >= horizons.verify_secs
            || !self.metadata_unchanged
    }

    /// Whether content is equivalent to what the index already holds.
    ///
    /// `fresh_digest` is `None` when the cached digest is trusted.
    #[must_use]
    pub fn same_content(&self, prev: Option<&FileEntry>, fresh_digest: Option<&str>) -> bool {
        let prior = prev.and_then(|p| p.digest.as_deref());
        let digest_ok = match (prior, fresh_digest) {
            (Some(old), Some(new)) => old == new,
            (Some(_), None) => true,
            (None, _) => false,
        };

        digest_ok && self.index_fresh
    }
}
