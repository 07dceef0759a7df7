//! Data models for storage operations.
//!
//! This module defines the core data structures used for:
//! - File metadata and change-detection bookkeeping
//! - Text chunks
//! - Per-root statistics

use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp.
#[must_use]
pub fn now_unix() -> i64 {
    to_unix(SystemTime::now())
}

/// Convert a system time to Unix seconds (negative before the epoch).
fn to_unix(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX),
    }
}

/// Health of a stored file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Last visit completed.
    Ok,
    /// Last visit failed before a record could be written.
    Error,
}

impl FileStatus {
    /// Column value for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }

    /// Parse a column value; anything unrecognised is treated as an error record.
    #[must_use]
    pub fn from_column(value: &str) -> Self {
        if value == "ok" {
            Self::Ok
        } else {
            Self::Error
        }
    }
}

/// Filesystem metadata observed for a file during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes.
    pub size: i64,
    /// Modification time, Unix seconds.
    pub mtime: i64,
    /// Creation time where the platform reports one.
    pub created_at: Option<i64>,
    /// Device and inode, identifying the file independently of its path.
    pub file_key: Option<String>,
}

impl FileStat {
    /// Build from `std::fs::Metadata`, as returned by `symlink_metadata`.
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            size: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
            mtime: metadata.modified().map(to_unix).unwrap_or(0),
            created_at: metadata.created().ok().map(to_unix),
            file_key: file_key(metadata),
        }
    }
}

#[cfg(unix)]
fn file_key(metadata: &Metadata) -> Option<String> {
    use std::os::unix::fs::MetadataExt;
    Some(format!("{}:{}", metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn file_key(_metadata: &Metadata) -> Option<String> {
    None
}

/// A stored file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Row identifier, stable across upserts.
    pub id: i64,

    /// Absolute path (unique).
    pub path: String,

    /// Size in bytes at the last slow-path visit.
    pub size: i64,

    /// Modification time at the last slow-path visit.
    pub mtime: i64,

    /// Creation time, when the platform provided one.
    pub created_at: Option<i64>,

    /// Device and inode at the last slow-path visit.
    pub file_key: Option<String>,

    /// Hex content digest.
    pub digest: Option<String>,

    /// When `digest` was last computed.
    pub hash_checked_at: Option<i64>,

    /// When the chunk set was last rewritten.
    pub last_indexed_at: Option<i64>,

    /// Last visit, including fast-path visits.
    pub last_seen: Option<i64>,

    /// Record health.
    pub status: FileStatus,
}

impl FileEntry {
    /// Size, modification time and identity all match `stat`.
    #[must_use]
    pub fn metadata_matches(&self, stat: &FileStat) -> bool {
        self.size == stat.size && self.mtime == stat.mtime && self.file_key == stat.file_key
    }
}

/// A stored text chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique identifier (database primary key).
    pub id: Option<i64>,

    /// Owning file row.
    pub file_id: i64,

    /// Position within the file, dense from 0.
    pub ordinal: i64,

    /// Normalized text.
    pub text: String,

    /// Start byte offset into the file's normalized text.
    pub byte_from: i64,

    /// End byte offset (exclusive).
    pub byte_to: i64,
}

impl ChunkRecord {
    /// Create a new, not yet stored, chunk record.
    #[must_use]
    pub fn new(
        file_id: i64,
        ordinal: i64,
        text: impl Into<String>,
        byte_from: i64,
        byte_to: i64,
    ) -> Self {
        Self {
            id: None,
            file_id,
            ordinal,
            text: text.into(),
            byte_from,
            byte_to,
        }
    }
}

/// Counts and recency for the files under one root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCounts {
    /// Stored files under the root.
    pub files_total: i64,
    /// Files with at least one chunk.
    pub files_with_text: i64,
    /// Chunks belonging to those files.
    pub chunks_total: i64,
    /// Most recent index timestamp among them.
    pub last_indexed_at: Option<i64>,
}
