//! Error types and Result aliases for trawl.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using trawl's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for trawl operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database/storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Indexing error.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Query error.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("not found: {entity} with id '{id}'")]
    NotFound { entity: &'static str, id: String },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Setting value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Indexer errors.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Root is missing or not a directory.
    #[error("invalid root directory '{path}': {reason}")]
    InvalidRoot { path: String, reason: String },

    /// A run is already in progress.
    #[error("an index run is already in progress")]
    AlreadyRunning,

    /// Background task panicked or was aborted.
    #[error("index task failed: {0}")]
    TaskFailed(String),
}

/// Query errors.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Secondary pattern failed to compile.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Full-text query syntax rejected by the index engine.
    #[error("invalid search syntax: {0}")]
    Syntax(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is confined to a single file visit.
    ///
    /// Transient errors are recorded against the file and the walk continues;
    /// everything else aborts the run.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

impl StorageError {
    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl IndexError {
    /// Create an invalid-root error.
    pub fn invalid_root(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::InvalidRoot {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}
