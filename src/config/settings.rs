//! Configuration settings and validation.

use crate::indexer::{HashPolicy, IndexOptions};
use crate::{Error, Result};
use std::path::PathBuf;

/// Path substrings whose directories are never descended into.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    "node_modules",
    "dist",
    "build",
    "__pycache__",
    "/proc",
    "/sys",
    "/dev",
    "/Volumes",
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\ProgramData",
];

/// Main configuration for trawl.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the `SQLite` store.
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub log_json: bool,

    /// Directory path substrings to skip during the walk.
    pub excludes: Vec<String>,

    /// Maximum bytes read from the start of each text file.
    pub max_read_bytes: u64,

    /// Files processed per committed batch.
    pub batch_size: usize,

    /// Characters per text chunk.
    pub chunk_size: usize,

    /// Remove stored files that were not seen during a completed walk.
    pub prune_missing: bool,

    /// Days before an index pass is considered stale (0 = never).
    pub reindex_days: u32,

    /// Days before a stored digest must be recomputed (0 = always).
    pub verify_hash_days: u32,

    /// Hash large files in full instead of sampling them.
    pub force_full_hash_on_large: bool,

    /// Sampling parameters for large-file fingerprints.
    pub hashing: HashPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            log_json: false,
            excludes: DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect(),
            max_read_bytes: 200_000,
            batch_size: 200,
            chunk_size: 4096,
            prune_missing: false,
            reindex_days: 30,
            verify_hash_days: 7,
            force_full_hash_on_large: false,
            hashing: HashPolicy::default(),
        }
    }
}

/// Platform data directory, falling back to `./data`.
fn default_data_dir() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match home {
        Some(home) if cfg!(target_os = "macos") => home.join("Library/Application Support/trawl"),
        Some(home) => home.join(".local/share/trawl"),
        None => PathBuf::from("./data"),
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.batch_size == 0 {
            return Err(Error::config("batch_size cannot be 0"));
        }

        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size cannot be 0"));
        }

        if self.max_read_bytes == 0 {
            return Err(Error::config("max_read_bytes cannot be 0"));
        }

        self.hashing.validate()?;

        Ok(())
    }

    /// Get the path to the `SQLite` database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("trawl.db")
    }

    /// Indexer options derived from this configuration.
    #[must_use]
    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            excludes: self.excludes.clone(),
            max_read_bytes: self.max_read_bytes,
            batch_size: self.batch_size,
            chunk_size: self.chunk_size,
            prune_missing: self.prune_missing,
            reindex_horizon_days: self.reindex_days,
            verify_hash_horizon_days: self.verify_hash_days,
            force_full_hash_on_large: self.force_full_hash_on_large,
            hashing: self.hashing.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.chunk_size, 4096);
        assert!(config.excludes.iter().any(|e| e == "node_modules"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_batch_size() {
        let config = Config {
            batch_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_validate_zero_chunk_size() {
        let config = Config {
            chunk_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = Config {
            log_level: "loud".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log level"));
    }

    #[test]
    fn test_log_level_case_insensitive() {
        for level in ["TRACE", "Debug", "INFO", "Warn", "ERROR"] {
            let config = Config {
                log_level: level.to_string(),
                ..Default::default()
            };
            assert!(
                config.validate().is_ok(),
                "Level '{level}' should be valid (case insensitive)"
            );
        }
    }

    #[test]
    fn test_validate_rejects_bad_hash_policy() {
        let config = Config {
            hashing: HashPolicy {
                large_threshold_bytes: 10,
                head_bytes: 8,
                tail_bytes: 8,
                ..HashPolicy::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path() {
        let config = Config {
            data_dir: PathBuf::from("/var/lib/trawl"),
            ..Default::default()
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/trawl/trawl.db")
        );
    }

    #[test]
    fn test_index_options_carry_horizons() {
        let config = Config {
            reindex_days: 3,
            verify_hash_days: 0,
            prune_missing: true,
            ..Default::default()
        };
        let options = config.index_options();
        assert_eq!(options.reindex_horizon_days, 3);
        assert_eq!(options.verify_hash_horizon_days, 0);
        assert!(options.prune_missing);
    }
}
