//! Caller-owned key/value settings.
//!
//! Values are stored as JSON text; the last write wins.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;
use crate::Result;

/// Read a setting, returning `default` when the key is absent.
///
/// A stored value that no longer decodes as `T` is logged and also yields
/// `default`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_setting<T: DeserializeOwned>(conn: &Connection, key: &str, default: T) -> Result<T> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| StorageError::Database(format!("failed to read setting: {e}")))?;

    let Some(raw) = raw else {
        return Ok(default);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Stored setting is unreadable, using default");
            Ok(default)
        }
    }
}

/// Write a setting.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized or the write fails.
pub fn set_setting<T: Serialize + ?Sized>(conn: &Connection, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)
        .map_err(|e| StorageError::Serialization(format!("setting '{key}': {e}")))?;

    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, raw],
    )
    .map_err(|e| StorageError::Database(format!("failed to write setting: {e}")))?;

    tracing::debug!(key, "Setting saved");
    Ok(())
}
