//! Per-root statistics.

use rusqlite::Connection;

use super::models::RootCounts;
use super::scope::PathScope;
use crate::error::StorageError;
use crate::Result;

/// Counts and recency for files stored under `root`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn counts_for_root(conn: &Connection, root: &PathScope) -> Result<RootCounts> {
    let predicate = PathScope::sql_predicate("f.path");
    let params = root.sql_params();

    let (files_total, last_indexed_at): (i64, Option<i64>) = conn
        .query_row(
            &format!("SELECT COUNT(*), MAX(f.last_indexed_at) FROM files f WHERE {predicate}"),
            rusqlite::params_from_iter(params.iter()),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| StorageError::Database(format!("failed to count files: {e}")))?;

    let (files_with_text, chunks_total): (i64, i64) = conn
        .query_row(
            &format!(
                "SELECT COUNT(DISTINCT c.file_id), COUNT(c.id)
                 FROM chunks c JOIN files f ON f.id = c.file_id
                 WHERE {predicate}"
            ),
            rusqlite::params_from_iter(params.iter()),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| StorageError::Database(format!("failed to count chunks: {e}")))?;

    Ok(RootCounts {
        files_total,
        files_with_text,
        chunks_total,
        last_indexed_at,
    })
}
