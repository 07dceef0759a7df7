//! File metadata storage for incremental indexing.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;

use super::chunks::delete_chunks_for_file;
use super::models::{FileEntry, FileStat, FileStatus};
use super::scope::PathScope;
use crate::error::StorageError;
use crate::Result;

const FILE_COLUMNS: &str = "id, path, size, mtime, created_at, file_key, digest, \
                            hash_checked_at, last_indexed_at, last_seen, status";

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileEntry> {
    let status: String = row.get(10)?;
    Ok(FileEntry {
        id: row.get(0)?,
        path: row.get(1)?,
        size: row.get(2)?,
        mtime: row.get(3)?,
        created_at: row.get(4)?,
        file_key: row.get(5)?,
        digest: row.get(6)?,
        hash_checked_at: row.get(7)?,
        last_indexed_at: row.get(8)?,
        last_seen: row.get(9)?,
        status: FileStatus::from_column(&status),
    })
}

/// Get a file record by path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_file(conn: &Connection, path: &str) -> Result<Option<FileEntry>> {
    conn.query_row(
        &format!("SELECT {FILE_COLUMNS} FROM files WHERE path = ?"),
        [path],
        row_to_entry,
    )
    .optional()
    .map_err(|e| StorageError::Database(format!("failed to get file: {e}")).into())
}

/// Insert or update a file's metadata, keyed by path.
///
/// The row identifier is preserved on update, so existing chunks stay
/// attached. A known creation time is kept when the platform reports none.
/// Returns the row identifier.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn upsert_file(conn: &Connection, path: &str, stat: &FileStat, now: i64) -> Result<i64> {
    conn.query_row(
        "INSERT INTO files (path, size, mtime, file_key, created_at, status, last_seen)
         VALUES (?1, ?2, ?3, ?4, ?5, 'ok', ?6)
         ON CONFLICT(path) DO UPDATE SET
            size = excluded.size,
            mtime = excluded.mtime,
            file_key = excluded.file_key,
            created_at = COALESCE(excluded.created_at, files.created_at),
            status = 'ok',
            last_seen = excluded.last_seen
         RETURNING id",
        params![path, stat.size, stat.mtime, stat.file_key, stat.created_at, now],
        |row| row.get(0),
    )
    .map_err(|e| StorageError::Database(format!("failed to upsert file: {e}")).into())
}

/// Record a visit that changed nothing: bump `last_seen`, mark healthy.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn touch_file(conn: &Connection, path: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE files SET last_seen = ?, status = 'ok' WHERE path = ?",
        params![now, path],
    )
    .map_err(|e| StorageError::Database(format!("failed to touch file: {e}")))?;
    Ok(())
}

/// Store a freshly computed digest and its verification time.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn record_digest(conn: &Connection, file_id: i64, digest: &str, checked_at: i64) -> Result<()> {
    conn.execute(
        "UPDATE files SET digest = ?, hash_checked_at = ? WHERE id = ?",
        params![digest, checked_at, file_id],
    )
    .map_err(|e| StorageError::Database(format!("failed to record digest: {e}")))?;
    Ok(())
}

/// Stamp the time a file's chunk set was last rewritten.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn mark_indexed(conn: &Connection, file_id: i64, indexed_at: i64) -> Result<()> {
    conn.execute(
        "UPDATE files SET last_indexed_at = ? WHERE id = ?",
        params![indexed_at, file_id],
    )
    .map_err(|e| StorageError::Database(format!("failed to mark file indexed: {e}")))?;
    Ok(())
}

/// Record a failed visit.
///
/// Only inserts when the path is unknown; an existing record is left as it
/// was. Returns whether a row was inserted.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn record_error(conn: &Connection, path: &str, now: i64) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO files (path, status, last_seen) VALUES (?, 'error', ?)",
            params![path, now],
        )
        .map_err(|e| StorageError::Database(format!("failed to record file error: {e}")))?;
    Ok(inserted > 0)
}

/// All stored paths under `scope`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_paths_under(conn: &Connection, scope: &PathScope) -> Result<HashSet<String>> {
    let sql = format!(
        "SELECT path FROM files WHERE {}",
        PathScope::sql_predicate("path")
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| StorageError::Database(format!("failed to prepare query: {e}")))?;

    let paths = stmt
        .query_map(rusqlite::params_from_iter(scope.sql_params()), |row| {
            row.get(0)
        })
        .map_err(|e| StorageError::Database(format!("failed to list paths: {e}")))?
        .collect::<std::result::Result<HashSet<String>, _>>()
        .map_err(|e| StorageError::Database(format!("failed to read path: {e}")))?;

    Ok(paths)
}

/// Delete file records together with their chunks and index entries.
///
/// Returns the number of file records removed.
///
/// # Errors
///
/// Returns an error if any deletion fails.
pub fn delete_files<'a>(
    conn: &Connection,
    paths: impl IntoIterator<Item = &'a str>,
) -> Result<usize> {
    let mut deleted = 0;

    for path in paths {
        let id: Option<i64> = conn
            .query_row("SELECT id FROM files WHERE path = ?", [path], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| StorageError::Database(format!("failed to look up file: {e}")))?;

        let Some(id) = id else { continue };

        delete_chunks_for_file(conn, id)?;
        deleted += conn
            .execute("DELETE FROM files WHERE id = ?", [id])
            .map_err(|e| StorageError::Database(format!("failed to delete file: {e}")))?;

        tracing::trace!(path, "Deleted file record");
    }

    Ok(deleted)
}

/// Count tracked files.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_tracked_files(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}
