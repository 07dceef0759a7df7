//! Chunk storage operations.
//!
//! Every chunk has exactly one full-text entry, reached through `fts_map`.
//! Chunks are only written through [`insert_chunk`] and only removed through
//! [`delete_chunks_for_file`], which keep the three tables in step inside the
//! caller's transaction.

use rusqlite::{params, Connection};

use super::models::ChunkRecord;
use crate::error::StorageError;
use crate::Result;

/// Insert a chunk and its full-text entry.
///
/// Returns the assigned chunk ID.
///
/// # Errors
///
/// Returns an error if the insertion fails.
pub fn insert_chunk(conn: &Connection, chunk: &ChunkRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO chunks (file_id, ord, text, bytes_from, bytes_to) VALUES (?, ?, ?, ?, ?)",
        params![
            chunk.file_id,
            chunk.ordinal,
            chunk.text,
            chunk.byte_from,
            chunk.byte_to,
        ],
    )
    .map_err(|e| StorageError::Database(format!("failed to insert chunk: {e}")))?;
    let chunk_id = conn.last_insert_rowid();

    conn.execute("INSERT INTO fts (text) VALUES (?)", [&chunk.text])
        .map_err(|e| StorageError::Database(format!("failed to index chunk: {e}")))?;
    let fts_rowid = conn.last_insert_rowid();

    conn.execute(
        "INSERT INTO fts_map (rowid, chunk_id) VALUES (?, ?)",
        params![fts_rowid, chunk_id],
    )
    .map_err(|e| StorageError::Database(format!("failed to map index entry: {e}")))?;

    tracing::trace!(chunk_id, fts_rowid, file_id = chunk.file_id, "Inserted chunk");
    Ok(chunk_id)
}

/// Replace a file's whole chunk set.
///
/// Returns the number of chunks written.
///
/// # Errors
///
/// Returns an error if any deletion or insertion fails.
pub fn replace_chunks(conn: &Connection, file_id: i64, chunks: &[ChunkRecord]) -> Result<usize> {
    let removed = delete_chunks_for_file(conn, file_id)?;

    for chunk in chunks {
        debug_assert_eq!(chunk.file_id, file_id);
        insert_chunk(conn, chunk)?;
    }

    tracing::debug!(file_id, removed, written = chunks.len(), "Replaced chunk set");
    Ok(chunks.len())
}

/// Delete all chunks of a file along with their index entries.
///
/// Returns the number of chunks deleted.
///
/// # Errors
///
/// Returns an error if the deletion fails.
pub fn delete_chunks_for_file(conn: &Connection, file_id: i64) -> Result<usize> {
    let entries: Vec<(i64, String)> = {
        let mut stmt = conn
            .prepare(
                "SELECT m.rowid, c.text FROM chunks c
                 JOIN fts_map m ON m.chunk_id = c.id
                 WHERE c.file_id = ?",
            )
            .map_err(|e| StorageError::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([file_id], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| StorageError::Database(format!("failed to query: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Database(format!("failed to read index entry: {e}")))?;
        rows
    };

    for (rowid, text) in &entries {
        conn.execute(
            "INSERT INTO fts (fts, rowid, text) VALUES ('delete', ?, ?)",
            params![rowid, text],
        )
        .map_err(|e| StorageError::Database(format!("failed to remove index entry: {e}")))?;
    }

    conn.execute(
        "DELETE FROM fts_map WHERE chunk_id IN (SELECT id FROM chunks WHERE file_id = ?)",
        [file_id],
    )
    .map_err(|e| StorageError::Database(format!("failed to delete index mapping: {e}")))?;

    let count = conn
        .execute("DELETE FROM chunks WHERE file_id = ?", [file_id])
        .map_err(|e| StorageError::Database(format!("failed to delete chunks: {e}")))?;

    if count > 0 {
        tracing::trace!(file_id, count, "Deleted chunks for file");
    }
    Ok(count)
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRecord> {
    Ok(ChunkRecord {
        id: Some(row.get(0)?),
        file_id: row.get(1)?,
        ordinal: row.get(2)?,
        text: row.get(3)?,
        byte_from: row.get(4)?,
        byte_to: row.get(5)?,
    })
}

/// Get a chunk by ID.
///
/// # Errors
///
/// Returns an error if the chunk is not found or query fails.
pub fn get_chunk(conn: &Connection, id: i64) -> Result<ChunkRecord> {
    conn.query_row(
        "SELECT id, file_id, ord, text, bytes_from, bytes_to FROM chunks WHERE id = ?",
        [id],
        row_to_chunk,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("chunk", id.to_string()).into(),
        e => StorageError::Database(format!("failed to get chunk: {e}")).into(),
    })
}

/// Get all chunks of a file, in ordinal order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_chunks_for_file(conn: &Connection, file_id: i64) -> Result<Vec<ChunkRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, file_id, ord, text, bytes_from, bytes_to FROM chunks
             WHERE file_id = ? ORDER BY ord",
        )
        .map_err(|e| StorageError::Database(format!("failed to prepare query: {e}")))?;

    let chunks = stmt
        .query_map([file_id], row_to_chunk)
        .map_err(|e| StorageError::Database(format!("failed to query chunks: {e}")))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(format!("failed to read chunk: {e}")))?;

    Ok(chunks)
}

/// Count total chunks in database.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_chunks(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(format!("failed to count chunks: {e}")).into())
}

/// Chunk/index bookkeeping totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Stored chunks.
    pub chunks: i64,
    /// Rows in the index mapping.
    pub index_entries: i64,
    /// Mapping rows whose chunk no longer exists.
    pub orphaned_entries: i64,
    /// Chunks without a mapping row.
    pub unmapped_chunks: i64,
}

impl ConsistencyReport {
    /// Every chunk has exactly one index entry and vice versa.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.orphaned_entries == 0 && self.unmapped_chunks == 0 && self.chunks == self.index_entries
    }
}

/// Check the one-entry-per-chunk invariant.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn index_consistency(conn: &Connection) -> Result<ConsistencyReport> {
    conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM chunks),
            (SELECT COUNT(*) FROM fts_map),
            (SELECT COUNT(*) FROM fts_map m LEFT JOIN chunks c ON c.id = m.chunk_id
                WHERE c.id IS NULL),
            (SELECT COUNT(*) FROM chunks c LEFT JOIN fts_map m ON m.chunk_id = c.id
                WHERE m.rowid IS NULL)",
        [],
        |row| {
            Ok(ConsistencyReport {
                chunks: row.get(0)?,
                index_entries: row.get(1)?,
                orphaned_entries: row.get(2)?,
                unmapped_chunks: row.get(3)?,
            })
        },
    )
    .map_err(|e| StorageError::Database(format!("failed to check index consistency: {e}")).into())
}
