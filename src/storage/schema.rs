//! Database schema definitions and migrations.
//!
//! Migrations are versioned and additive: later versions only add nullable
//! columns or new tables, so rows written by an older version stay readable
//! and their missing values read back as `NULL` ("unknown/never").

use rusqlite::Connection;

use crate::error::StorageError;
use crate::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if migrations fail.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| StorageError::Migration(format!("failed to create migrations table: {e}")))?;

    let current_version = get_current_version(conn)?;
    tracing::debug!(
        current = current_version,
        target = SCHEMA_VERSION,
        "Checking database migrations"
    );

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version.
fn get_current_version(conn: &Connection) -> Result<i32> {
    let result = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    );

    match result {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(StorageError::Migration(format!("failed to get version: {e}")).into()),
    }
}

fn record_migration(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)",
        rusqlite::params![version, super::models::now_unix()],
    )
    .map_err(|e| StorageError::Migration(format!("failed to record migration: {e}")))?;

    Ok(())
}

/// Migration v1: files, chunks, the full-text index and its chunk mapping.
fn migrate_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Applying migration v1: Initial schema");

    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            size INTEGER NOT NULL DEFAULT 0,
            mtime INTEGER NOT NULL DEFAULT 0,
            file_key TEXT,
            status TEXT NOT NULL DEFAULT 'ok',
            last_seen INTEGER
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY,
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            ord INTEGER NOT NULL,
            text TEXT NOT NULL,
            bytes_from INTEGER NOT NULL,
            bytes_to INTEGER NOT NULL,
            UNIQUE(file_id, ord)
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_id);
        CREATE INDEX IF NOT EXISTS idx_chunks_ord ON chunks(ord);

        -- Contentless: chunk text lives in `chunks`, entries are removed
        -- through the FTS5 'delete' command.
        CREATE VIRTUAL TABLE IF NOT EXISTS fts USING fts5(
            text, tokenize='porter', content='', prefix=2
        );

        -- Index rowid -> chunk id.
        CREATE TABLE IF NOT EXISTS fts_map (
            rowid INTEGER PRIMARY KEY,
            chunk_id INTEGER NOT NULL UNIQUE REFERENCES chunks(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )
    .map_err(|e| StorageError::Migration(format!("v1 migration failed: {e}")))?;

    record_migration(conn, 1)?;
    tracing::info!("Migration v1 complete");

    Ok(())
}

/// Migration v2: content digest and index bookkeeping columns.
fn migrate_v2(conn: &Connection) -> Result<()> {
    tracing::info!("Applying migration v2: digest and index timestamps");

    ensure_column(conn, "files", "digest", "TEXT")?;
    ensure_column(conn, "files", "hash_checked_at", "INTEGER")?;
    ensure_column(conn, "files", "last_indexed_at", "INTEGER")?;
    ensure_column(conn, "files", "created_at", "INTEGER")?;

    conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_files_mtime ON files(mtime);")
        .map_err(|e| StorageError::Migration(format!("v2 migration failed: {e}")))?;

    record_migration(conn, 2)?;
    tracing::info!("Migration v2 complete");

    Ok(())
}

/// Add a column unless the table already has it.
fn ensure_column(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<()> {
    if has_column(conn, table, column)? {
        return Ok(());
    }

    conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"))
        .map_err(|e| {
            StorageError::Migration(format!("failed to add column {table}.{column}: {e}"))
        })?;

    tracing::debug!(table, column, "Added column");
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(|e| StorageError::Migration(format!("failed to inspect {table}: {e}")))?;

    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| StorageError::Migration(format!("failed to inspect {table}: {e}")))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Migration(format!("failed to inspect {table}: {e}")))?;

    Ok(names.iter().any(|name| name == column))
}

/// Verify all expected tables exist.
///
/// # Errors
///
/// Returns an error if any expected table is missing from the schema.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    let tables = ["files", "chunks", "fts", "fts_map", "settings"];

    for table in tables {
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?",
                [table],
                |_| Ok(true),
            )
            .unwrap_or(false);

        if !exists {
            return Err(StorageError::Migration(format!("table '{table}' not found")).into());
        }
    }

    for column in ["digest", "hash_checked_at", "last_indexed_at", "created_at"] {
        if !has_column(conn, "files", column)? {
            return Err(
                StorageError::Migration(format!("column 'files.{column}' not found")).into(),
            );
        }
    }

    tracing::debug!("Schema verification passed");
    Ok(())
}
