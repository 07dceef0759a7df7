//! `SQLite` storage with FTS5 full-text search.
//!
//! This module provides persistent storage for:
//! - File metadata and change-detection bookkeeping
//! - Text chunks and their full-text index entries
//! - Caller-owned settings

mod chunks;
mod connection;
mod files;
mod models;
mod schema;
mod scope;
mod settings;
mod stats;

pub use chunks::{
    count_chunks, delete_chunks_for_file, get_chunk, get_chunks_for_file, index_consistency,
    insert_chunk, replace_chunks, ConsistencyReport,
};
pub use connection::{with_savepoint, Database};
pub use files::{
    count_tracked_files, delete_files, get_file, list_paths_under, mark_indexed, record_digest,
    record_error, touch_file, upsert_file,
};
pub use models::{now_unix, ChunkRecord, FileEntry, FileStat, FileStatus, RootCounts};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};
pub use scope::{any_scope_predicate, PathScope};
pub use settings::{get_setting, set_setting};
pub use stats::counts_for_root;

/// Initialize storage with migrations.
///
/// # Errors
///
/// Returns an error if database initialization fails.
pub fn init_storage(db: &Database) -> crate::Result<()> {
    db.with_conn(|conn| {
        migrate(conn)?;
        verify_schema(conn)?;

        tracing::info!("Storage initialized, schema version {SCHEMA_VERSION}");
        Ok(())
    })
}

/// Open a store file and bring its schema up to date.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrated.
pub fn open_store(path: impl AsRef<std::path::Path>) -> crate::Result<Database> {
    let db = Database::open(path)?;
    init_storage(&db)?;
    Ok(db)
}
