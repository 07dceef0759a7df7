//! Query engine.
//!
//! Normalizes user input, runs ranked or recency retrieval with scope and
//! time restrictions, and reduces results to one chunk per file.

mod filter;
mod normalize;
mod search;
mod time;

use rusqlite::Connection;

pub use filter::{compile_pattern, regex_filter};
pub use normalize::{normalize_query, NormalizedQuery};
pub use search::{search, SearchHit, SearchRequest, TimeField, DEFAULT_TOP_K};
pub use time::{resolve_time_field, ResolvedTimeField};

use crate::storage::{get_setting, set_setting, PathScope};
use crate::Result;

/// Settings key holding the persisted search scope directories.
pub const SEARCH_SCOPES_KEY: &str = "search_scopes";

/// Load persisted scope directories.
///
/// # Errors
///
/// Returns an error if the settings table cannot be read.
pub fn load_scopes(conn: &Connection) -> Result<Vec<String>> {
    get_setting(conn, SEARCH_SCOPES_KEY, Vec::new())
}

/// Persist scope directories, replacing the previous list.
///
/// # Errors
///
/// Returns an error if the settings table cannot be written.
pub fn save_scopes(conn: &Connection, dirs: &[String]) -> Result<()> {
    set_setting(conn, SEARCH_SCOPES_KEY, dirs)
}

/// Persisted scopes as search restrictions.
///
/// # Errors
///
/// Returns an error if the settings table cannot be read.
pub fn scope_filters(conn: &Connection) -> Result<Vec<PathScope>> {
    Ok(load_scopes(conn)?.iter().map(PathScope::new).collect())
}
