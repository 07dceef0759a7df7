//! Ranked and recency retrieval over the chunk index.

use std::collections::HashSet;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};

use super::filter::compile_pattern;
use super::normalize::{normalize_query, NormalizedQuery};
use crate::error::{QueryError, StorageError};
use crate::storage::{any_scope_predicate, PathScope};
use crate::{Error, Result};

/// Default result cap.
pub const DEFAULT_TOP_K: usize = 200;

/// One chunk returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub chunk_id: i64,
    pub ordinal: i64,
    pub text: String,
    pub path: String,
}

/// File timestamp used for recency ordering and the `since` filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeField {
    #[default]
    Modified,
    Created,
}

impl TimeField {
    const fn column(self) -> &'static str {
        match self {
            Self::Modified => "f.mtime",
            Self::Created => "f.created_at",
        }
    }
}

/// Parameters of a search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Raw user query.
    pub query: String,
    /// Maximum number of ranked candidates.
    pub top_k: usize,
    /// Restrict to files under any of these scopes; empty means everywhere.
    pub scopes: Vec<PathScope>,
    /// Keep files whose `time_field` is at least this Unix timestamp.
    pub min_timestamp: Option<i64>,
    /// Timestamp used for filtering and show-all ordering.
    pub time_field: TimeField,
    /// Case-insensitive pattern applied to candidate chunks before they are
    /// reduced to one per file.
    pub pattern: Option<String>,
}

impl SearchRequest {
    /// Create a request with defaults.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: DEFAULT_TOP_K,
            scopes: Vec::new(),
            min_timestamp: None,
            time_field: TimeField::default(),
            pattern: None,
        }
    }

    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<PathScope>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub const fn since(mut self, timestamp: i64, field: TimeField) -> Self {
        self.min_timestamp = Some(timestamp);
        self.time_field = field;
        self
    }

    #[must_use]
    pub const fn with_time_field(mut self, field: TimeField) -> Self {
        self.time_field = field;
        self
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

/// Run a search, returning at most one hit per file.
///
/// Ranked results are ordered best first. Show-all results (empty or
/// wildcard-only query) are the first chunk of each file, newest first.
///
/// # Errors
///
/// Returns `QueryError::Syntax` for a malformed match expression,
/// `QueryError::InvalidPattern` for a bad `pattern`, or a storage error.
pub fn search(conn: &Connection, request: &SearchRequest) -> Result<Vec<SearchHit>> {
    let pattern = request.pattern.as_deref().map(compile_pattern).transpose()?;

    let normalized = normalize_query(&request.query);
    let mut rows = match &normalized {
        NormalizedQuery::ShowAll => show_all(conn, request)?,
        NormalizedQuery::Match(expr) => ranked(conn, expr, request)?,
    };

    if let Some(re) = pattern {
        rows.retain(|row| re.is_match(&row.text));
    }

    let hits = best_per_file(rows);
    tracing::debug!(
        query = %request.query,
        show_all = matches!(normalized, NormalizedQuery::ShowAll),
        hits = hits.len(),
        "Search complete"
    );
    Ok(hits)
}

fn show_all(conn: &Connection, request: &SearchRequest) -> Result<Vec<SearchHit>> {
    let column = request.time_field.column();
    let mut params = Vec::new();
    let filters = restrictions(request, &mut params);
    params.push(limit(request.top_k));

    let sql = format!(
        "SELECT c.id, c.ord, c.text, f.path
         FROM chunks c
         JOIN files f ON f.id = c.file_id
         WHERE c.ord = 0{filters}
         ORDER BY {column} DESC, f.path
         LIMIT ?"
    );

    run(conn, &sql, params).map_err(|e| StorageError::Database(format!("search failed: {e}")).into())
}

fn ranked(conn: &Connection, expr: &str, request: &SearchRequest) -> Result<Vec<SearchHit>> {
    let mut params = vec![Value::Text(expr.to_string())];
    let filters = restrictions(request, &mut params);
    params.push(limit(request.top_k));

    let sql = format!(
        "SELECT c.id, c.ord, c.text, f.path
         FROM fts
         JOIN fts_map m ON m.rowid = fts.rowid
         JOIN chunks c ON c.id = m.chunk_id
         JOIN files f ON f.id = c.file_id
         WHERE fts MATCH ?{filters}
         ORDER BY bm25(fts)
         LIMIT ?"
    );

    run(conn, &sql, params).map_err(|e| classify(expr, &e))
}

/// Time and scope conditions, each prefixed with `AND`.
fn restrictions(request: &SearchRequest, params: &mut Vec<Value>) -> String {
    let mut sql = String::new();

    if let Some(ts) = request.min_timestamp {
        sql.push_str(&format!(" AND {} >= ?", request.time_field.column()));
        params.push(Value::Integer(ts));
    }

    if let Some(scopes) = any_scope_predicate("f.path", &request.scopes, params) {
        sql.push_str(" AND ");
        sql.push_str(&scopes);
    }

    sql
}

fn limit(top_k: usize) -> Value {
    Value::Integer(i64::try_from(top_k).unwrap_or(i64::MAX))
}

fn run(conn: &Connection, sql: &str, params: Vec<Value>) -> rusqlite::Result<Vec<SearchHit>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), |row| {
            Ok(SearchHit {
                chunk_id: row.get(0)?,
                ordinal: row.get(1)?,
                text: row.get(2)?,
                path: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Errors raised by the full-text engine while parsing the expression are
/// the caller's syntax; anything else is a storage failure.
fn classify(expr: &str, e: &rusqlite::Error) -> Error {
    let message = e.to_string();
    let is_syntax = ["fts5", "unterminated string", "no such column", "unknown special query"]
        .iter()
        .any(|needle| message.contains(needle));

    if is_syntax {
        tracing::debug!(query = expr, error = %message, "Rejected search syntax");
        QueryError::Syntax(message).into()
    } else {
        StorageError::Database(format!("search failed: {message}")).into()
    }
}

/// Keep the first (best ranked) hit of each file, preserving order.
fn best_per_file(rows: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.path.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{migrate, replace_chunks, upsert_file, ChunkRecord, FileStat};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn add_file(conn: &Connection, path: &str, mtime: i64, created: Option<i64>, chunks: &[&str]) {
        let stat = FileStat {
            size: 1,
            mtime,
            created_at: created,
            file_key: None,
        };
        let id = upsert_file(conn, path, &stat, mtime).unwrap();
        let records: Vec<ChunkRecord> = chunks
            .iter()
            .enumerate()
            .map(|(i, text)| ChunkRecord::new(id, i as i64, *text, 0, text.len() as i64))
            .collect();
        replace_chunks(conn, id, &records).unwrap();
    }

    fn paths(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.path.as_str()).collect()
    }

    #[test]
    fn test_ranked_search_finds_text() {
        let conn = setup();
        add_file(&conn, "/r/notes.txt", 100, None, &["hello hello world"]);
        add_file(&conn, "/r/other.txt", 100, None, &["goodbye moon"]);

        let hits = search(&conn, &SearchRequest::new("hello")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "/r/notes.txt");
        assert_eq!(hits[0].text, "hello hello world");
        assert_eq!(hits[0].ordinal, 0);
    }

    #[test]
    fn test_ranking_prefers_denser_match() {
        let conn = setup();
        add_file(&conn, "/r/weak.txt", 100, None, &["fox and many other unrelated words here"]);
        add_file(&conn, "/r/strong.txt", 100, None, &["fox fox fox"]);

        let hits = search(&conn, &SearchRequest::new("fox")).unwrap();
        assert_eq!(paths(&hits), vec!["/r/strong.txt", "/r/weak.txt"]);
    }

    #[test]
    fn test_one_hit_per_file() {
        let conn = setup();
        add_file(&conn, "/r/multi.txt", 100, None, &["apple pie", "apple apple apple", "pear"]);

        let hits = search(&conn, &SearchRequest::new("apple")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ordinal, 1);
    }

    #[test]
    fn test_show_all_orders_by_recency() {
        let conn = setup();
        add_file(&conn, "/r/old.txt", 100, None, &["first", "second"]);
        add_file(&conn, "/r/new.txt", 300, None, &["newest"]);
        add_file(&conn, "/r/mid.txt", 200, None, &["middle"]);

        let hits = search(&conn, &SearchRequest::new("")).unwrap();
        assert_eq!(paths(&hits), vec!["/r/new.txt", "/r/mid.txt", "/r/old.txt"]);
        assert!(hits.iter().all(|h| h.ordinal == 0));

        let capped = search(&conn, &SearchRequest::new("*").with_top_k(1)).unwrap();
        assert_eq!(paths(&capped), vec!["/r/new.txt"]);
    }

    #[test]
    fn test_min_timestamp_filters_both_modes() {
        let conn = setup();
        add_file(&conn, "/r/old.txt", 100, None, &["shared term"]);
        add_file(&conn, "/r/new.txt", 300, None, &["shared term"]);

        let recent = SearchRequest::new("shared").since(200, TimeField::Modified);
        assert_eq!(paths(&search(&conn, &recent).unwrap()), vec!["/r/new.txt"]);

        let future = SearchRequest::new("").since(10_000, TimeField::Modified);
        assert!(search(&conn, &future).unwrap().is_empty());
    }

    #[test]
    fn test_created_field_excludes_unknown_creation_time() {
        let conn = setup();
        add_file(&conn, "/r/known.txt", 100, Some(500), &["term"]);
        add_file(&conn, "/r/unknown.txt", 900, None, &["term"]);

        let request = SearchRequest::new("term").since(400, TimeField::Created);
        assert_eq!(paths(&search(&conn, &request).unwrap()), vec!["/r/known.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_scope_requires_separator_boundary() {
        let conn = setup();
        add_file(&conn, "/root/abfile.txt", 100, None, &["needle"]);
        add_file(&conn, "/root/ab/file.txt", 100, None, &["needle"]);
        add_file(&conn, "/elsewhere/x.txt", 100, None, &["needle"]);

        let request = SearchRequest::new("needle").with_scopes(vec![PathScope::new("/root/ab")]);
        assert_eq!(paths(&search(&conn, &request).unwrap()), vec!["/root/ab/file.txt"]);

        let two = SearchRequest::new("")
            .with_scopes(vec![PathScope::new("/root/ab"), PathScope::new("/elsewhere")]);
        assert_eq!(search(&conn, &two).unwrap().len(), 2);
    }

    #[test]
    fn test_punctuation_does_not_break_query() {
        let conn = setup();
        add_file(&conn, "/r/a.txt", 100, None, &["c++ templates"]);

        assert!(search(&conn, &SearchRequest::new("c++ -x: y*")).is_ok());
    }

    #[test]
    fn test_malformed_operator_query_is_syntax_error() {
        let conn = setup();
        add_file(&conn, "/r/a.txt", 100, None, &["cat"]);

        let err = search(&conn, &SearchRequest::new("(cat AND")).unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::Syntax(_))), "{err}");
    }

    #[test]
    fn test_pattern_filters_before_reduction() {
        let conn = setup();
        add_file(&conn, "/r/multi.txt", 100, None, &["report report report", "report 2024-01-05"]);

        let plain = search(&conn, &SearchRequest::new("report")).unwrap();
        assert_eq!(plain[0].ordinal, 0);

        let dated = SearchRequest::new("report").with_pattern(r"\d{4}-\d{2}-\d{2}");
        let hits = search(&conn, &dated).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ordinal, 1);
    }

    #[test]
    fn test_bad_pattern_rejected_before_querying() {
        let conn = setup();
        let err = search(&conn, &SearchRequest::new("x").with_pattern("[")).unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::InvalidPattern { .. })));
    }

    #[test]
    fn test_time_field_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TimeField::Created).unwrap(), "\"created\"");
    }
}
