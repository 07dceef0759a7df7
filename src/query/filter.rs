//! Secondary pattern filtering over search hits.

use regex::{Regex, RegexBuilder};

use super::search::SearchHit;
use crate::error::QueryError;
use crate::Result;

/// Compile a case-insensitive pattern.
///
/// # Errors
///
/// Returns `QueryError::InvalidPattern` if the pattern does not compile.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| {
            QueryError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
}

/// Keep hits whose chunk text matches `pattern`, case-insensitively.
///
/// Only the text of each hit is inspected. Applied to per-file results, a
/// match that exists only in another chunk of the same file is not seen.
///
/// # Errors
///
/// Returns `QueryError::InvalidPattern` if the pattern does not compile.
pub fn regex_filter(rows: Vec<SearchHit>, pattern: &str) -> Result<Vec<SearchHit>> {
    let re = compile_pattern(pattern)?;
    Ok(rows.into_iter().filter(|row| re.is_match(&row.text)).collect())
}
