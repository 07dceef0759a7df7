//! Directory scopes.
//!
//! A scope is a directory prefix that always ends in a path separator, so a
//! scope of `/a/b` matches `/a/b/file.txt` but never `/a/bc.txt`.

use rusqlite::types::Value;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// Whether paths on this platform compare case-insensitively.
const CASE_INSENSITIVE: bool = cfg!(any(windows, target_os = "macos"));

/// A normalized directory prefix.
///
/// On case-insensitive platforms the prefix keeps its on-disk case. SQL
/// matching folds ASCII letters only (`COLLATE NOCASE`), so a scope naming an
/// existing directory matches exactly, while a scope for a directory that does
/// not exist matches only up to ASCII case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathScope {
    prefix: String,
}

impl PathScope {
    /// Build a scope for `dir`.
    ///
    /// Relative paths are resolved against the current directory. An existing
    /// directory is canonicalized, so `.`, `..` and symlinks resolve the same
    /// way stored paths do. Otherwise `.` and `..` are removed lexically.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let absolute = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(dir))
                .unwrap_or_else(|_| dir.to_path_buf())
        };
        let resolved = absolute
            .canonicalize()
            .unwrap_or_else(|_| lexical_normalize(&absolute));

        let mut prefix = resolved.to_string_lossy().into_owned();
        if !prefix.ends_with(MAIN_SEPARATOR) {
            prefix.push(MAIN_SEPARATOR);
        }

        Self { prefix }
    }

    /// The prefix, including its trailing separator.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `path` lies beneath this scope.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        normalize_case(path).starts_with(&normalize_case(&self.prefix))
    }

    /// SQL predicate testing `column` against this scope.
    ///
    /// Binds two positional parameters, supplied by [`PathScope::sql_params`].
    #[must_use]
    pub fn sql_predicate(column: &str) -> String {
        if CASE_INSENSITIVE {
            format!("substr({column}, 1, length(?)) = ? COLLATE NOCASE")
        } else {
            format!("substr({column}, 1, length(?)) = ?")
        }
    }

    /// Parameters for one [`PathScope::sql_predicate`].
    #[must_use]
    pub fn sql_params(&self) -> [Value; 2] {
        [
            Value::Text(self.prefix.clone()),
            Value::Text(self.prefix.clone()),
        ]
    }
}

/// SQL `(p1 OR p2 ...)` over several scopes, with its parameters appended to
/// `params`. Returns `None` when there are no scopes (no restriction).
#[must_use]
pub fn any_scope_predicate(
    column: &str,
    scopes: &[PathScope],
    params: &mut Vec<Value>,
) -> Option<String> {
    if scopes.is_empty() {
        return None;
    }

    let clauses: Vec<String> = scopes
        .iter()
        .map(|scope| {
            params.extend(scope.sql_params());
            PathScope::sql_predicate(column)
        })
        .collect();

    Some(format!("({})", clauses.join(" OR ")))
}

/// Drop `.` components and fold `..` into its parent without touching the
/// filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn normalize_case(path: &str) -> String {
    if CASE_INSENSITIVE {
        path.to_lowercase()
    } else {
        path.to_string()
    }
}
