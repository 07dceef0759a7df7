//! Path filtering: text eligibility and directory exclusion.

use std::path::Path;

/// Extensions whose contents are extracted and indexed.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "py", "js", "ts", "json", "yaml", "yml", "html", "htm", "css", "sql", "ini",
    "cfg", "log", "csv", "tsv", "toml",
];

/// Extensions whose markup tags are stripped before indexing.
const MARKUP_EXTENSIONS: &[&str] = &["html", "htm"];

/// File filter for indexing.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    excludes: Vec<String>,
}

impl FileFilter {
    /// Create a filter that skips directories whose path contains any of
    /// `excludes`.
    #[must_use]
    pub fn new(excludes: &[String]) -> Self {
        Self {
            excludes: excludes
                .iter()
                .filter(|s| !s.is_empty())
                .cloned()
                .collect(),
        }
    }

    /// Whether a directory below `root` must not be descended into.
    ///
    /// Only occurrences reaching past the root's own path count, so a root
    /// such as `~/dev/build/site` is walked in full while its own `build`
    /// subdirectories are still skipped.
    #[must_use]
    pub fn is_excluded_dir(&self, root: &Path, dir: &Path) -> bool {
        let root_len = root.to_string_lossy().len();
        let dir = dir.to_string_lossy();
        self.excludes.iter().any(|needle| {
            dir.match_indices(needle.as_str())
                .any(|(at, found)| at + found.len() > root_len)
        })
    }

    /// Whether a file's contents are extracted, judged by extension alone.
    #[must_use]
    pub fn is_text_eligible(path: &Path) -> bool {
        has_extension(path, TEXT_EXTENSIONS)
    }

    /// Whether markup tags are stripped from this file's text.
    #[must_use]
    pub fn is_markup(path: &Path) -> bool {
        has_extension(path, MARKUP_EXTENSIONS)
    }
}

fn has_extension(path: &Path, list: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_lowercase();
            list.iter().any(|candidate| *candidate == ext)
        })
}
