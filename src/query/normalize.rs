//! User query normalization.

use once_cell::sync::Lazy;
use regex::Regex;

/// Explicit full-text syntax: boolean connectives, proximity, grouping, quoting.
static OPERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[()"]|\b(?:AND|OR|NOT|NEAR)\b"#).expect("valid operator regex")
});

/// How a query is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedQuery {
    /// No ranking; most recent files first.
    ShowAll,
    /// Full-text match expression.
    Match(String),
}

/// Turn raw user input into a match expression.
///
/// Empty and wildcard-only input shows everything. Input using explicit
/// operators is passed through untouched. Anything else becomes one quoted
/// phrase, so stray punctuation cannot break the match syntax. A `"` always
/// counts as an operator, so the phrase never contains one.
#[must_use]
pub fn normalize_query(raw: &str) -> NormalizedQuery {
    let trimmed = raw.trim();

    if trimmed
        .chars()
        .all(|c| c == '*' || c == '?' || c.is_whitespace())
    {
        return NormalizedQuery::ShowAll;
    }

    if OPERATOR.is_match(trimmed) {
        return NormalizedQuery::Match(trimmed.to_string());
    }

    NormalizedQuery::Match(format!("\"{trimmed}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(raw: &str) -> String {
        match normalize_query(raw) {
            NormalizedQuery::Match(q) => q,
            NormalizedQuery::ShowAll => panic!("expected a match expression for {raw:?}"),
        }
    }

    #[test]
    fn test_empty_and_wildcards_show_all() {
        for raw in ["", "   ", "*", "?", "* ?", "***"] {
            assert_eq!(normalize_query(raw), NormalizedQuery::ShowAll, "{raw:?}");
        }
    }

    #[test]
    fn test_plain_text_is_quoted() {
        assert_eq!(matched("hello"), "\"hello\"");
        assert_eq!(matched("  hello world "), "\"hello world\"");
        assert_eq!(matched("c++ -foo: bar*"), "\"c++ -foo: bar*\"");
        assert_eq!(matched("it's 5' tall"), "\"it's 5' tall\"");
    }

    #[test]
    fn test_operators_pass_through() {
        assert_eq!(matched("cat AND dog"), "cat AND dog");
        assert_eq!(matched("cat OR dog"), "cat OR dog");
        assert_eq!(matched("cat NOT dog"), "cat NOT dog");
        assert_eq!(matched("NEAR(cat dog, 5)"), "NEAR(cat dog, 5)");
        assert_eq!(matched("(cat)"), "(cat)");
        assert_eq!(matched("\"exact phrase\""), "\"exact phrase\"");
    }

    #[test]
    fn test_lowercase_words_are_not_operators() {
        assert_eq!(matched("cats and dogs"), "\"cats and dogs\"");
        assert_eq!(matched("ORACLE"), "\"ORACLE\"");
        assert_eq!(matched("NOTES"), "\"NOTES\"");
    }
}
