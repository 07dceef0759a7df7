//! Text extraction: read, detect encoding, decode, normalize.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chardetng::EncodingDetector;
use once_cell::sync::Lazy;
use regex::Regex;

use super::filter::FileFilter;

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

/// Read up to `max_bytes` from the start of `path` and normalize it.
///
/// Returns `None` when the file cannot be opened or read. Undecodable bytes
/// are dropped rather than failing the read.
#[must_use]
pub fn extract_text(path: &Path, max_bytes: u64) -> Option<String> {
    let raw = match read_head(path, max_bytes) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Unreadable file, no text extracted");
            return None;
        }
    };

    let decoded = decode(&raw);
    let text = if FileFilter::is_markup(path) {
        MARKUP_TAG.replace_all(&decoded, " ").into_owned()
    } else {
        decoded
    };

    Some(normalize(&text))
}

fn read_head(path: &Path, max_bytes: u64) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut raw = Vec::new();
    file.take(max_bytes).read_to_end(&mut raw)?;
    Ok(raw)
}

/// Decode bytes using a heuristically detected encoding.
#[must_use]
pub fn decode(raw: &[u8]) -> String {
    let mut detector = EncodingDetector::new();
    detector.feed(raw, true);
    let encoding = detector.guess(None, true);

    let (text, _, had_errors) = encoding.decode(raw);
    if had_errors {
        text.chars().filter(|c| *c != char::REPLACEMENT_CHARACTER).collect()
    } else {
        text.into_owned()
    }
}

/// Collapse whitespace runs to single spaces, trim, and lowercase.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
