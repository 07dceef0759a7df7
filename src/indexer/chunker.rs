//! Fixed-size text chunking.

/// Default chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// A slice of normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    /// Position within the file, dense from 0.
    pub ordinal: usize,
    /// Segment text.
    pub text: String,
    /// Start byte offset into the source text.
    pub byte_from: usize,
    /// End byte offset (exclusive).
    pub byte_to: usize,
}

/// Splits text into sequential, non-overlapping segments.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    target_chars: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl Chunker {
    /// Create a chunker producing segments of `target_chars` characters.
    ///
    /// A target of 0 is treated as 1.
    #[must_use]
    pub fn new(target_chars: usize) -> Self {
        Self {
            target_chars: target_chars.max(1),
        }
    }

    /// Split `text` into segments.
    ///
    /// Every segment but the last holds exactly `target_chars` characters.
    /// Segments never split a code point, and concatenating them in ordinal
    /// order reproduces `text`. Empty input yields no segments.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<TextSegment> {
        let mut segments = Vec::with_capacity(text.len() / self.target_chars + 1);
        let mut start = 0;

        while start < text.len() {
            let end = text[start..]
                .char_indices()
                .nth(self.target_chars)
                .map_or(text.len(), |(offset, _)| start + offset);

            segments.push(TextSegment {
                ordinal: segments.len(),
                text: text[start..end].to_string(),
                byte_from: start,
                byte_to: end,
            });
            start = end;
        }

        segments
    }
}
