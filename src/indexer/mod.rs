//! Incremental indexer.
//!
//! This module handles:
//! - Text eligibility, extraction and chunking
//! - Full and sampled content fingerprints
//! - Per-file change detection against the store
//! - Batched, cancellable walks with progress reporting
//! - Background runs on a blocking task

mod background;
mod chunker;
mod decision;
mod extract;
mod filter;
mod fingerprint;
#[allow(clippy::module_inception)]
mod indexer;
mod progress;

pub use background::BackgroundIndexer;
pub use chunker::{Chunker, TextSegment, DEFAULT_CHUNK_SIZE};
pub use decision::{Assessment, Horizons};
pub use extract::{decode, extract_text, normalize};
pub use filter::FileFilter;
pub use fingerprint::{digest_file, HashPolicy};
pub use indexer::{index_root, IndexOptions, Indexer};
pub use progress::{IndexProgress, IndexStats, IndexSummary};
