//! Trawl
//!
//! Incremental full-text index over a local directory tree, with ranked
//! search, scope and time filtering.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod indexer;
pub mod observability;
pub mod query;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
