//! mdsearch - offline hybrid search for markdown documentation
//!
//! A full rebuild indexes every markdown file into SQLite (document table +
//! FTS5). Queries run a bm25-ranked keyword filter, then optionally rerank
//! the candidates by embedding similarity from an HTTP embedding service.

pub mod core;
pub mod error;
pub mod search;

pub use error::{Error, Result};
