//! Hybrid search over markdown documentation
//!
//! Build: discover -> extract -> (embed) -> store + FTS5
//! Query: FTS5 prefix match -> candidate padding -> (vector rerank) -> top-k

pub mod builder;
pub mod embedder;
pub mod engine;
pub mod meta;
pub mod query;
pub mod store;

pub use builder::{BuildProgress, BuildStats, IndexBuilder};
pub use embedder::{create_embedder, EmbedPurpose, Embedder, Embedding, HttpEmbedder, Unavailable};
pub use engine::{QueryEngine, ScoredResult};
pub use meta::BuildMetadata;
