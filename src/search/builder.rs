//! Index builder - full rebuild of the document store and lexical index
//!
//! Documents are processed strictly one after another (read, extract,
//! optional embed, insert), so at most one embedding request is ever in
//! flight. A bad document is counted and skipped; it never aborts the build.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;

use super::embedder::{create_embedder, EmbedPurpose, Embedder, Embedding};
use super::meta::BuildMetadata;
use super::store::{DocumentRecord, IndexWriter};
use crate::core::config::Config;
use crate::core::discovery::{find_markdown_files, relative_path};
use crate::core::metadata;
use crate::core::paths::IndexPaths;
use crate::error::Result;

/// Build statistics
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStats {
    /// Documents handed to the builder
    pub total: usize,
    /// Documents persisted
    pub indexed: usize,
    /// Documents skipped (unreadable, or rejected by the store)
    pub errors: usize,
    pub embeddings_added: usize,
    /// Embedding calls that failed; those documents are indexed without a vector
    pub embedding_failures: usize,
    pub embeddings_enabled: bool,
    pub duration: Duration,
}

/// Running totals handed to the progress callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildProgress {
    pub current: usize,
    pub total: usize,
    pub indexed: usize,
    pub errors: usize,
    pub embeddings_added: usize,
}

/// Outcome of processing one document
enum DocumentOutcome {
    Indexed { embedded: bool, embed_failed: bool },
    Failed,
}

pub struct IndexBuilder {
    config: Config,
    paths: IndexPaths,
    embedder: Box<dyn Embedder>,
}

impl IndexBuilder {
    /// Create a builder whose embedder follows `config.embeddings`
    pub fn new(config: Config, paths: IndexPaths) -> Self {
        let embedder = create_embedder(&config.embeddings);
        Self::with_embedder(config, paths, embedder)
    }

    pub fn with_embedder(config: Config, paths: IndexPaths, embedder: Box<dyn Embedder>) -> Self {
        Self {
            config,
            paths,
            embedder,
        }
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    /// Discover markdown files under `docs_root` and rebuild the index from them
    pub fn build_from_dir<F>(&self, docs_root: &Path, on_progress: F) -> Result<BuildStats>
    where
        F: FnMut(&BuildProgress),
    {
        let files = find_markdown_files(docs_root, &self.config.build.exclude_dirs)?;
        self.build(docs_root, &files, on_progress)
    }

    /// Rebuild the index from an explicit document list.
    ///
    /// The previous index and its metadata file are discarded before anything
    /// is written.
    pub fn build<F>(&self, docs_root: &Path, documents: &[PathBuf], mut on_progress: F) -> Result<BuildStats>
    where
        F: FnMut(&BuildProgress),
    {
        let start = Instant::now();
        let embeddings_enabled = self.embedder.is_enabled();
        let writer = IndexWriter::create(&self.paths)?;

        let total = documents.len();
        let interval = self.config.build.progress_interval.max(1);
        let mut indexed = 0;
        let mut errors = 0;
        let mut embeddings_added = 0;
        let mut embedding_failures = 0;

        for (i, path) in documents.iter().enumerate() {
            match self.index_document(&writer, docs_root, path, embeddings_enabled) {
                DocumentOutcome::Indexed {
                    embedded,
                    embed_failed,
                } => {
                    indexed += 1;
                    if embedded {
                        embeddings_added += 1;
                    }
                    if embed_failed {
                        embedding_failures += 1;
                    }
                }
                DocumentOutcome::Failed => errors += 1,
            }

            if i % interval == 0 || i + 1 == total {
                on_progress(&BuildProgress {
                    current: i + 1,
                    total,
                    indexed,
                    errors,
                    embeddings_added,
                });
            }
        }

        writer.commit()?;

        let stats = BuildStats {
            total,
            indexed,
            errors,
            embeddings_added,
            embedding_failures,
            embeddings_enabled,
            duration: start.elapsed(),
        };

        BuildMetadata::from_stats(&stats, docs_root, Utc::now()).save(&self.paths.meta)?;

        tracing::info!(
            "indexed {}/{} documents ({} errors, {} embeddings) in {:.2}s",
            stats.indexed,
            stats.total,
            stats.errors,
            stats.embeddings_added,
            stats.duration.as_secs_f64()
        );

        Ok(stats)
    }

    fn index_document(
        &self,
        writer: &IndexWriter,
        docs_root: &Path,
        path: &Path,
        embeddings_enabled: bool,
    ) -> DocumentOutcome {
        let rel_path = relative_path(docs_root, path);

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("{}: {}", rel_path, e);
                return DocumentOutcome::Failed;
            }
        };

        let meta = metadata::extract(&content, path);

        let mut embed_failed = false;
        let embedding = if embeddings_enabled {
            match self.embedder.embed(&meta.embedding_text, EmbedPurpose::Document) {
                Embedding::Value(vector) => Some(vector),
                Embedding::Unavailable(reason) => {
                    embed_failed = reason.is_failure();
                    tracing::debug!("{}: indexing without embedding ({})", rel_path, reason);
                    None
                }
            }
        } else {
            None
        };
        let embedded = embedding.is_some();

        let record = DocumentRecord {
            path: absolute_key(path),
            rel_path,
            title: meta.title,
            headers: meta.headers,
            keywords: meta.keywords,
            summary: meta.summary,
            embedding,
        };

        match writer.insert(&record) {
            Ok(_) => DocumentOutcome::Indexed {
                embedded,
                embed_failed,
            },
            Err(e) => {
                tracing::warn!("{}: {}", record.rel_path, e);
                DocumentOutcome::Failed
            }
        }
    }
}

fn absolute_key(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}
