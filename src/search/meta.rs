//! Build metadata file (`index-meta.json`)
//!
//! Written once at the end of every successful build and read by status
//! reporting. A rebuild deletes it first and writes a fresh one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::builder::BuildStats;
use crate::error::{Error, Result};

pub const INDEX_TYPE_LEXICAL: &str = "fts5";
pub const INDEX_TYPE_HYBRID: &str = "fts5+vector";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildMetadata {
    pub version: String,
    pub index_type: String,
    pub features: Vec<String>,
    pub indexed_at: DateTime<Utc>,
    pub docs_path: String,
    pub files_seen: usize,
    pub files_indexed: usize,
    pub errors: usize,
    pub embeddings_added: usize,
    #[serde(default)]
    pub embedding_failures: usize,
    pub embeddings_enabled: bool,
    pub build_time_seconds: f64,
}

impl BuildMetadata {
    pub fn from_stats(stats: &BuildStats, docs_path: &Path, indexed_at: DateTime<Utc>) -> Self {
        let mut features = vec!["fts5".to_string(), "bm25".to_string()];
        if stats.embeddings_enabled {
            features.push("vector-rerank".to_string());
        }

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            index_type: if stats.embeddings_enabled {
                INDEX_TYPE_HYBRID
            } else {
                INDEX_TYPE_LEXICAL
            }
            .to_string(),
            features,
            indexed_at,
            docs_path: docs_path.display().to_string(),
            files_seen: stats.total,
            files_indexed: stats.indexed,
            errors: stats.errors,
            embeddings_added: stats.embeddings_added,
            embedding_failures: stats.embedding_failures,
            embeddings_enabled: stats.embeddings_enabled,
            // Two decimals is plenty for a status line
            build_time_seconds: (stats.duration.as_secs_f64() * 100.0).round() / 100.0,
        }
    }

    /// Overwrite the metadata file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Read the metadata file; a missing file is [`Error::IndexNotFound`]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::IndexNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
