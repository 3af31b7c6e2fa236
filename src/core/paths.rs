//! Index path management
//!
//! Handles index directory detection and the files that live inside it.

use std::path::{Path, PathBuf};

/// Environment variable for index directory configuration
pub const INDEX_DIR_ENV: &str = "MDSEARCH_INDEX_DIR";

pub const INDEX_DB_FILE: &str = "docs.sqlite";
pub const INDEX_META_FILE: &str = "index-meta.json";

/// Locations of everything a build produces
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPaths {
    pub dir: PathBuf,
    pub db: PathBuf,
    pub meta: PathBuf,
}

impl IndexPaths {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            db: dir.join(INDEX_DB_FILE),
            meta: dir.join(INDEX_META_FILE),
            dir,
        }
    }

    /// Resolve from an explicit directory, the environment, or the default
    pub fn resolve(explicit: Option<&Path>) -> Self {
        match explicit {
            Some(dir) => Self::from_dir(dir),
            None => Self::from_dir(get_index_dir()),
        }
    }

    pub fn exists(&self) -> bool {
        self.db.exists()
    }

    /// Journal file SQLite may leave next to the database
    pub fn journal(&self) -> PathBuf {
        let mut name = self.db.as_os_str().to_os_string();
        name.push("-journal");
        PathBuf::from(name)
    }
}

/// Get index directory from environment variable or home directory.
/// Priority: MDSEARCH_INDEX_DIR env var > $HOME/.mdsearch/docs-index > ./.mdsearch/docs-index
pub fn get_index_dir() -> PathBuf {
    if let Ok(path) = std::env::var(INDEX_DIR_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".mdsearch/docs-index"),
        Err(_) => {
            tracing::warn!("HOME is not set; using ./.mdsearch/docs-index");
            PathBuf::from(".mdsearch/docs-index")
        }
    }
}
