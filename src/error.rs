//! Library error type

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("index not found at {0} (run `mdsearch index <docs-dir>` to build it)")]
    IndexNotFound(PathBuf),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to walk documents: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// True when the caller has to (re)build the index before searching
    pub fn is_index_not_found(&self) -> bool {
        matches!(self, Error::IndexNotFound(_))
    }
}
