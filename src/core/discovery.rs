//! Markdown document discovery

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};

fn is_excluded_dir(entry: &DirEntry, exclude_dirs: &[String]) -> bool {
    entry.file_type().is_dir()
        && entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| exclude_dirs.iter().any(|d| d == name))
            .unwrap_or(false)
}

/// Collect every `.md` file under `root`, skipping excluded directory names.
///
/// Results are in file-name order at every level, so repeated builds see the
/// same sequence.
pub fn find_markdown_files(root: &Path, exclude_dirs: &[String]) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("docs directory not found: {}", root.display()),
        )));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e, exclude_dirs));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // An unreadable subdirectory should not hide the rest of the tree
            Err(e) if e.depth() > 0 => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let path = entry.path();
        if entry.file_type().is_file() && path.extension().map(|e| e == "md").unwrap_or(false) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Display key for a document: path relative to the docs root, `/`-separated
pub fn relative_path(root: &Path, path: &Path) -> String {
    let Ok(rel) = path.strip_prefix(root) else {
        return path.to_string_lossy().to_string();
    };
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
