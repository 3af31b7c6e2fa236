//! Index store: SQLite document table plus an FTS5 lexical index
//!
//! One row per document in `files`; `files_fts` is an external-content FTS5
//! table kept in sync by an insert trigger, so a committed row is always
//! searchable. Builds write through [`IndexWriter`] inside a single
//! transaction; queries go through a read-only [`IndexReader`].

use rusqlite::{params, Connection, OpenFlags, Row};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::core::config::FieldWeights;
use crate::core::paths::IndexPaths;
use crate::error::{Error, Result};

/// Delimiter between section headers in the stored/indexed column.
/// A `|` inside a header is stored as `\|`.
pub const HEADER_DELIMITER: &str = " | ";
/// Delimiter between keywords in the stored/indexed column
pub const KEYWORD_DELIMITER: &str = " ";

const SCHEMA: &str = r#"
    CREATE TABLE files (
        id INTEGER PRIMARY KEY,
        path TEXT UNIQUE NOT NULL,
        rel_path TEXT NOT NULL,
        title TEXT NOT NULL,
        headers TEXT NOT NULL,
        keywords TEXT NOT NULL,
        summary TEXT NOT NULL,
        embedding BLOB
    );

    CREATE VIRTUAL TABLE files_fts USING fts5(
        rel_path,
        title,
        headers,
        keywords,
        summary,
        content='files',
        content_rowid='id',
        tokenize='porter unicode61'
    );

    CREATE TRIGGER files_ai AFTER INSERT ON files BEGIN
        INSERT INTO files_fts(rowid, rel_path, title, headers, keywords, summary)
        VALUES (new.id, new.rel_path, new.title, new.headers, new.keywords, new.summary);
    END;

    CREATE INDEX idx_files_rel_path ON files(rel_path);
"#;

const RECORD_COLUMNS: &str =
    "f.id, f.path, f.rel_path, f.title, f.headers, f.keywords, f.summary, f.embedding";

/// One indexed document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    /// Absolute identity, unique across the store
    pub path: String,
    /// Display key
    pub rel_path: String,
    pub title: String,
    pub headers: Vec<String>,
    pub keywords: Vec<String>,
    pub summary: String,
    pub embedding: Option<Vec<f32>>,
}

/// A record read back from the store with its lexical score
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: i64,
    pub record: DocumentRecord,
    /// Raw FTS5 bm25 score; more negative is a stronger match, 0 for padding
    pub raw_score: f64,
}

// ============================================================================
// Writer
// ============================================================================

/// Exclusive build-time handle. Nothing is visible until [`IndexWriter::commit`].
pub struct IndexWriter {
    conn: Connection,
}

impl IndexWriter {
    /// Discard any previous index at `paths` and create an empty one
    pub fn create(paths: &IndexPaths) -> Result<Self> {
        fs::create_dir_all(&paths.dir)?;
        for stale in [&paths.db, &paths.journal(), &paths.meta] {
            if stale.exists() {
                fs::remove_file(stale)?;
            }
        }

        let conn = Connection::open(&paths.db)?;
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self { conn })
    }

    /// In-memory store for tests
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self { conn })
    }

    /// Insert one document; the trigger mirrors it into the FTS table
    pub fn insert(&self, record: &DocumentRecord) -> Result<i64> {
        let embedding = record.embedding.as_deref().map(embedding_to_bytes);
        self.conn.execute(
            "INSERT INTO files (path, rel_path, title, headers, keywords, summary, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.path,
                record.rel_path,
                record.title,
                join_headers(&record.headers),
                record.keywords.join(KEYWORD_DELIMITER),
                record.summary,
                embedding,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn commit(self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_reader(self) -> Result<IndexReader> {
        self.conn.execute_batch("COMMIT")?;
        Ok(IndexReader { conn: self.conn })
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Read-only query-time handle
pub struct IndexReader {
    conn: Connection,
}

impl IndexReader {
    /// Open an existing index; a missing file is [`Error::IndexNotFound`]
    pub fn open(db_path: &Path) -> Result<Self> {
        if !db_path.is_file() {
            return Err(Error::IndexNotFound(db_path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // A file that isn't one of our indexes is as good as missing
        let has_table: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'files_fts')",
            [],
            |row| row.get(0),
        )?;
        if !has_table {
            return Err(Error::IndexNotFound(db_path.to_path_buf()));
        }

        Ok(Self { conn })
    }

    /// Ranked prefix-OR lexical retrieval, strongest match first
    pub fn lexical_search(
        &self,
        fts_query: &str,
        weights: &FieldWeights,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let sql = format!(
            "SELECT {}, bm25(files_fts, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}) AS score
             FROM files_fts
             INNER JOIN files f ON files_fts.rowid = f.id
             WHERE files_fts MATCH ?1
             ORDER BY score ASC, f.rel_path ASC
             LIMIT ?2",
            RECORD_COLUMNS,
            weights.rel_path,
            weights.title,
            weights.headers,
            weights.keywords,
            weights.summary,
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let candidates = stmt
            .query_map(params![fts_query, limit as i64], |row| {
                let (id, record) = record_from_row(row)?;
                Ok(Candidate {
                    id,
                    record,
                    raw_score: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(candidates)
    }

    /// Up to `limit` documents not in `exclude`, in `rel_path` order, score 0
    pub fn padding(&self, exclude: &HashSet<i64>, limit: usize) -> Result<Vec<Candidate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // Excluded rows can occupy at most exclude.len() slots of the scan
        let scan = limit + exclude.len();
        let sql = format!(
            "SELECT {} FROM files f ORDER BY f.rel_path ASC, f.id ASC LIMIT ?1",
            RECORD_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([scan as i64], record_from_row)?;

        let mut padded = Vec::with_capacity(limit);
        for row in rows {
            let (id, record) = row?;
            if exclude.contains(&id) {
                continue;
            }
            padded.push(Candidate {
                id,
                record,
                raw_score: 0.0,
            });
            if padded.len() == limit {
                break;
            }
        }
        Ok(padded)
    }

    pub fn document_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn embedding_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM files WHERE embedding IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Every stored record in `rel_path` order
    pub fn all_documents(&self) -> Result<Vec<DocumentRecord>> {
        let sql = format!("SELECT {} FROM files f ORDER BY f.rel_path ASC", RECORD_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], |row| record_from_row(row).map(|(_, record)| record))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, DocumentRecord)> {
    let headers: String = row.get(4)?;
    let keywords: String = row.get(5)?;
    let embedding: Option<Vec<u8>> = row.get(7)?;

    Ok((
        row.get(0)?,
        DocumentRecord {
            path: row.get(1)?,
            rel_path: row.get(2)?,
            title: row.get(3)?,
            headers: split_headers(&headers),
            keywords: split_nonempty(&keywords, KEYWORD_DELIMITER),
            summary: row.get(6)?,
            embedding: embedding.as_deref().and_then(bytes_to_embedding),
        },
    ))
}

fn join_headers(headers: &[String]) -> String {
    headers
        .iter()
        .map(|h| h.replace('|', "\\|"))
        .collect::<Vec<_>>()
        .join(HEADER_DELIMITER)
}

fn split_headers(joined: &str) -> Vec<String> {
    split_nonempty(joined, HEADER_DELIMITER)
        .into_iter()
        .map(|h| h.replace("\\|", "|"))
        .collect()
}

fn split_nonempty(joined: &str, delimiter: &str) -> Vec<String> {
    joined
        .split(delimiter)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Convert f32 vector to little-endian bytes for storage
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert stored bytes back to an f32 vector; `None` for empty or torn blobs
pub fn bytes_to_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(rel: &str, title: &str, keywords: &[&str], embedding: Option<Vec<f32>>) -> DocumentRecord {
        DocumentRecord {
            path: format!("/docs/{}", rel),
            rel_path: rel.to_string(),
            title: title.to_string(),
            headers: vec!["Overview".to_string(), "Details".to_string()],
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            summary: format!("Summary of {}", title),
            embedding,
        }
    }

    fn sample_reader() -> IndexReader {
        let writer = IndexWriter::in_memory().unwrap();
        writer
            .insert(&record("install.md", "Installing the CLI", &["install", "setup"], Some(vec![1.0, 0.0])))
            .unwrap();
        writer
            .insert(&record("network.md", "Troubleshooting Network Errors", &["network", "error"], None))
            .unwrap();
        writer
            .insert(&record("api.md", "API Reference", &["api"], None))
            .unwrap();
        writer.into_reader().unwrap()
    }

    #[test]
    fn test_embedding_conversion() {
        let original = vec![0.1, 0.2, 0.3, -0.5, f32::MIN_POSITIVE, 1e30];
        let bytes = embedding_to_bytes(&original);
        let recovered = bytes_to_embedding(&bytes).unwrap();
        assert_eq!(original, recovered);

        assert_eq!(bytes_to_embedding(&[]), None);
        assert_eq!(bytes_to_embedding(&[0, 0, 0]), None);
    }

    #[test]
    fn test_records_round_trip() {
        let reader = sample_reader();
        let docs = reader.all_documents().unwrap();

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].rel_path, "api.md");
        let install = docs.iter().find(|d| d.rel_path == "install.md").unwrap();
        assert_eq!(install.headers, vec!["Overview", "Details"]);
        assert_eq!(install.keywords, vec!["install", "setup"]);
        assert_eq!(install.embedding, Some(vec![1.0, 0.0]));
        assert_eq!(reader.embedding_count().unwrap(), 1);
    }

    #[test]
    fn test_headers_with_pipes_round_trip() {
        let writer = IndexWriter::in_memory().unwrap();
        let mut doc = record("io.md", "IO", &[], None);
        doc.headers = vec!["Input | Output".to_string(), "Next".to_string(), "a|b".to_string()];
        writer.insert(&doc).unwrap();
        let reader = writer.into_reader().unwrap();

        let docs = reader.all_documents().unwrap();
        assert_eq!(docs[0].headers, vec!["Input | Output", "Next", "a|b"]);
        // Escaped pipes are punctuation to the tokenizer, so headers stay searchable
        let hits = reader
            .lexical_search("\"output\"*", &FieldWeights::default(), 5)
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_lexical_search_ranks_matches() {
        let reader = sample_reader();
        let weights = FieldWeights::default();

        let hits = reader.lexical_search("\"network\"*", &weights, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.rel_path, "network.md");
        assert!(hits[0].raw_score < 0.0);

        // Porter stemming lets "install" match "Installing"
        let hits = reader
            .lexical_search("\"install\"* OR \"api\"*", &weights, 10)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].raw_score <= hits[1].raw_score);
    }

    #[test]
    fn test_lexical_search_malformed_query_errors() {
        let reader = sample_reader();
        let result = reader.lexical_search("\"unterminated", &FieldWeights::default(), 10);
        assert!(result.is_err());
    }

    #[test]
    fn test_padding_excludes_and_limits() {
        let reader = sample_reader();
        let docs = reader.padding(&HashSet::new(), 2).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|c| c.raw_score == 0.0));

        let hits = reader.lexical_search("\"api\"*", &FieldWeights::default(), 10).unwrap();
        let exclude: HashSet<i64> = hits.iter().map(|c| c.id).collect();
        let padded = reader.padding(&exclude, 10).unwrap();
        assert_eq!(padded.len(), 2);
        assert!(padded.iter().all(|c| c.record.rel_path != "api.md"));
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let writer = IndexWriter::in_memory().unwrap();
        let doc = record("a.md", "A", &[], None);
        writer.insert(&doc).unwrap();
        assert!(writer.insert(&doc).is_err());

        let reader = writer.into_reader().unwrap();
        assert_eq!(reader.document_count().unwrap(), 1);
    }

    #[test]
    fn test_open_missing_index() {
        let dir = TempDir::new().unwrap();
        let result = IndexReader::open(&dir.path().join("nope.sqlite"));
        assert!(matches!(result, Err(Error::IndexNotFound(_))));
    }

    #[test]
    fn test_create_replaces_previous_index() {
        let dir = TempDir::new().unwrap();
        let paths = IndexPaths::from_dir(dir.path());

        let writer = IndexWriter::create(&paths).unwrap();
        writer.insert(&record("old.md", "Old", &[], None)).unwrap();
        writer.commit().unwrap();
        fs::write(&paths.meta, "{}").unwrap();

        let writer = IndexWriter::create(&paths).unwrap();
        assert!(!paths.meta.exists());
        writer.insert(&record("new.md", "New", &[], None)).unwrap();
        writer.commit().unwrap();

        let reader = IndexReader::open(&paths.db).unwrap();
        let docs = reader.all_documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].rel_path, "new.md");
    }
}
