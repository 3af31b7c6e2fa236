//! mdsearch configuration
//!
//! Config loading priority:
//! 1. `config.json` inside the index directory (partial files are fine)
//! 2. Built-in defaults
//!
//! Environment toggles are folded in once by [`Config::with_env_overrides`];
//! after that the struct is passed explicitly to the builder and query engine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Config file name inside the index directory
pub const CONFIG_FILE: &str = "config.json";

/// Env toggle for the semantic (embedding) feature
pub const EMBEDDINGS_ENV: &str = "MDSEARCH_EMBEDDINGS";
pub const EMBED_URL_ENV: &str = "EMBED_URL";
pub const EMBED_MODEL_ENV: &str = "EMBED_MODEL";

pub const DEFAULT_EMBED_URL: &str = "http://localhost:8090/v1/embeddings";
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embeddings: EmbeddingConfig,

    #[serde(default)]
    pub fusion: FusionConfig,

    #[serde(default)]
    pub fields: FieldWeights,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub build: BuildConfig,
}

/// Embedding provider settings. Disabled unless explicitly opted in.
///
/// Enabling this sends document text to `endpoint`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_document_timeout")]
    pub document_timeout_secs: u64,

    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    #[serde(default = "default_document_max_chars")]
    pub document_max_chars: usize,

    #[serde(default = "default_query_max_chars")]
    pub query_max_chars: usize,
}

fn default_endpoint() -> String {
    DEFAULT_EMBED_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_EMBED_MODEL.to_string()
}

fn default_document_timeout() -> u64 {
    30
}

fn default_query_timeout() -> u64 {
    10
}

fn default_document_max_chars() -> usize {
    8000
}

fn default_query_max_chars() -> usize {
    2000
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            model: default_model(),
            document_timeout_secs: default_document_timeout(),
            query_timeout_secs: default_query_timeout(),
            document_max_chars: default_document_max_chars(),
            query_max_chars: default_query_max_chars(),
        }
    }
}

/// Score fusion constants
///
/// `combined = vector_weight * cosine + lexical_weight * clamp(-bm25 / bm25_divisor, 0, 1)`
/// when a query vector exists, otherwise just the normalized lexical score.
/// A divisor of 10 assumes raw FTS5 bm25 scores rarely go below -10.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusionConfig {
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,

    #[serde(default = "default_bm25_divisor")]
    pub bm25_divisor: f64,
}

fn default_vector_weight() -> f32 {
    0.6
}

fn default_lexical_weight() -> f32 {
    0.4
}

fn default_bm25_divisor() -> f64 {
    10.0
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            vector_weight: default_vector_weight(),
            lexical_weight: default_lexical_weight(),
            bm25_divisor: default_bm25_divisor(),
        }
    }
}

/// Per-column bm25 weights for the FTS5 table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldWeights {
    #[serde(default = "default_two")]
    pub rel_path: f64,

    #[serde(default = "default_title_weight")]
    pub title: f64,

    #[serde(default = "default_two")]
    pub headers: f64,

    #[serde(default = "default_keywords_weight")]
    pub keywords: f64,

    #[serde(default = "default_one")]
    pub summary: f64,
}

fn default_two() -> f64 {
    2.0
}

fn default_title_weight() -> f64 {
    3.0
}

fn default_keywords_weight() -> f64 {
    1.5
}

fn default_one() -> f64 {
    1.0
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            rel_path: default_two(),
            title: default_title_weight(),
            headers: default_two(),
            keywords: default_keywords_weight(),
            summary: default_one(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
}

fn default_top_k() -> usize {
    3
}

fn default_candidate_multiplier() -> usize {
    5
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            candidate_multiplier: default_candidate_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildConfig {
    /// Emit a progress notification every N documents (and on the last one)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,

    /// Directory names skipped during discovery (locales, vendored trees)
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
}

fn default_progress_interval() -> usize {
    20
}

fn default_exclude_dirs() -> Vec<String> {
    vec![
        "zh-CN".to_string(),
        "node_modules".to_string(),
        ".git".to_string(),
    ]
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            progress_interval: default_progress_interval(),
            exclude_dirs: default_exclude_dirs(),
        }
    }
}

impl Config {
    /// Load `config.json` from the index directory, falling back to defaults
    pub fn load(index_dir: &Path) -> Self {
        let config_path = index_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "failed to load {}: {}; using defaults",
                    config_path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment toggles from the real process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply environment-style toggles from an arbitrary lookup
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(flag) = lookup(EMBEDDINGS_ENV) {
            self.embeddings.enabled = matches!(flag.trim(), "true" | "1" | "yes");
        }
        if let Some(url) = lookup(EMBED_URL_ENV).filter(|s| !s.trim().is_empty()) {
            self.embeddings.endpoint = url;
        }
        if let Some(model) = lookup(EMBED_MODEL_ENV).filter(|s| !s.trim().is_empty()) {
            self.embeddings.model = model;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.top_k == 0 {
            return Err(Error::Config("query.top_k must be at least 1".into()));
        }
        if self.query.candidate_multiplier == 0 {
            return Err(Error::Config(
                "query.candidate_multiplier must be at least 1".into(),
            ));
        }
        if self.fusion.bm25_divisor <= 0.0 {
            return Err(Error::Config("fusion.bm25_divisor must be positive".into()));
        }
        let (v, l) = (self.fusion.vector_weight, self.fusion.lexical_weight);
        if v < 0.0 || l < 0.0 || ((v + l) - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "fusion weights must be non-negative and sum to 1.0 (got {} + {})",
                v, l
            )));
        }
        if self.build.progress_interval == 0 {
            return Err(Error::Config(
                "build.progress_interval must be at least 1".into(),
            ));
        }
        if self.embeddings.enabled && self.embeddings.endpoint.trim().is_empty() {
            return Err(Error::Config("embeddings.endpoint is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.embeddings.enabled);
        assert_eq!(config.embeddings.document_max_chars, 8000);
        assert_eq!(config.embeddings.query_max_chars, 2000);
        assert_eq!(config.query.top_k, 3);
        assert_eq!(config.query.candidate_multiplier, 5);
        assert_eq!(config.fusion.vector_weight, 0.6);
        assert_eq!(config.fusion.lexical_weight, 0.4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let json = r#"{"query": {"top_k": 7}, "embeddings": {"enabled": true}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.query.top_k, 7);
        assert_eq!(config.query.candidate_multiplier, 5);
        assert!(config.embeddings.enabled);
        assert_eq!(config.embeddings.endpoint, DEFAULT_EMBED_URL);
        assert_eq!(config.build.exclude_dirs.len(), 3);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (EMBEDDINGS_ENV, "true"),
            (EMBED_URL_ENV, "http://127.0.0.1:9/embed"),
            (EMBED_MODEL_ENV, ""),
        ]
        .into_iter()
        .collect();

        let config = Config::default()
            .with_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert!(config.embeddings.enabled);
        assert_eq!(config.embeddings.endpoint, "http://127.0.0.1:9/embed");
        // Empty override keeps the default
        assert_eq!(config.embeddings.model, DEFAULT_EMBED_MODEL);
    }

    #[test]
    fn test_env_opt_out() {
        let mut base = Config::default();
        base.embeddings.enabled = true;
        let config = base.with_overrides_from(|key| {
            (key == EMBEDDINGS_ENV).then(|| "false".to_string())
        });
        assert!(!config.embeddings.enabled);
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let mut config = Config::default();
        config.fusion.vector_weight = 0.9;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.query.top_k = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fusion.bm25_divisor = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_index_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.query.top_k = 4;
        fs::write(
            dir.path().join(CONFIG_FILE),
            serde_json::to_string_pretty(&config).unwrap(),
        )
        .unwrap();

        let loaded = Config::load(dir.path());
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_invalid_falls_back() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{not json").unwrap();
        assert_eq!(Config::load(dir.path()), Config::default());
    }
}
