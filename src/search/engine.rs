//! Query engine - FTS5 keyword filter + optional vector rerank
//!
//! 1. Build a prefix-OR FTS5 query from the natural-language query
//! 2. Pull `top_k * candidate_multiplier` lexical candidates, padding with
//!    arbitrary documents when fewer than `2 * top_k` match
//! 3. Embed the query (if the semantic feature is on) and fuse cosine
//!    similarity with the normalized bm25 score
//!
//! The engine only reads the index.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

use super::embedder::{create_embedder, EmbedPurpose, Embedder, Embedding};
use super::query::{
    build_fts_query, combine_scores, cosine_similarity, extract_terms, matched_keywords,
    normalize_bm25,
};
use super::store::{Candidate, IndexReader};
use crate::core::config::Config;
use crate::core::paths::IndexPaths;
use crate::error::{Error, Result};

/// One ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    pub path: String,
    pub rel_path: String,
    pub title: String,
    pub summary: String,
    /// Explanation only; does not affect ranking
    pub matched_keywords: Vec<String>,
    /// Fused relevance in `[0, 1]` when both components are
    pub score: f32,
    pub vector_score: f32,
    /// Normalized lexical score in `[0, 1]`
    pub bm25_score: f32,
    #[serde(skip)]
    raw_lexical_score: f64,
}

pub struct QueryEngine {
    reader: IndexReader,
    embedder: Box<dyn Embedder>,
    config: Config,
}

impl QueryEngine {
    /// Open the index read-only; fails with [`Error::IndexNotFound`] if it was never built
    pub fn open(config: Config, paths: &IndexPaths) -> Result<Self> {
        let embedder = create_embedder(&config.embeddings);
        Self::with_embedder(config, paths, embedder)
    }

    pub fn with_embedder(config: Config, paths: &IndexPaths, embedder: Box<dyn Embedder>) -> Result<Self> {
        let reader = IndexReader::open(&paths.db)?;
        Ok(Self {
            reader,
            embedder,
            config,
        })
    }

    /// Search with the configured defaults for `top_k` and the candidate multiplier
    pub fn search_default(&self, query: &str) -> Result<Vec<ScoredResult>> {
        self.search(
            query,
            self.config.query.top_k,
            self.config.query.candidate_multiplier,
        )
    }

    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        candidate_multiplier: usize,
    ) -> Result<Vec<ScoredResult>> {
        if top_k == 0 || candidate_multiplier == 0 {
            return Err(Error::InvalidArgument(format!(
                "top_k and candidate_multiplier must be at least 1 (got {} and {})",
                top_k, candidate_multiplier
            )));
        }

        let terms = extract_terms(query);
        let candidates = self.collect_candidates(&terms, top_k, candidate_multiplier)?;

        let query_embedding = match self.embedder.embed(query, EmbedPurpose::Query) {
            Embedding::Value(vector) => Some(vector),
            Embedding::Unavailable(reason) => {
                if reason.is_failure() {
                    tracing::debug!(
                        "{} query embedding unavailable, lexical only: {}",
                        self.embedder.name(),
                        reason
                    );
                }
                None
            }
        };

        let mut results: Vec<ScoredResult> = candidates
            .into_iter()
            .map(|c| self.score_candidate(c, query_embedding.as_deref(), &terms))
            .collect();

        results.sort_by(compare_results);
        results.truncate(top_k);
        Ok(results)
    }

    fn collect_candidates(
        &self,
        terms: &[String],
        top_k: usize,
        candidate_multiplier: usize,
    ) -> Result<Vec<Candidate>> {
        let cap = top_k.saturating_mul(candidate_multiplier);

        let mut candidates = match build_fts_query(terms) {
            Some(fts_query) => {
                match self
                    .reader
                    .lexical_search(&fts_query, &self.config.fields, cap)
                {
                    Ok(hits) => hits,
                    Err(e) => {
                        tracing::debug!("lexical query {:?} failed, padding only: {}", fts_query, e);
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        if candidates.len() < top_k.saturating_mul(2) {
            let seen: HashSet<i64> = candidates.iter().map(|c| c.id).collect();
            let padding = self
                .reader
                .padding(&seen, cap.saturating_sub(candidates.len()))?;
            candidates.extend(padding);
        }

        Ok(candidates)
    }

    fn score_candidate(
        &self,
        candidate: Candidate,
        query_embedding: Option<&[f32]>,
        terms: &[String],
    ) -> ScoredResult {
        let fusion = &self.config.fusion;
        let record = candidate.record;

        let bm25_score = normalize_bm25(candidate.raw_score, fusion.bm25_divisor);
        let vector_score = cosine_similarity(query_embedding, record.embedding.as_deref());
        let score = combine_scores(
            vector_score,
            bm25_score,
            query_embedding.is_some(),
            fusion.vector_weight,
            fusion.lexical_weight,
        );

        ScoredResult {
            matched_keywords: matched_keywords(&record.keywords, terms),
            path: record.path,
            rel_path: record.rel_path,
            title: record.title,
            summary: record.summary,
            score,
            vector_score,
            bm25_score,
            raw_lexical_score: candidate.raw_score,
        }
    }
}

/// Score descending, then stronger raw lexical match, then `rel_path`
fn compare_results(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            a.raw_lexical_score
                .partial_cmp(&b.raw_lexical_score)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.rel_path.cmp(&b.rel_path))
}
