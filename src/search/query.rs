//! Query construction and scoring helpers
//!
//! Pure functions shared by the query engine: term extraction, FTS5 query
//! building, bm25 normalization, cosine similarity and keyword matching.

/// Terms that never make it into the lexical query
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "how", "do", "i", "to", "in", "on", "for", "what", "why",
];

/// Shortest term (in chars) kept for the lexical query
pub const MIN_TERM_CHARS: usize = 2;

/// Cap on keywords reported per result
pub const MAX_MATCHED_KEYWORDS: usize = 5;

/// Lowercase, strip non-alphanumerics, drop stop words and one-char terms.
///
/// Duplicates are removed, first occurrence wins.
pub fn extract_terms(query: &str) -> Vec<String> {
    let normalized: String = query
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut terms: Vec<String> = Vec::new();
    for term in normalized.split_whitespace() {
        if term.chars().count() < MIN_TERM_CHARS || STOP_WORDS.contains(&term) {
            continue;
        }
        if !terms.iter().any(|t| t == term) {
            terms.push(term.to_string());
        }
    }
    terms
}

/// Prefix-OR FTS5 expression: `"t1"* OR "t2"* ...`; `None` when no terms survive
pub fn build_fts_query(terms: &[String]) -> Option<String> {
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"*", t.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

/// Map a raw bm25 score (more negative is better) onto `[0, 1]`
pub fn normalize_bm25(raw_score: f64, divisor: f64) -> f32 {
    if divisor <= 0.0 || !raw_score.is_finite() {
        return 0.0;
    }
    if raw_score >= 0.0 {
        return 0.0;
    }
    (-raw_score / divisor).clamp(0.0, 1.0) as f32
}

/// Cosine similarity; 0 for absent, mismatched or zero-magnitude inputs
pub fn cosine_similarity(a: Option<&[f32]>, b: Option<&[f32]>) -> f32 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a > 0.0 && norm_b > 0.0 {
        let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
        if sim.is_finite() {
            return sim.clamp(-1.0, 1.0) as f32;
        }
    }
    0.0
}

/// Weighted fusion of the two signals
pub fn combine_scores(
    vector_score: f32,
    lexical_normalized: f32,
    has_query_vector: bool,
    vector_weight: f32,
    lexical_weight: f32,
) -> f32 {
    if has_query_vector {
        vector_weight * vector_score + lexical_weight * lexical_normalized
    } else {
        lexical_normalized
    }
}

/// Keywords that contain, or are contained in, a query term (case-insensitive)
pub fn matched_keywords(keywords: &[String], terms: &[String]) -> Vec<String> {
    keywords
        .iter()
        .filter(|k| !k.is_empty())
        .filter(|k| {
            let k = k.to_lowercase();
            terms
                .iter()
                .any(|t| k.contains(t.as_str()) || t.contains(k.as_str()))
        })
        .take(MAX_MATCHED_KEYWORDS)
        .cloned()
        .collect()
}
