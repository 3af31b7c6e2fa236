//! Search command - ranked lookup plus result presentation

use anyhow::Result;
use colored::Colorize;

use mdsearch::core::config::Config;
use mdsearch::core::paths::IndexPaths;
use mdsearch::search::{QueryEngine, ScoredResult};

pub fn run(
    config: Config,
    paths: &IndexPaths,
    query: &str,
    top_k: Option<usize>,
    candidates: Option<usize>,
    json: bool,
) -> Result<()> {
    let results = if top_k.is_none() && candidates.is_none() {
        QueryEngine::open(config, paths)?.search_default(query)?
    } else {
        let top_k = top_k.unwrap_or(config.query.top_k);
        let candidates = candidates.unwrap_or(config.query.candidate_multiplier);
        QueryEngine::open(config, paths)?.search(query, top_k, candidates)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if !results.is_empty() {
        println!(
            "{} {} results for: {}",
            "→".dimmed(),
            results.len(),
            query.cyan()
        );
        println!();
    }
    print!("{}", format_results(&results, query));

    Ok(())
}

/// Plain-text rendering: best match, the rest, and a read hint
pub fn format_results(results: &[ScoredResult], query: &str) -> String {
    let Some((best, rest)) = results.split_first() else {
        return format!("No matching docs found for: {}\n", query);
    };

    let mut out = String::new();
    out.push_str(&format!("Best match: {}\n", best.rel_path));
    out.push_str(&format!("  Title:    {}\n", best.title));
    out.push_str(&format!("  Path:     {}\n", best.path));
    if !best.matched_keywords.is_empty() {
        out.push_str(&format!("  Keywords: {}\n", best.matched_keywords.join(", ")));
    }
    out.push_str(&format!(
        "  Score:    {:.3} (vector {:.3}, keyword {:.3})\n",
        best.score, best.vector_score, best.bm25_score
    ));
    if !best.summary.is_empty() {
        out.push_str(&format!("  {}\n", best.summary));
    }

    if !rest.is_empty() {
        out.push_str("\nAlso relevant:\n");
        for result in rest {
            out.push_str(&format!("  - {} ({:.3})", result.rel_path, result.score));
            if !result.matched_keywords.is_empty() {
                out.push_str(&format!(" [{}]", result.matched_keywords.join(", ")));
            }
            out.push('\n');
        }
    }

    out.push_str(&format!("\nRead the best match: {}\n", best.path));
    out
}
