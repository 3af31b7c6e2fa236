//! Index command - full rebuild of the search index

use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::Colorize;

use mdsearch::core::config::Config;
use mdsearch::core::paths::IndexPaths;
use mdsearch::search::{BuildProgress, IndexBuilder};

pub fn run(config: Config, paths: IndexPaths, docs_dir: &Path, json: bool) -> Result<()> {
    if !docs_dir.is_dir() {
        bail!("docs directory not found: {}", docs_dir.display());
    }
    let docs_dir = docs_dir
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", docs_dir.display()))?;

    let embeddings = config.embeddings.enabled;
    let endpoint = config.embeddings.endpoint.clone();
    let builder = IndexBuilder::new(config, paths);

    if !json {
        println!(
            "{} Building index for {}",
            "→".dimmed(),
            docs_dir.display().to_string().cyan()
        );
        if embeddings {
            println!("  {} Embeddings: {}", "→".dimmed(), endpoint);
        } else {
            println!("  {} Embeddings: {}", "→".dimmed(), "disabled (keyword only)".dimmed());
        }
    }

    let stats = builder
        .build_from_dir(&docs_dir, |p: &BuildProgress| {
            if !json {
                print_progress(p);
            }
        })
        .context("index build failed")?;

    let db_path = &builder.paths().db;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "docsPath": docs_dir.display().to_string(),
                "indexPath": db_path.display().to_string(),
                "filesSeen": stats.total,
                "filesIndexed": stats.indexed,
                "errors": stats.errors,
                "embeddingsAdded": stats.embeddings_added,
                "embeddingFailures": stats.embedding_failures,
                "embeddingsEnabled": stats.embeddings_enabled,
                "buildTimeSeconds": stats.duration.as_secs_f64(),
            }))?
        );
        return Ok(());
    }

    println!();
    println!(
        "{} Indexed {} of {} files in {:.2}s",
        "✓".green().bold(),
        stats.indexed.to_string().cyan(),
        stats.total,
        stats.duration.as_secs_f64()
    );
    if stats.embeddings_enabled {
        println!(
            "  {} {} embeddings added",
            "→".dimmed(),
            stats.embeddings_added
        );
    }
    if stats.embedding_failures > 0 {
        println!(
            "  {} {} documents indexed without an embedding",
            "!".yellow(),
            stats.embedding_failures
        );
    }
    if stats.errors > 0 {
        println!("  {} {} files failed", "✗".red(), stats.errors);
    }
    println!("  {} Index saved to: {}", "→".dimmed(), db_path.display());

    Ok(())
}

fn print_progress(p: &BuildProgress) {
    println!(
        "  [{}/{}] indexed {}, errors {}, embeddings {}",
        p.current, p.total, p.indexed, p.errors, p.embeddings_added
    );
}
