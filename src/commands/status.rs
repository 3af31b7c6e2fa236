use std::fs;

use anyhow::Result;
use colored::*;
use serde::Serialize;

use mdsearch::core::paths::IndexPaths;
use mdsearch::search::meta::BuildMetadata;
use mdsearch::search::store::IndexReader;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexStatus {
    ready: bool,
    index_path: String,
    size_mb: f64,
    documents: usize,
    embeddings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<BuildMetadata>,
}

pub fn run(paths: &IndexPaths, json: bool) -> Result<()> {
    let meta = BuildMetadata::load(&paths.meta).ok();
    let reader = IndexReader::open(&paths.db).ok();

    let (documents, embeddings) = match &reader {
        Some(r) => (r.document_count()?, r.embedding_count()?),
        None => (0, 0),
    };
    let size_bytes = fs::metadata(&paths.db).map(|m| m.len()).unwrap_or(0);

    let status = IndexStatus {
        ready: reader.is_some() && meta.is_some(),
        index_path: paths.db.display().to_string(),
        size_mb: (size_bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0,
        documents,
        embeddings,
        build: meta,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }

    if !status.ready {
        std::process::exit(1);
    }

    Ok(())
}

fn print_status(status: &IndexStatus) {
    println!("{}", "Index Status".bold());
    println!("{}", "=".repeat(50));
    println!();
    println!("Index: {}", status.index_path);

    if !status.ready {
        println!(
            "{} Index not found. Run {} first.",
            "!".yellow().bold(),
            "mdsearch index <DOCS_DIR>".cyan()
        );
        return;
    }

    println!("Size:  {:.2} MB", status.size_mb);
    println!("Documents:  {}", status.documents);
    println!("Embeddings: {}", status.embeddings);

    if let Some(build) = &status.build {
        println!();
        println!("{}", "Last Build".cyan());
        println!("{}", "-".repeat(30));
        println!("   Indexed at:  {}", build.indexed_at.to_rfc3339());
        println!("   Docs path:   {}", build.docs_path);
        println!("   Index type:  {}", build.index_type);
        println!("   Files:       {} of {} indexed", build.files_indexed, build.files_seen);
        println!("   Build time:  {:.2}s", build.build_time_seconds);
        if build.errors > 0 {
            println!("   {} {} files failed", "✗".red(), build.errors);
        }
        if build.embeddings_enabled {
            println!(
                "   Embeddings:  {} added, {} failed",
                build.embeddings_added, build.embedding_failures
            );
        }
    }

    println!();
    println!("{} Ready", "✓".green().bold());
}
