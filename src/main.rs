mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use mdsearch::core::config::Config;
use mdsearch::core::paths::IndexPaths;

/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "MDSEARCH_LOG";

#[derive(Parser)]
#[command(name = "mdsearch")]
#[command(about = "Offline hybrid search for markdown documentation", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Index directory (default: $MDSEARCH_INDEX_DIR or ~/.mdsearch/docs-index)")]
    index_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Config file (default: <index-dir>/config.json)")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "More log output (-v, -vv, -vvv)")]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index from a documentation directory
    Index {
        docs_dir: PathBuf,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Search the index
    Search {
        query: String,
        #[arg(long, short = 'k', help = "Number of results")]
        top_k: Option<usize>,
        #[arg(long, help = "Candidate multiplier for the keyword filter")]
        candidates: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show index status
    Status {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
}

fn init_tracing(verbose: u8) {
    let filter = if let Ok(env) = std::env::var(LOG_ENV) {
        EnvFilter::new(env)
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn load_config(explicit: Option<&Path>, paths: &IndexPaths) -> Result<Config> {
    let config = match explicit {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load(&paths.dir),
    };
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let paths = IndexPaths::resolve(cli.index_dir.as_deref());
    let config = load_config(cli.config.as_deref(), &paths)?;

    match cli.command {
        Commands::Index { docs_dir, json } => commands::index::run(config, paths, &docs_dir, json),
        Commands::Search {
            query,
            top_k,
            candidates,
            json,
        } => commands::search::run(config, &paths, &query, top_k, candidates, json),
        Commands::Status { json } => commands::status::run(&paths, json),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        let missing_index = e
            .chain()
            .filter_map(|cause| cause.downcast_ref::<mdsearch::Error>())
            .any(|err| err.is_index_not_found());

        eprintln!("{} {:#}", "error:".red().bold(), e);
        if missing_index {
            eprintln!(
                "{} Build it first: {}",
                "→".dimmed(),
                "mdsearch index <DOCS_DIR>".cyan()
            );
        }
        std::process::exit(1);
    }
}
