//! Lemma-Search main entry point
//!
//! This is the command-line interface for crawling, refreshing and searching
//! the lemma index.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use lemma_search::config::{load_config_with_hash, Config};
use lemma_search::crawler::Coordinator;
use lemma_search::morphology::{load_extractor, LemmaExtractor};
use lemma_search::output::{
    load_statistics, print_crawl_report, print_search_response, print_statistics,
};
use lemma_search::search::{SearchEngine, SearchQuery};
use lemma_search::state::{IndexingFlag, SiteStatus};
use lemma_search::storage::{open_storage, Storage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Lemma-Search: a site crawler with a lemma-based inverted index
///
/// Without a mode flag, Lemma-Search crawls every configured site from its
/// root page, stores each page and indexes the lemmas of its text.
#[derive(Parser, Debug)]
#[command(name = "lemma-search")]
#[command(version = "1.0.0")]
#[command(about = "Crawl sites and search them by lemma", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "refresh", "search"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "refresh", "search"])]
    stats: bool,

    /// Re-fetch and re-index a single page of a configured site
    #[arg(long, value_name = "URL", conflicts_with_all = ["dry_run", "stats", "search"])]
    refresh: Option<String>,

    /// Search the index
    #[arg(long, value_name = "QUERY", conflicts_with_all = ["dry_run", "stats", "refresh"])]
    search: Option<String>,

    /// Restrict the search to one site
    #[arg(long, value_name = "URL", requires = "search")]
    site: Option<String>,

    /// Page number of search results (zero-based)
    #[arg(long, default_value_t = 0, requires = "search")]
    offset: usize,

    /// Search results per page
    #[arg(long, requires = "search")]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let storage: Arc<dyn Storage> = Arc::new(
        open_storage(Path::new(&config.storage.database_path)).with_context(|| {
            format!("Failed to open database {}", config.storage.database_path)
        })?,
    );

    if cli.stats {
        return handle_stats(&config, storage.as_ref());
    }

    let extractor =
        load_extractor(&config.morphology).context("Failed to load morphology dictionary")?;

    if let Some(query) = cli.search {
        let query = SearchQuery {
            query,
            site: cli.site,
            offset: cli.offset,
            limit: cli.limit,
        };
        handle_search(&config, storage, extractor, &query)
    } else if let Some(url) = cli.refresh {
        handle_refresh(config, storage, extractor, &url).await
    } else {
        handle_crawl(config, storage, extractor).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lemma_search=info,warn"),
            1 => EnvFilter::new("lemma_search=debug,info"),
            2 => EnvFilter::new("lemma_search=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Lemma-Search Dry Run ===\n");

    println!("Indexing:");
    println!("  User agent: {}", config.indexing.user_agent);
    println!("  Referrer: {}", config.indexing.referrer);
    println!("  Timeout: {}s", config.indexing.timeout_secs);

    println!("\nSearch:");
    println!("  Frequency ceiling: {}", config.search.frequency_ceiling);
    println!(
        "  Ceiling applies from: {} pages",
        config.search.frequency_filter_min_pages
    );
    println!("  Default limit: {}", config.search.default_limit);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\nMorphology:");
    match &config.morphology.dictionary_path {
        Some(path) => println!("  Dictionary: {}", path),
        None => println!("  Dictionary: built-in word classes only"),
    }

    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        println!("  - {} ({})", site.name, site.url);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling {} sites", config.sites.len());
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config, storage: &dyn Storage) -> Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let indexing = storage
        .find_all_sites()?
        .iter()
        .any(|site| site.status == SiteStatus::Indexing);
    let stats = load_statistics(storage, indexing)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --search mode: prints one page of results
fn handle_search(
    config: &Config,
    storage: Arc<dyn Storage>,
    extractor: LemmaExtractor,
    query: &SearchQuery,
) -> Result<()> {
    let engine = SearchEngine::new(storage, extractor, config.search.clone());
    let response = engine.search(query)?;
    print_search_response(&response, query.first_row(config.search.default_limit));
    Ok(())
}

/// Handles the --refresh mode: re-indexes a single page
async fn handle_refresh(
    config: Config,
    storage: Arc<dyn Storage>,
    extractor: LemmaExtractor,
    url: &str,
) -> Result<()> {
    let coordinator = Coordinator::new(config, storage, extractor)?;
    let flag = IndexingFlag::new();

    let page = coordinator.refresh_single_page(url, &flag).await?;
    println!("Refreshed {} (code {})", url, page.code);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    storage: Arc<dyn Storage>,
    extractor: LemmaExtractor,
) -> Result<()> {
    tracing::info!("Sites: {}", config.sites.len());

    let coordinator = Coordinator::new(config, storage, extractor)?;
    let flag = IndexingFlag::new();
    if !flag.try_begin() {
        anyhow::bail!("Indexing is already running");
    }

    // Ctrl-C stops the run; tasks notice at their next guard point
    let interrupt = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && interrupt.stop() {
            tracing::warn!("Interrupt received, stopping indexing");
        }
    });

    let started_at = Utc::now();
    match coordinator.start_crawl(&flag).await {
        Ok(report) => {
            tracing::info!("Crawl completed");
            print_crawl_report(&report, started_at);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
