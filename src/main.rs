//! Listing-Tracker main entry point
//!
//! This is the command-line interface for the Listing-Tracker marketplace
//! tracker.

use clap::Parser;
use listing_tracker::config::{load_config_with_hash, Config};
use listing_tracker::crawler::run_session;
use listing_tracker::model::CategoryDict;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Listing-Tracker: incremental tracking of a classified-ads marketplace
///
/// Each run crawls the listing index of every category, records new
/// listings, logs field-level changes to known ones, and moves listings that
/// left the site to the sold or removed state.
#[derive(Parser, Debug)]
#[command(name = "listing-tracker")]
#[command(version)]
#[command(about = "Incremental marketplace listing tracker", long_about = None)]
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

    /// Check every listing instead of stopping at the last scrape date
    #[arg(long)]
    full_refresh: bool,

    /// Only scrape these category numbers (comma separated)
    #[arg(long, value_delimiter = ',', value_name = "NUMS")]
    categories: Option<Vec<i64>>,

    /// Validate config and show what would be scraped without scraping
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Command line flags win over the file
    if cli.full_refresh {
        config.scraper.full_refresh = true;
    }
    if let Some(categories) = cli.categories {
        if let Some(bad) = categories.iter().find(|n| **n < 0) {
            return Err(format!("Invalid category number: {}", bad).into());
        }
        config.scraper.categories_to_scrape = Some(categories);
    }

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_session(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_tracker=info,warn"),
            1 => EnvFilter::new("listing_tracker=debug,info"),
            2 => EnvFilter::new("listing_tracker=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be scraped
fn handle_dry_run(config: &Config) {
    println!("=== Listing-Tracker Dry Run ===\n");

    println!("Scraper Configuration:");
    println!("  Delay: {}ms", config.scraper.delay_ms);
    println!("  Concurrency: {}", config.scraper.concurrency);
    println!("  Full refresh: {}", config.scraper.full_refresh);
    println!("  Max retries: {}", config.scraper.max_retries);
    println!("  Ordering check: {}", config.scraper.ordering_check);

    println!("\nSource:");
    println!("  Base URL: {}", config.source.base_url);
    println!("  Region: {}", config.source.region);
    println!("  Respect robots.txt: {}", config.source.respect_robots);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let categories = CategoryDict::new(config.categories.clone());
    let selected = match &config.scraper.categories_to_scrape {
        Some(subset) => subset.clone(),
        None => categories.full_range(),
    };

    println!("\nCategories ({} named):", categories.len());
    for (name, num) in categories.iter() {
        let marker = if selected.contains(&num) { "*" } else { " " };
        println!("  {} {:>4} {}", marker, num, name);
    }

    let unnamed = selected
        .iter()
        .filter(|n| categories.name_of(**n).is_none())
        .count();

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would scrape {} categories in random order ({} numbers without a name are skipped)",
        selected.len() - unnamed,
        unnamed
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use listing_tracker::output::{load_statistics, print_statistics};
    use listing_tracker::storage::SqliteStore;
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let store = SqliteStore::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats, &CategoryDict::new(config.categories.clone()));

    Ok(())
}

/// Handles the main tracking session
async fn handle_session(
    config: Config,
    config_hash: String,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.scraper.full_refresh {
        tracing::info!("Starting full refresh session");
    } else {
        tracing::info!("Starting incremental session");
    }

    match run_session(config, config_hash).await {
        Ok(stats) => {
            tracing::info!(
                "Session completed: {} categories, {} new, {} updated, {} sold, {} removed",
                stats.categories_processed,
                stats.new_listings,
                stats.updated,
                stats.sold,
                stats.removed
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Session failed: {}", e);
            Err(e.into())
        }
    }
}
