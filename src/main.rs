//! Shelfwatch command-line interface

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use shelfwatch::changes::run_change_detection;
use shelfwatch::config::load_config_with_hash;
use shelfwatch::crawler::run_crawl;
use shelfwatch::storage::{SqliteStore, Store};

/// Shelfwatch: catalog harvester with change tracking
///
/// Shelfwatch crawls a paginated book catalog, stores every record keyed
/// by its source URL, and keeps an append-only history of field-level
/// changes between crawls.
#[derive(Parser, Debug)]
#[command(name = "shelfwatch")]
#[command(version)]
#[command(about = "Catalog harvester with change tracking", long_about = None)]
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

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl the catalog and persist every record
    Crawl {
        /// Skip addresses already present in the store
        #[arg(long)]
        resume: bool,
    },

    /// Re-fetch stored records and log detected changes
    Detect,

    /// Show statistics from the database and exit
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    match cli.command {
        Commands::Crawl { resume } => handle_crawl(config, resume).await,
        Commands::Detect => handle_detect(config).await,
        Commands::Stats => handle_stats(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shelfwatch=info,warn"),
            1 => EnvFilter::new("shelfwatch=debug,info"),
            2 => EnvFilter::new("shelfwatch=trace,debug"),
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

/// Handles the crawl command
///
/// Item-level failures are reported in the summary and do not affect the
/// exit code; only a fatal initialization failure (unreadable config,
/// unreachable first listing page, storage open failure) exits non-zero.
async fn handle_crawl(config: shelfwatch::Config, resume: bool) -> anyhow::Result<()> {
    let progress = run_crawl(config, resume).await?;

    println!("\n{}", "=".repeat(60));
    println!("Crawl Summary:");
    println!("{}", "=".repeat(60));
    println!("Total books: {}", progress.total_pages);
    println!("Successfully crawled: {}", progress.completed_pages);
    println!("Failed: {}", progress.failed_pages.len());
    for url in &progress.failed_pages {
        println!("  - {}", url);
    }
    println!("Progress: {:.1}%", progress.progress_percentage());
    println!("Status: {}", progress.status.to_db_string());
    println!("{}\n", "=".repeat(60));

    Ok(())
}

/// Handles the detect command
async fn handle_detect(config: shelfwatch::Config) -> anyhow::Result<()> {
    let summary = run_change_detection(config).await?;

    println!("\n{}", "=".repeat(60));
    println!("Change Detection Summary:");
    println!("{}", "=".repeat(60));
    println!("Books checked: {}", summary.checked);
    println!("Unchanged: {}", summary.unchanged);
    println!("Changed: {}", summary.changed);
    println!("Events logged: {}", summary.events_logged);
    println!("New books: {}", summary.new_books.len());
    for url in &summary.new_books {
        println!("  + {}", url);
    }
    if !summary.failed.is_empty() {
        println!("Check failures: {}", summary.failed.len());
        for url in &summary.failed {
            println!("  ! {}", url);
        }
    }
    println!("{}\n", "=".repeat(60));

    Ok(())
}

/// Handles the stats command: shows what the database currently holds
fn handle_stats(config: &shelfwatch::Config) -> anyhow::Result<()> {
    let store = SqliteStore::open(Path::new(&config.output.database_path))?;

    println!("Database: {}\n", config.output.database_path);
    println!("Stored books: {}", store.count_books()?);
    println!("Logged changes: {}", store.count_changes()?);

    match store.load_progress()? {
        Some(progress) => {
            println!("\nLast crawl ({}):", progress.timestamp.to_rfc3339());
            println!(
                "  {}/{} completed, {} failed, status: {}",
                progress.completed_pages,
                progress.total_pages,
                progress.failed_pages.len(),
                progress.status.to_db_string()
            );
        }
        None => println!("\nNo crawl has run yet"),
    }

    Ok(())
}
