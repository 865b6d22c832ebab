//! Sitegauge main entry point
//!
//! This is the command-line interface for registering pages, steering their
//! crawls and running the dispatch workers.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sitegauge::config::{load_config_with_hash, Config};
use sitegauge::crawler::{analyze_url, spawn_workers, CrawlPipeline, Dispatcher};
use sitegauge::output::{load_statistics, print_analysis, print_page_report, print_statistics};
use sitegauge::pages::{BulkOutcome, PageService};
use sitegauge::queue::SqliteJobQueue;
use sitegauge::storage::{open_storage, ResultRepository, SqliteStorage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Sitegauge: structural page analysis behind a durable crawl queue
///
/// Register pages with `add`, run `worker` to crawl them, and inspect the
/// results with `show` and `stats`.
#[derive(Parser, Debug)]
#[command(name = "sitegauge")]
#[command(version)]
#[command(about = "Structural page analysis behind a durable crawl queue", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run dispatch workers until Ctrl-C
    Worker,

    /// Register URLs and queue them for crawling
    Add {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Queue pages for crawling (running pages are left alone)
    Start {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Stop pages, including crawls in progress
    Stop {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Clear stop requests and queue pages again
    Recrawl {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Delete pages (adding the URL again restores them)
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Show a page and its latest crawl result
    Show { id: i64 },

    /// Show page and queue statistics
    Stats,

    /// Crawl a single URL once without storing anything
    Analyze { url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::debug!("Configuration loaded (hash: {})", config_hash);

    if let Command::Analyze { url } = &cli.command {
        let analysis = analyze_url(&config, url).await?;
        print_analysis(url, &analysis);
        return Ok(());
    }

    let storage = Arc::new(
        open_storage(Path::new(&config.storage.database_path))
            .context("failed to open page database")?,
    );
    let queue = Arc::new(
        SqliteJobQueue::new(Path::new(config.queue_database_path()), &config.queue)
            .context("failed to open job queue")?,
    );
    let service = PageService::new(storage.clone(), queue.clone());

    match cli.command {
        Command::Worker => run_worker(&config, storage, queue).await?,
        Command::Add { urls } => {
            for url in urls {
                match service.add_url(&url).await {
                    Ok(added) => {
                        println!("{} [{}] {}", added.page.id, added.page.url, added.message())
                    }
                    Err(e) => eprintln!("{}: {}", url, e),
                }
            }
        }
        Command::Start { ids } => report_bulk("start", service.start(&ids).await?),
        Command::Stop { ids } => report_bulk("stop", service.stop(&ids).await?),
        Command::Recrawl { ids } => report_bulk("recrawl", service.recrawl(&ids).await?),
        Command::Delete { ids } => report_bulk("delete", service.delete(&ids).await?),
        Command::Show { id } => {
            let page = service
                .get_page(id)?
                .with_context(|| format!("page {} not found", id))?;
            let result = storage.get_by_page(id)?;
            print_page_report(&page, result.as_ref());
        }
        Command::Stats => {
            println!("Database: {}\n", config.storage.database_path);
            let stats = load_statistics(storage.as_ref(), storage.as_ref(), queue.as_ref()).await?;
            print_statistics(&stats);
        }
        // Runs before storage is opened
        Command::Analyze { .. } => {}
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitegauge=info,warn"),
            1 => EnvFilter::new("sitegauge=debug,info"),
            2 => EnvFilter::new("sitegauge=trace,debug"),
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

/// Runs the dispatch workers until Ctrl-C, then shuts them down
async fn run_worker(
    config: &Config,
    storage: Arc<SqliteStorage>,
    queue: Arc<SqliteJobQueue>,
) -> anyhow::Result<()> {
    let pipeline = CrawlPipeline::new(&config.crawler, &config.user_agent)
        .context("failed to build HTTP clients")?;

    tracing::info!(
        "Worker consuming channel '{}' with {} worker(s)",
        queue.channel(),
        config.worker.count
    );

    let dispatcher = Dispatcher::new(storage.clone(), storage, queue, Arc::new(pipeline))
        .with_dequeue_wait(config.queue.dequeue_wait());
    let workers = spawn_workers(dispatcher, config.worker.count).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("Shutdown requested");

    if workers.shutdown(config.worker.shutdown_grace()).await {
        tracing::info!("Workers stopped cleanly");
    } else {
        tracing::warn!("Some workers had to be aborted");
    }

    Ok(())
}

fn report_bulk(operation: &str, outcome: BulkOutcome) {
    println!(
        "{}: {} succeeded, {} skipped, {} failed",
        operation,
        outcome.succeeded.len(),
        outcome.skipped.len(),
        outcome.failed.len()
    );
    for (id, reason) in &outcome.failed {
        println!("  {}: {}", id, reason);
    }
}
