//! Crawler module: the crawl pipeline and the dispatch loop around it
//!
//! This module contains:
//! - HTTP fetching and outbound link verification
//! - HTML structural analysis
//! - The single-page crawl pipeline with cooperative cancellation
//! - The dispatcher that turns queued jobs into page state and results
//! - The worker pool that runs dispatchers until shutdown

mod cancel;
mod dispatcher;
mod fetcher;
mod in_flight;
mod links;
mod parser;
mod pipeline;
mod worker;

pub use cancel::{CancelCheck, NeverCancelled, QueueCancellation};
pub use dispatcher::{Dispatcher, JobOutcome, SkipReason};
pub use fetcher::{build_link_client, build_page_client, FetchedPage, PageFetcher};
pub use in_flight::{InFlightGuard, InFlightPages};
pub use links::LinkChecker;
pub use parser::{analyze_html, DocumentAnalysis, LinkInventory};
pub use pipeline::{CrawlFailure, CrawlPipeline, PageAnalysis, PageCrawler, HTML_VERSION};
pub use worker::{spawn_workers, WorkerHandle};

use crate::config::Config;
use crate::GaugeError;

/// Crawls one page without touching storage or the queue
///
/// # Arguments
///
/// * `config` - The configuration supplying timeouts and the user agent
/// * `url` - The URL to analyze, normalized first
pub async fn analyze_url(config: &Config, url: &str) -> Result<PageAnalysis, GaugeError> {
    let url = crate::url::normalize_page_url(url)?;
    let pipeline = CrawlPipeline::new(&config.crawler, &config.user_agent)?;

    let analysis = pipeline.crawl(&url, &NeverCancelled).await?;
    Ok(analysis)
}
