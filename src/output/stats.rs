//! Statistics over registered pages and the crawl queue
//!
//! This module provides functionality for extracting and displaying
//! page statistics from the repositories and the job queue.

use crate::queue::JobQueue;
use crate::state::PageStatus;
use crate::storage::{PageRepository, ResultRepository};
use crate::GaugeError;
use std::collections::HashMap;
use std::fmt::Write;

/// Page and queue statistics summary
#[derive(Debug, Clone)]
pub struct PageStatistics {
    /// Total number of active pages
    pub total_pages: u64,

    /// Count of active pages by status
    pub pages_by_status: HashMap<PageStatus, u64>,

    /// Jobs waiting on the queue channel
    pub queued_jobs: u64,

    /// Broken links recorded across all stored results
    pub broken_links: u64,
}

impl PageStatistics {
    pub fn count(&self, status: PageStatus) -> u64 {
        self.pages_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from the repositories and the queue
///
/// # Arguments
///
/// * `pages` - The page repository to query
/// * `results` - The result repository to query
/// * `queue` - The job queue whose depth is reported
///
/// # Returns
///
/// * `Ok(PageStatistics)` - Successfully loaded statistics
/// * `Err(GaugeError)` - Failed to query statistics
pub async fn load_statistics(
    pages: &dyn PageRepository,
    results: &dyn ResultRepository,
    queue: &dyn JobQueue,
) -> Result<PageStatistics, GaugeError> {
    let total_pages = pages.count_total_pages()?;

    let mut pages_by_status = HashMap::new();
    for status in PageStatus::all_statuses() {
        let count = pages.count_pages_by_status(status)?;
        if count > 0 {
            pages_by_status.insert(status, count);
        }
    }

    let broken_links = results.count_broken_links()?;
    let queued_jobs = queue.pending_jobs().await?;

    Ok(PageStatistics {
        total_pages,
        pages_by_status,
        queued_jobs,
        broken_links,
    })
}

/// Formats statistics as a plain-text report
pub fn render_statistics(stats: &PageStatistics) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Sitegauge Statistics ===\n");
    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Total pages: {}", stats.total_pages);
    let _ = writeln!(out, "  Jobs waiting on queue: {}", stats.queued_jobs);
    let _ = writeln!(out, "  Broken links recorded: {}", stats.broken_links);
    let _ = writeln!(out);

    let _ = writeln!(out, "Pages by Status:");
    for status in PageStatus::all_statuses() {
        let count = stats.count(status);
        let percentage = if stats.total_pages > 0 {
            (count as f64 / stats.total_pages as f64) * 100.0
        } else {
            0.0
        };
        let _ = writeln!(out, "  {}: {} ({:.1}%)", status, count, percentage);
    }

    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &PageStatistics) {
    print!("{}", render_statistics(stats));
}
