//! Output module for reports and statistics
//!
//! This module handles:
//! - Page and queue statistics for the `stats` command
//! - Per-page reports of the stored crawl result
//! - Reports for one-off analyses that are not persisted

mod report;
pub mod stats;

pub use report::{print_analysis, print_page_report, render_analysis, render_page_report};
pub use stats::{load_statistics, print_statistics, render_statistics, PageStatistics};
