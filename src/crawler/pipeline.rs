//! The fetch and parse pipeline for a single page
//!
//! A crawl is: check for cancellation, fetch the page, check again, analyze
//! the markup, verify each distinct outbound link. The pipeline never touches
//! storage; the dispatcher decides what to persist.

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::fetcher::{build_link_client, build_page_client, PageFetcher};
use crate::crawler::links::LinkChecker;
use crate::crawler::parser::analyze_html;
use crate::crawler::CancelCheck;
use crate::storage::{BrokenLink, CrawlResult, HeadingCounts};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Every page is reported as HTML5; doctype sniffing is not attempted
pub const HTML_VERSION: &str = "HTML5";

/// Why a crawl did not produce an analysis
#[derive(Debug, Error)]
pub enum CrawlFailure {
    #[error("crawl stopped")]
    Cancelled,

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    #[error("content error: {0}")]
    Content(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl CrawlFailure {
    /// Cancellation is a normal way for a crawl to end, not an error
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// The structural metrics of one successfully crawled page
#[derive(Debug, Clone, PartialEq)]
pub struct PageAnalysis {
    pub html_version: String,
    pub title: Option<String>,
    pub headings: HeadingCounts,
    pub internal_links: u32,
    pub external_links: u32,
    pub has_login_form: bool,
    pub broken_links: Vec<BrokenLink>,
}

impl PageAnalysis {
    /// Converts the analysis into the result stored for a page
    pub fn into_result(self, page_id: i64) -> CrawlResult {
        CrawlResult {
            page_id,
            html_version: self.html_version,
            title: self.title,
            headings: self.headings,
            internal_links: self.internal_links,
            external_links: self.external_links,
            has_login_form: self.has_login_form,
            error_message: None,
            broken_links: self.broken_links,
        }
    }
}

/// Anything that can crawl one page
#[async_trait]
pub trait PageCrawler: Send + Sync {
    async fn crawl(&self, url: &str, cancel: &dyn CancelCheck)
        -> Result<PageAnalysis, CrawlFailure>;
}

/// The HTTP-backed crawler
#[derive(Debug, Clone)]
pub struct CrawlPipeline {
    fetcher: PageFetcher,
    links: LinkChecker,
}

impl CrawlPipeline {
    /// Builds the page and link clients from configuration
    pub fn new(
        crawler: &CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, reqwest::Error> {
        let page_client = build_page_client(user_agent, crawler.fetch_timeout())?;
        let link_client = build_link_client(
            user_agent,
            crawler.link_check_timeout(),
            crawler.max_link_redirects,
        )?;

        Ok(Self {
            fetcher: PageFetcher::new(page_client, crawler.fetch_timeout()),
            links: LinkChecker::new(link_client),
        })
    }
}

#[async_trait]
impl PageCrawler for CrawlPipeline {
    async fn crawl(
        &self,
        url: &str,
        cancel: &dyn CancelCheck,
    ) -> Result<PageAnalysis, CrawlFailure> {
        if cancel.is_cancelled().await {
            return Err(CrawlFailure::Cancelled);
        }

        let page = self.fetcher.fetch(url).await?;
        tracing::debug!(
            "Fetched {} ({} bytes, status {})",
            page.final_url,
            page.body.len(),
            page.status_code
        );

        if cancel.is_cancelled().await {
            return Err(CrawlFailure::Cancelled);
        }

        // analyze_html drops the parsed tree before returning; it is not Send
        let document = analyze_html(&page.body, &page.final_url);

        let broken_links = self.links.check_all(&document.links.targets).await;
        tracing::debug!(
            "Checked {} links on {}, {} broken",
            document.links.targets.len(),
            page.final_url,
            broken_links.len()
        );

        Ok(PageAnalysis {
            html_version: HTML_VERSION.to_string(),
            title: document.title,
            headings: document.headings,
            internal_links: document.links.internal,
            external_links: document.links.external,
            has_login_form: document.has_login_form,
            broken_links,
        })
    }
}
