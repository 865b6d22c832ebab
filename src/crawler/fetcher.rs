//! HTTP fetcher implementation
//!
//! This module builds the two HTTP clients a crawl needs and performs the
//! page fetch:
//! - the page client, with the fetch timeout and default redirect handling
//! - the link client, with the link-check timeout and a redirect policy that
//!   settles on the last response after a fixed number of hops
//! - classification of fetch failures (transport, timeout, HTTP, content)

use crate::config::UserAgentConfig;
use crate::crawler::CrawlFailure;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects; relative links resolve against it
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Page body content
    pub body: String,
}

/// Builds the HTTP client used for page fetches
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `timeout` - Total time allowed for one fetch
///
/// # Example
///
/// ```no_run
/// use sitegauge::config::UserAgentConfig;
/// use sitegauge::crawler::build_page_client;
/// use std::time::Duration;
///
/// let client = build_page_client(&UserAgentConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_page_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds the HTTP client used to verify outbound links
///
/// After `max_redirects` hops the client stops following and hands back the
/// redirect response itself, which counts as reachable.
pub fn build_link_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
    max_redirects: usize,
) -> Result<Client, reqwest::Error> {
    let policy = Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            attempt.stop()
        } else {
            attempt.follow()
        }
    });

    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
        .redirect(policy)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages and turns every failure into a `CrawlFailure`
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetches a page with a single GET
    ///
    /// # Failure Classification
    ///
    /// | Condition | Failure |
    /// |-----------|---------|
    /// | URL does not parse | `InvalidUrl` |
    /// | Request timed out | `Timeout` |
    /// | Connection, TLS or redirect error | `Transport` |
    /// | HTTP status >= 400 | `HttpStatus` |
    /// | Body cannot be read | `Content` |
    ///
    /// Any readable body is handed to the HTML parser whatever its
    /// `Content-Type`; the parser accepts arbitrary input.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, CrawlFailure> {
        let target = Url::parse(url).map_err(|e| CrawlFailure::InvalidUrl(e.to_string()))?;

        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(CrawlFailure::HttpStatus(status.as_u16()));
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| CrawlFailure::Content(format!("failed to read body: {}", e)))?;

        Ok(FetchedPage {
            final_url,
            status_code: status.as_u16(),
            body,
        })
    }

    fn classify(&self, error: reqwest::Error) -> CrawlFailure {
        if error.is_timeout() {
            CrawlFailure::Timeout(self.timeout)
        } else {
            CrawlFailure::Transport(error)
        }
    }
}
