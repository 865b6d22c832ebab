//! Sitegauge: structural page analysis behind a durable crawl queue
//!
//! Operators register pages; a background worker fetches each one, extracts
//! heading and link metrics, detects login forms, verifies outbound links and
//! commits a single analysis result per page.

pub mod config;
pub mod crawler;
pub mod output;
pub mod pages;
pub mod queue;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sitegauge operations
#[derive(Debug, Error)]
pub enum GaugeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Crawl failed: {0}")]
    Crawl(#[from] crawler::CrawlFailure),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid state transition for page {page_id}: {from} -> {event:?}")]
    InvalidTransition {
        page_id: i64,
        from: state::PageStatus,
        event: state::LifecycleEvent,
    },

    #[error("{operation} failed for all {count} page(s)")]
    BatchFailed {
        operation: &'static str,
        count: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Sitegauge operations
pub type Result<T> = std::result::Result<T, GaugeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{LifecycleEvent, PageStatus};
pub use url::normalize_page_url;
