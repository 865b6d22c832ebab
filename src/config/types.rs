use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Sitegauge
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Fetch and link verification behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Timeout for the page fetch (seconds)
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Timeout for each outbound link check (seconds)
    #[serde(rename = "link-check-timeout-secs", default = "default_link_timeout")]
    pub link_check_timeout_secs: u64,

    /// Redirect hops a link check follows before settling on the last response
    #[serde(rename = "max-link-redirects", default = "default_max_redirects")]
    pub max_link_redirects: usize,
}

impl CrawlerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn link_check_timeout(&self) -> Duration {
        Duration::from_secs(self.link_check_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout(),
            link_check_timeout_secs: default_link_timeout(),
            max_link_redirects: default_max_redirects(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "Sitegauge".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/sitegauge".to_string(),
            contact_email: "crawler@example.com".to_string(),
        }
    }
}

/// Durable job queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Path to the SQLite file holding queue messages and cancellation marks.
    /// Falls back to the storage database when unset.
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,

    /// Channel name the crawl jobs are pushed to
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Upper bound on a single blocking dequeue (seconds)
    #[serde(rename = "dequeue-wait-secs", default = "default_dequeue_wait")]
    pub dequeue_wait_secs: u64,

    /// Lifetime of a cancellation mark (seconds)
    #[serde(rename = "cancellation-ttl-secs", default = "default_cancellation_ttl")]
    pub cancellation_ttl_secs: u64,

    /// How often a waiting dequeue re-reads the table (milliseconds)
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl QueueConfig {
    pub fn dequeue_wait(&self) -> Duration {
        Duration::from_secs(self.dequeue_wait_secs)
    }

    pub fn cancellation_ttl(&self) -> Duration {
        Duration::from_secs(self.cancellation_ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            channel: default_channel(),
            dequeue_wait_secs: default_dequeue_wait(),
            cancellation_ttl_secs: default_cancellation_ttl(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Dispatch worker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Number of dispatch workers
    #[serde(default = "default_worker_count")]
    pub count: usize,

    /// How long shutdown waits for an in-flight crawl before aborting (seconds)
    #[serde(rename = "shutdown-grace-secs", default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl WorkerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

/// Page and result storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Config {
    /// Database file used by the job queue
    pub fn queue_database_path(&self) -> &str {
        self.queue
            .database_path
            .as_deref()
            .unwrap_or(&self.storage.database_path)
    }
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_link_timeout() -> u64 {
    10
}

fn default_max_redirects() -> usize {
    5
}

fn default_channel() -> String {
    "crawl_queue".to_string()
}

fn default_dequeue_wait() -> u64 {
    5
}

fn default_cancellation_ttl() -> u64 {
    30 * 60
}

fn default_poll_interval() -> u64 {
    250
}

fn default_worker_count() -> usize {
    1
}

fn default_shutdown_grace() -> u64 {
    10
}

fn default_database_path() -> String {
    "./sitegauge.db".to_string()
}
