use async_trait::async_trait;
use sitegauge::config::{Config, QueueConfig};
use sitegauge::crawler::{CancelCheck, CrawlPipeline, Dispatcher};
use sitegauge::pages::PageService;
use sitegauge::queue::SqliteJobQueue;
use sitegauge::storage::SqliteStorage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::ResponseTemplate;

/// Configuration with short timeouts for local mock servers
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.crawler.fetch_timeout_secs = 5;
    config.crawler.link_check_timeout_secs = 2;
    config.user_agent.crawler_name = "TestGauge".to_string();
    config.queue = QueueConfig {
        poll_interval_ms: 20,
        ..QueueConfig::default()
    };
    config
}

pub fn pipeline() -> CrawlPipeline {
    let config = test_config();
    CrawlPipeline::new(&config.crawler, &config.user_agent).unwrap()
}

/// A 200 response carrying an HTML body
pub fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html; charset=utf-8")
}

/// The same server addressed through a different host name, so links to it
/// count as external
pub fn external_base(server_uri: &str) -> String {
    server_uri.replace("127.0.0.1", "localhost")
}

/// In-memory storage and queue wired to a real crawl pipeline
pub struct TestEnv {
    pub storage: Arc<SqliteStorage>,
    pub queue: Arc<SqliteJobQueue>,
    pub service: PageService,
    pub dispatcher: Dispatcher,
}

impl TestEnv {
    pub fn new() -> Self {
        let config = test_config();
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        let queue = Arc::new(SqliteJobQueue::new_in_memory(&config.queue).unwrap());
        let service = PageService::new(storage.clone(), queue.clone());
        let dispatcher = Dispatcher::new(
            storage.clone(),
            storage.clone(),
            queue.clone(),
            Arc::new(pipeline()),
        )
        .with_dequeue_wait(Duration::from_millis(500));

        Self {
            storage,
            queue,
            service,
            dispatcher,
        }
    }
}

/// Reports cancellation from the n-th check onwards (0-based)
pub struct CancelFromCheck {
    first_cancelled_check: usize,
    calls: AtomicUsize,
}

impl CancelFromCheck {
    pub fn new(first_cancelled_check: usize) -> Self {
        Self {
            first_cancelled_check,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CancelCheck for CancelFromCheck {
    async fn is_cancelled(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst) >= self.first_cancelled_check
    }
}
