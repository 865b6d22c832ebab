//! Cooperative cancellation checks for an in-flight crawl

use crate::queue::JobQueue;
use async_trait::async_trait;
use std::sync::Arc;

/// Answers whether the crawl in progress should stop
#[async_trait]
pub trait CancelCheck: Send + Sync {
    async fn is_cancelled(&self) -> bool;
}

/// Reads the page's cancellation mark from the job queue
pub struct QueueCancellation {
    queue: Arc<dyn JobQueue>,
    page_id: i64,
}

impl QueueCancellation {
    pub fn new(queue: Arc<dyn JobQueue>, page_id: i64) -> Self {
        Self { queue, page_id }
    }
}

#[async_trait]
impl CancelCheck for QueueCancellation {
    /// A failed lookup does not interrupt a crawl that already started
    async fn is_cancelled(&self) -> bool {
        match self.queue.is_cancelled(self.page_id).await {
            Ok(cancelled) => cancelled,
            Err(e) => {
                tracing::warn!(
                    "Cancellation lookup for page {} failed: {}",
                    self.page_id,
                    e
                );
                false
            }
        }
    }
}

/// A check that never cancels, for one-off analysis runs
pub struct NeverCancelled;

#[async_trait]
impl CancelCheck for NeverCancelled {
    async fn is_cancelled(&self) -> bool {
        false
    }
}
