//! Durable crawl job queue
//!
//! Jobs are pushed onto a named channel and consumed in FIFO order by the
//! dispatch workers. Next to the jobs the queue keeps per-page cancellation
//! marks: an unexpired mark means an operator asked for the page to stop.
//! Marks never remove queued jobs; the dispatcher consults them instead.

mod sqlite;

pub use sqlite::SqliteJobQueue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A unit of work on the queue: crawl one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlJob {
    pub page_id: i64,
    pub enqueued_at: DateTime<Utc>,
}

impl CrawlJob {
    pub fn new(page_id: i64) -> Self {
        Self {
            page_id,
            enqueued_at: Utc::now(),
        }
    }
}

/// Errors that can occur during queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to serialize job: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queue connection lock poisoned")]
    LockPoisoned,
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Work queue plus out-of-band cancellation marks
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Appends a job for the page, stamped with the current time
    async fn enqueue(&self, page_id: i64) -> QueueResult<()>;

    /// Waits up to `wait` for the oldest job
    ///
    /// Returns `Ok(None)` when the wait elapsed without a job.
    async fn dequeue(&self, wait: Duration) -> QueueResult<Option<CrawlJob>>;

    /// Records that the page should stop, for the configured TTL
    async fn mark_cancelled(&self, page_id: i64) -> QueueResult<()>;

    /// Removes the page's cancellation mark, if any
    async fn clear_cancellation(&self, page_id: i64) -> QueueResult<()>;

    /// Returns true if the page carries an unexpired cancellation mark
    async fn is_cancelled(&self, page_id: i64) -> QueueResult<bool>;

    /// Number of jobs waiting on the channel
    async fn pending_jobs(&self) -> QueueResult<u64>;
}
