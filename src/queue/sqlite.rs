//! SQLite-backed job queue
//!
//! Messages live in `queue_messages` keyed by channel, so several logical
//! queues can share one database file. A waiting `dequeue` is woken by
//! in-process enqueues through a `Notify` and re-reads the table every poll
//! interval to pick up jobs pushed by other processes.

use crate::config::QueueConfig;
use crate::queue::{CrawlJob, JobQueue, QueueError, QueueResult};
use crate::GaugeError;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

const QUEUE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS queue_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel TEXT NOT NULL,
    payload TEXT NOT NULL,
    enqueued_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queue_messages_channel ON queue_messages(channel, id);

CREATE TABLE IF NOT EXISTS cancellation_marks (
    page_id INTEGER PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
"#;

/// Durable FIFO queue stored in SQLite
pub struct SqliteJobQueue {
    conn: Mutex<Connection>,
    channel: String,
    cancellation_ttl: Duration,
    poll_interval: Duration,
    notify: Notify,
}

impl SqliteJobQueue {
    /// Opens (or creates) the queue tables in the database at `path`
    pub fn new(path: &Path, config: &QueueConfig) -> Result<Self, GaugeError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        Self::with_connection(conn, config)
    }

    /// Creates a queue backed by an in-memory database
    pub fn new_in_memory(config: &QueueConfig) -> Result<Self, GaugeError> {
        Self::with_connection(Connection::open_in_memory()?, config)
    }

    fn with_connection(conn: Connection, config: &QueueConfig) -> Result<Self, GaugeError> {
        conn.execute_batch(QUEUE_SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            channel: config.channel.clone(),
            cancellation_ttl: config.cancellation_ttl(),
            poll_interval: config.poll_interval(),
            notify: Notify::new(),
        })
    }

    /// The channel this queue reads and writes
    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn conn(&self) -> QueueResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| QueueError::LockPoisoned)
    }

    /// Removes and returns the oldest well-formed job on the channel
    ///
    /// Malformed messages are dropped along the way.
    fn try_pop(&self) -> QueueResult<Option<CrawlJob>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let job = loop {
            let message: Option<(i64, String)> = tx
                .query_row(
                    "SELECT id, payload FROM queue_messages WHERE channel = ?1 ORDER BY id LIMIT 1",
                    params![self.channel],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((message_id, payload)) = message else {
                break None;
            };

            tx.execute(
                "DELETE FROM queue_messages WHERE id = ?1",
                params![message_id],
            )?;

            match serde_json::from_str::<CrawlJob>(&payload) {
                Ok(job) => break Some(job),
                Err(e) => {
                    tracing::warn!(
                        "Dropping malformed message {} on channel {}: {}",
                        message_id,
                        self.channel,
                        e
                    );
                }
            }
        };

        tx.commit()?;
        Ok(job)
    }

    fn purge_expired_marks(conn: &Connection, now_ms: i64) -> QueueResult<()> {
        conn.execute(
            "DELETE FROM cancellation_marks WHERE expires_at <= ?1",
            params![now_ms],
        )?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, page_id: i64) -> QueueResult<()> {
        let job = CrawlJob::new(page_id);
        let payload = serde_json::to_string(&job)?;

        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO queue_messages (channel, payload, enqueued_at) VALUES (?1, ?2, ?3)",
                params![self.channel, payload, job.enqueued_at.to_rfc3339()],
            )?;
        }

        tracing::debug!("Enqueued page {} on {}", page_id, self.channel);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> QueueResult<Option<CrawlJob>> {
        let deadline = Instant::now() + wait;

        loop {
            if let Some(job) = self.try_pop()? {
                return Ok(Some(job));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let nap = (deadline - now).min(self.poll_interval);
            let _ = tokio::time::timeout(nap, self.notify.notified()).await;
        }
    }

    async fn mark_cancelled(&self, page_id: i64) -> QueueResult<()> {
        let now_ms = Utc::now().timestamp_millis();
        let expires_at = now_ms + self.cancellation_ttl.as_millis() as i64;

        let conn = self.conn()?;
        Self::purge_expired_marks(&conn, now_ms)?;
        conn.execute(
            "INSERT OR REPLACE INTO cancellation_marks (page_id, value, expires_at)
             VALUES (?1, 'cancelled', ?2)",
            params![page_id, expires_at],
        )?;
        Ok(())
    }

    async fn clear_cancellation(&self, page_id: i64) -> QueueResult<()> {
        let conn = self.conn()?;
        Self::purge_expired_marks(&conn, Utc::now().timestamp_millis())?;
        conn.execute(
            "DELETE FROM cancellation_marks WHERE page_id = ?1",
            params![page_id],
        )?;
        Ok(())
    }

    async fn is_cancelled(&self, page_id: i64) -> QueueResult<bool> {
        let conn = self.conn()?;
        let cancelled: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cancellation_marks WHERE page_id = ?1 AND expires_at > ?2)",
            params![page_id, Utc::now().timestamp_millis()],
            |row| row.get(0),
        )?;
        Ok(cancelled)
    }

    async fn pending_jobs(&self) -> QueueResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM queue_messages WHERE channel = ?1",
            params![self.channel],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
