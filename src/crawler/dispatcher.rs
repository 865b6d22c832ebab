//! Dispatch loop: pulls crawl jobs and reconciles page state
//!
//! # Job Flow
//!
//! ```text
//! dequeue ─► cancellation mark? ──yes──► skip
//!               │ no
//!               ▼
//!          load page ──missing──► skip
//!               │
//!               ▼
//!          queued -> running ──illegal──► skip (stale job)
//!               │
//!               ▼
//!          crawl ─► ok ─────────────► upsert result, page done
//!               └─► failure ─► mark? ─yes─► upsert failed result, page stopped
//!                                 └─no──► upsert failed result, page error
//! ```

use crate::crawler::in_flight::InFlightPages;
use crate::crawler::{CancelCheck, CrawlFailure, PageAnalysis, PageCrawler, QueueCancellation};
use crate::queue::{CrawlJob, JobQueue};
use crate::state::{LifecycleEvent, PageStatus};
use crate::storage::{CrawlResult, PageRecord, PageRepository, ResultRepository, StorageError};
use crate::GaugeError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_DEQUEUE_WAIT: Duration = Duration::from_secs(5);

/// Pause after a failed dequeue before trying again
const DEQUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Why a job was dropped without crawling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The page carries a cancellation mark
    Cancelled,
    /// The cancellation mark could not be read
    CancellationUnknown,
    /// The page does not exist or is soft-deleted
    MissingPage,
    /// The page was not `queued` when the job arrived
    Stale(PageStatus),
    /// Another worker in this process is crawling the page
    Busy,
}

/// What processing one job did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Skipped(SkipReason),
    Done,
    Failed(String),
    Stopped,
}

/// Executes crawl jobs against the page and result repositories
#[derive(Clone)]
pub struct Dispatcher {
    pages: Arc<dyn PageRepository>,
    results: Arc<dyn ResultRepository>,
    queue: Arc<dyn JobQueue>,
    crawler: Arc<dyn PageCrawler>,
    dequeue_wait: Duration,
    in_flight: InFlightPages,
}

impl Dispatcher {
    pub fn new(
        pages: Arc<dyn PageRepository>,
        results: Arc<dyn ResultRepository>,
        queue: Arc<dyn JobQueue>,
        crawler: Arc<dyn PageCrawler>,
    ) -> Self {
        Self {
            pages,
            results,
            queue,
            crawler,
            dequeue_wait: DEFAULT_DEQUEUE_WAIT,
            in_flight: InFlightPages::new(),
        }
    }

    /// Sets the upper bound of a single blocking dequeue
    pub fn with_dequeue_wait(mut self, wait: Duration) -> Self {
        self.dequeue_wait = wait;
        self
    }

    /// Processes a single job to completion
    ///
    /// # Returns
    ///
    /// * `Ok(JobOutcome)` - The job was skipped or the page was finalized
    /// * `Err(GaugeError)` - A storage or queue write failed; the page may be
    ///   left `running` and the job is not retried
    pub async fn process_job(&self, job: CrawlJob) -> Result<JobOutcome, GaugeError> {
        let page_id = job.page_id;

        match self.queue.is_cancelled(page_id).await {
            Ok(false) => {}
            Ok(true) => {
                tracing::debug!("Skipping job for page {}: stop requested", page_id);
                return Ok(JobOutcome::Skipped(SkipReason::Cancelled));
            }
            Err(e) => {
                tracing::warn!(
                    "Skipping job for page {}: cancellation lookup failed: {}",
                    page_id,
                    e
                );
                return Ok(JobOutcome::Skipped(SkipReason::CancellationUnknown));
            }
        }

        let Some(_claim) = self.in_flight.try_claim(page_id) else {
            tracing::debug!("Skipping job for page {}: already in flight", page_id);
            return Ok(JobOutcome::Skipped(SkipReason::Busy));
        };

        let mut page = match self.pages.get(page_id) {
            Ok(Some(page)) => page,
            Ok(None) => {
                tracing::warn!("Skipping job for page {}: page not found", page_id);
                return Ok(JobOutcome::Skipped(SkipReason::MissingPage));
            }
            Err(e) => return Err(log_write_failure(page_id, "load page", e)),
        };

        let previous = page.status;
        if page.transition(LifecycleEvent::Dispatch, None).is_err() {
            tracing::debug!(
                "Skipping stale job for page {}: status is {}",
                page_id,
                previous
            );
            return Ok(JobOutcome::Skipped(SkipReason::Stale(previous)));
        }
        self.pages
            .update(&page)
            .map_err(|e| log_write_failure(page_id, "mark page running", e))?;

        tracing::info!("Crawling page {} ({})", page.id, page.url);
        let cancel = QueueCancellation::new(Arc::clone(&self.queue), page_id);
        let outcome = self.crawler.crawl(&page.url, &cancel).await;

        self.finalize(page, outcome, &cancel).await
    }

    async fn finalize(
        &self,
        mut page: PageRecord,
        outcome: Result<PageAnalysis, CrawlFailure>,
        cancel: &dyn CancelCheck,
    ) -> Result<JobOutcome, GaugeError> {
        let page_id = page.id;

        match outcome {
            Ok(analysis) => {
                page.title = analysis.title.clone();
                page.transition(LifecycleEvent::Succeed, None)?;

                let result = analysis.into_result(page_id);
                let broken = result.broken_link_count();
                self.commit(&page, Some(&result))?;

                tracing::info!(
                    "Page {} done ({} internal, {} external, {} broken links)",
                    page_id,
                    result.internal_links,
                    result.external_links,
                    broken
                );
                Ok(JobOutcome::Done)
            }
            Err(failure) => {
                if failure.is_cancelled() || cancel.is_cancelled().await {
                    let message = failure.to_string();
                    page.transition(LifecycleEvent::Cancel, None)?;
                    self.commit(&page, Some(&CrawlResult::failed(page_id, message)))?;

                    tracing::info!("Page {} stopped during crawl", page_id);
                    return Ok(JobOutcome::Stopped);
                }

                let message = failure.to_string();
                page.transition(LifecycleEvent::Fail, Some(&message))?;
                self.commit(&page, Some(&CrawlResult::failed(page_id, message.clone())))?;

                tracing::warn!("Page {} failed: {}", page_id, message);
                Ok(JobOutcome::Failed(message))
            }
        }
    }

    /// Writes the result (if any) and then the page; the first failure aborts
    fn commit(&self, page: &PageRecord, result: Option<&CrawlResult>) -> Result<(), GaugeError> {
        if let Some(result) = result {
            self.results
                .upsert(result)
                .map_err(|e| log_write_failure(page.id, "store result", e))?;
        }

        self.pages
            .update(page)
            .map_err(|e| log_write_failure(page.id, "update page", e))
    }

    /// Waits up to `wait` for one job and processes it
    ///
    /// Returns `Ok(None)` if no job arrived in time.
    pub async fn dispatch_next(&self, wait: Duration) -> Result<Option<JobOutcome>, GaugeError> {
        match self.queue.dequeue(wait).await? {
            Some(job) => self.process_job(job).await.map(Some),
            None => Ok(None),
        }
    }

    /// Runs the dispatch loop until `shutdown` is cancelled
    ///
    /// A job that arrives after shutdown was requested is put back on the
    /// queue instead of being crawled.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("Dispatch worker started");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let dequeued = tokio::select! {
                _ = shutdown.cancelled() => break,
                dequeued = self.queue.dequeue(self.dequeue_wait) => dequeued,
            };

            let job = match dequeued {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!("Failed to dequeue crawl job: {}", e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(DEQUEUE_ERROR_BACKOFF) => continue,
                    }
                }
            };

            if shutdown.is_cancelled() {
                if let Err(e) = self.queue.enqueue(job.page_id).await {
                    tracing::error!(
                        "Failed to return job for page {} to the queue: {}",
                        job.page_id,
                        e
                    );
                }
                break;
            }

            let page_id = job.page_id;
            match self.process_job(job).await {
                Ok(outcome) => tracing::debug!("Job for page {} finished: {:?}", page_id, outcome),
                Err(e) => tracing::error!("Job for page {} aborted: {}", page_id, e),
            }
        }

        tracing::info!("Dispatch worker stopped");
    }

    /// Returns pages left `running` by an earlier process to the queue
    ///
    /// # Returns
    ///
    /// The number of pages re-enqueued
    pub async fn recover_interrupted(&self) -> Result<usize, GaugeError> {
        let interrupted = self.pages.get_pages_by_status(PageStatus::Running)?;
        let mut recovered = 0;

        for mut page in interrupted {
            if self.in_flight.contains(page.id) {
                continue;
            }

            page.transition(LifecycleEvent::Recover, None)?;
            self.pages.update(&page)?;
            self.queue.enqueue(page.id).await?;
            recovered += 1;
        }

        if recovered > 0 {
            tracing::info!("Re-enqueued {} interrupted page(s)", recovered);
        }
        Ok(recovered)
    }
}

fn log_write_failure(page_id: i64, action: &str, error: StorageError) -> GaugeError {
    tracing::error!("Failed to {} for page {}: {}", action, page_id, error);
    error.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::crawler::HTML_VERSION;
    use crate::queue::SqliteJobQueue;
    use crate::storage::{BrokenLink, HeadingCounts, SqliteStorage};
    use async_trait::async_trait;

    enum Behavior {
        Succeed,
        FailStatus(u16),
        StopDuringFetch,
    }

    struct StubCrawler {
        behavior: Behavior,
        queue: Arc<dyn JobQueue>,
        page_id: i64,
    }

    #[async_trait]
    impl PageCrawler for StubCrawler {
        async fn crawl(
            &self,
            _url: &str,
            cancel: &dyn CancelCheck,
        ) -> Result<PageAnalysis, CrawlFailure> {
            if cancel.is_cancelled().await {
                return Err(CrawlFailure::Cancelled);
            }

            match self.behavior {
                Behavior::Succeed => Ok(PageAnalysis {
                    html_version: HTML_VERSION.to_string(),
                    title: Some("Stub".to_string()),
                    headings: HeadingCounts {
                        h1: 3,
                        ..Default::default()
                    },
                    internal_links: 1,
                    external_links: 1,
                    has_login_form: false,
                    broken_links: vec![BrokenLink {
                        url: "http://localhost:1/".to_string(),
                        status_code: None,
                        error_message: Some("connection refused".to_string()),
                    }],
                }),
                Behavior::FailStatus(status) => Err(CrawlFailure::HttpStatus(status)),
                Behavior::StopDuringFetch => {
                    self.queue.mark_cancelled(self.page_id).await.unwrap();
                    Err(CrawlFailure::Timeout(Duration::from_secs(30)))
                }
            }
        }
    }

    struct Harness {
        storage: Arc<SqliteStorage>,
        queue: Arc<SqliteJobQueue>,
        page_id: i64,
    }

    impl Harness {
        fn new() -> Self {
            let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
            let queue = Arc::new(SqliteJobQueue::new_in_memory(&QueueConfig::default()).unwrap());
            let page_id = storage.create("https://example.com").unwrap().id;
            Self {
                storage,
                queue,
                page_id,
            }
        }

        fn dispatcher(&self, behavior: Behavior) -> Dispatcher {
            let crawler = StubCrawler {
                behavior,
                queue: self.queue.clone(),
                page_id: self.page_id,
            };
            Dispatcher::new(
                self.storage.clone(),
                self.storage.clone(),
                self.queue.clone(),
                Arc::new(crawler),
            )
        }

        fn page(&self) -> PageRecord {
            self.storage.get(self.page_id).unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn test_successful_crawl() {
        let harness = Harness::new();
        let dispatcher = harness.dispatcher(Behavior::Succeed);

        let outcome = dispatcher
            .process_job(CrawlJob::new(harness.page_id))
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Done);

        let page = harness.page();
        assert_eq!(page.status, PageStatus::Done);
        assert_eq!(page.title.as_deref(), Some("Stub"));
        assert_eq!(page.error_message, None);

        let stored = harness.storage.get_by_page(harness.page_id).unwrap().unwrap();
        assert_eq!(stored.result.headings.h1, 3);
        assert_eq!(stored.result.broken_links.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_crawl_records_error() {
        let harness = Harness::new();
        let dispatcher = harness.dispatcher(Behavior::FailStatus(503));

        let outcome = dispatcher
            .process_job(CrawlJob::new(harness.page_id))
            .await
            .unwrap();
        assert!(matches!(outcome, JobOutcome::Failed(ref m) if m.contains("503")));

        let page = harness.page();
        assert_eq!(page.status, PageStatus::Error);
        assert!(page.error_message.unwrap().contains("503"));

        let stored = harness.storage.get_by_page(harness.page_id).unwrap().unwrap();
        assert!(stored.result.error_message.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_cancelled_job_is_skipped() {
        let harness = Harness::new();
        harness.queue.mark_cancelled(harness.page_id).await.unwrap();
        let dispatcher = harness.dispatcher(Behavior::Succeed);

        let outcome = dispatcher
            .process_job(CrawlJob::new(harness.page_id))
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Skipped(SkipReason::Cancelled));
        assert_eq!(harness.page().status, PageStatus::Queued);
    }

    #[tokio::test]
    async fn test_stop_during_fetch_records_result() {
        let harness = Harness::new();
        let dispatcher = harness.dispatcher(Behavior::StopDuringFetch);

        let outcome = dispatcher
            .process_job(CrawlJob::new(harness.page_id))
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Stopped);

        let page = harness.page();
        assert_eq!(page.status, PageStatus::Stopped);
        assert_eq!(page.error_message, None);

        let stored = harness.storage.get_by_page(harness.page_id).unwrap().unwrap();
        assert!(stored.result.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_stop_during_fetch_replaces_previous_result() {
        let harness = Harness::new();
        let earlier = harness
            .storage
            .upsert(&CrawlResult::failed(harness.page_id, "earlier failure"))
            .unwrap();
        harness
            .storage
            .update_status(harness.page_id, PageStatus::Queued, Some("earlier failure"))
            .unwrap();
        let dispatcher = harness.dispatcher(Behavior::StopDuringFetch);

        dispatcher
            .process_job(CrawlJob::new(harness.page_id))
            .await
            .unwrap();

        let stored = harness.storage.get_by_page(harness.page_id).unwrap().unwrap();
        assert_eq!(stored.id, earlier.id);
        assert_ne!(stored.result.error_message.as_deref(), Some("earlier failure"));
        assert_eq!(harness.page().error_message, None);
    }

    #[tokio::test]
    async fn test_missing_page_is_skipped() {
        let harness = Harness::new();
        harness.storage.soft_delete(harness.page_id).unwrap();
        let dispatcher = harness.dispatcher(Behavior::Succeed);

        let outcome = dispatcher
            .process_job(CrawlJob::new(harness.page_id))
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Skipped(SkipReason::MissingPage));
    }

    #[tokio::test]
    async fn test_stale_job_is_skipped() {
        let harness = Harness::new();
        harness
            .storage
            .update_status(harness.page_id, PageStatus::Done, None)
            .unwrap();
        let dispatcher = harness.dispatcher(Behavior::Succeed);

        let outcome = dispatcher
            .process_job(CrawlJob::new(harness.page_id))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Skipped(SkipReason::Stale(PageStatus::Done))
        );
        assert!(harness.storage.get_by_page(harness.page_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dispatch_next() {
        let harness = Harness::new();
        let dispatcher = harness.dispatcher(Behavior::Succeed);

        let idle = dispatcher
            .dispatch_next(Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(idle, None);

        harness.queue.enqueue(harness.page_id).await.unwrap();
        let outcome = dispatcher
            .dispatch_next(Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(outcome, Some(JobOutcome::Done));
    }

    #[tokio::test]
    async fn test_recover_interrupted() {
        let harness = Harness::new();
        harness
            .storage
            .update_status(harness.page_id, PageStatus::Running, None)
            .unwrap();
        let dispatcher = harness.dispatcher(Behavior::Succeed);

        assert_eq!(dispatcher.recover_interrupted().await.unwrap(), 1);
        assert_eq!(harness.page().status, PageStatus::Queued);
        assert_eq!(harness.queue.pending_jobs().await.unwrap(), 1);
    }

    /// Delegates to a real queue and requests shutdown as a job is handed out
    struct ShutdownOnDequeue {
        inner: Arc<SqliteJobQueue>,
        shutdown: CancellationToken,
    }

    #[async_trait]
    impl JobQueue for ShutdownOnDequeue {
        async fn enqueue(&self, page_id: i64) -> crate::queue::QueueResult<()> {
            self.inner.enqueue(page_id).await
        }

        async fn dequeue(&self, wait: Duration) -> crate::queue::QueueResult<Option<CrawlJob>> {
            let job = self.inner.dequeue(wait).await?;
            self.shutdown.cancel();
            Ok(job)
        }

        async fn mark_cancelled(&self, page_id: i64) -> crate::queue::QueueResult<()> {
            self.inner.mark_cancelled(page_id).await
        }

        async fn clear_cancellation(&self, page_id: i64) -> crate::queue::QueueResult<()> {
            self.inner.clear_cancellation(page_id).await
        }

        async fn is_cancelled(&self, page_id: i64) -> crate::queue::QueueResult<bool> {
            self.inner.is_cancelled(page_id).await
        }

        async fn pending_jobs(&self) -> crate::queue::QueueResult<u64> {
            self.inner.pending_jobs().await
        }
    }

    #[tokio::test]
    async fn test_run_returns_job_dequeued_after_shutdown() {
        let harness = Harness::new();
        harness.queue.enqueue(harness.page_id).await.unwrap();

        let shutdown = CancellationToken::new();
        let queue = Arc::new(ShutdownOnDequeue {
            inner: harness.queue.clone(),
            shutdown: shutdown.clone(),
        });
        let crawler = StubCrawler {
            behavior: Behavior::Succeed,
            queue: queue.clone(),
            page_id: harness.page_id,
        };
        let dispatcher = Dispatcher::new(
            harness.storage.clone(),
            harness.storage.clone(),
            queue,
            Arc::new(crawler),
        );

        tokio::time::timeout(Duration::from_secs(1), dispatcher.run(shutdown.clone()))
            .await
            .unwrap();

        assert!(shutdown.is_cancelled());
        assert_eq!(harness.queue.pending_jobs().await.unwrap(), 1);
        assert_eq!(harness.page().status, PageStatus::Queued);
        assert!(harness.storage.get_by_page(harness.page_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_with_cancelled_token_leaves_queue_alone() {
        let harness = Harness::new();
        harness.queue.enqueue(harness.page_id).await.unwrap();
        let dispatcher = harness.dispatcher(Behavior::Succeed);

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), dispatcher.run(shutdown))
            .await
            .unwrap();

        assert_eq!(harness.queue.pending_jobs().await.unwrap(), 1);
        assert_eq!(harness.page().status, PageStatus::Queued);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let harness = Harness::new();
        let dispatcher = harness
            .dispatcher(Behavior::Succeed)
            .with_dequeue_wait(Duration::from_secs(5));
        let shutdown = CancellationToken::new();

        let task = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { dispatcher.run(shutdown).await })
        };

        harness.queue.enqueue(harness.page_id).await.unwrap();
        for _ in 0..100 {
            if harness.page().status == PageStatus::Done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(harness.page().status, PageStatus::Done);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
