use crate::pages::BulkOutcome;
use crate::queue::JobQueue;
use crate::state::{LifecycleEvent, PageStatus};
use crate::storage::{PageRecord, PageRepository, StorageError};
use crate::url::normalize_page_url;
use crate::GaugeError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// How `add_url` satisfied the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddDisposition {
    /// A new page was created and queued
    Created,
    /// An active page already owned the URL; nothing changed
    Existing,
    /// A soft-deleted page was brought back and queued
    Restored,
}

#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub page: PageRecord,
    pub disposition: AddDisposition,
}

impl AddOutcome {
    pub fn is_new(&self) -> bool {
        self.disposition == AddDisposition::Created
    }

    pub fn message(&self) -> &'static str {
        match self.disposition {
            AddDisposition::Created => "URL added and queued for crawling",
            AddDisposition::Existing => "URL already exists",
            AddDisposition::Restored => "URL restored and queued for crawling",
        }
    }
}

/// Registers pages and steers their crawls
pub struct PageService {
    pages: Arc<dyn PageRepository>,
    queue: Arc<dyn JobQueue>,
}

impl PageService {
    pub fn new(pages: Arc<dyn PageRepository>, queue: Arc<dyn JobQueue>) -> Self {
        Self { pages, queue }
    }

    /// Registers a URL for analysis
    ///
    /// The URL is normalized first. An active page with the same identity is
    /// returned untouched; a soft-deleted one is restored and queued;
    /// otherwise a new page is created and queued.
    ///
    /// # Errors
    ///
    /// * `GaugeError::UrlError` - The URL is not an absolute http(s) URL
    /// * `GaugeError::Queue` - The crawl job could not be enqueued; the page
    ///   is left in `error`
    pub async fn add_url(&self, raw_url: &str) -> Result<AddOutcome, GaugeError> {
        let url = normalize_page_url(raw_url)?;

        if let Some(page) = self.pages.get_by_normalized_url(&url)? {
            tracing::debug!("Page {} already registered for {}", page.id, url);
            return Ok(AddOutcome {
                page,
                disposition: AddDisposition::Existing,
            });
        }

        let (mut page, disposition) = match self.pages.get_soft_deleted_by_url(&url)? {
            Some(deleted) => {
                let mut page = self.pages.restore(deleted.id)?;
                // A page deleted mid-crawl comes back as running
                let event = if page.status == PageStatus::Running {
                    LifecycleEvent::Recover
                } else {
                    LifecycleEvent::Enqueue
                };
                page.transition(event, None)?;
                self.pages.update(&page)?;
                (page, AddDisposition::Restored)
            }
            None => (self.pages.create(&url)?, AddDisposition::Created),
        };

        if let Err(e) = self.queue.enqueue(page.id).await {
            tracing::error!("Failed to enqueue page {}: {}", page.id, e);
            let message = e.to_string();
            self.pages
                .update_status(page.id, PageStatus::Error, Some(&message))?;
            return Err(e.into());
        }

        if let Some(reloaded) = self.pages.get(page.id)? {
            page = reloaded;
        }

        tracing::info!("Queued page {} ({}) [{:?}]", page.id, page.url, disposition);
        Ok(AddOutcome { page, disposition })
    }

    /// Queues pages for crawling
    ///
    /// Pages that are already running are skipped. Ids that do not name an
    /// active page are reported as failed. Repeated ids are handled once.
    pub async fn start(&self, page_ids: &[i64]) -> Result<BulkOutcome, GaugeError> {
        let mut by_id: HashMap<i64, PageRecord> = self
            .pages
            .get_many(page_ids)?
            .into_iter()
            .map(|page| (page.id, page))
            .collect();

        let mut outcome = BulkOutcome::new();
        let mut seen = HashSet::with_capacity(page_ids.len());
        for &page_id in page_ids {
            if !seen.insert(page_id) {
                continue;
            }

            let Some(mut page) = by_id.remove(&page_id) else {
                outcome.fail(page_id, StorageError::PageNotFound(page_id));
                continue;
            };

            if page.transition(LifecycleEvent::Enqueue, None).is_err() {
                tracing::debug!("Page {} is already running, not queued again", page_id);
                outcome.skip(page_id);
                continue;
            }

            if let Err(e) = self.pages.update(&page) {
                outcome.fail(page_id, e);
                continue;
            }

            match self.queue.enqueue(page_id).await {
                Ok(()) => outcome.succeed(page_id),
                Err(e) => {
                    tracing::error!("Failed to enqueue page {}: {}", page_id, e);
                    let message = e.to_string();
                    if let Err(update_err) =
                        self.pages
                            .update_status(page_id, PageStatus::Error, Some(&message))
                    {
                        tracing::error!("Failed to mark page {} as error: {}", page_id, update_err);
                    }
                    outcome.fail(page_id, message);
                }
            }
        }

        tracing::info!(
            "Start: {} queued, {} skipped, {} failed",
            outcome.succeeded.len(),
            outcome.skipped.len(),
            outcome.failed.len()
        );
        outcome.into_result("start")
    }

    /// Stops pages: sets a cancellation mark and forces them to `stopped`
    ///
    /// A crawl already in flight notices the mark at its next check.
    pub async fn stop(&self, page_ids: &[i64]) -> Result<BulkOutcome, GaugeError> {
        let mut outcome = BulkOutcome::new();

        for &page_id in page_ids {
            match self.stop_one(page_id).await {
                Ok(()) => outcome.succeed(page_id),
                Err(e) => {
                    tracing::warn!("Failed to stop page {}: {}", page_id, e);
                    outcome.fail(page_id, e);
                }
            }
        }

        outcome.into_result("stop")
    }

    async fn stop_one(&self, page_id: i64) -> Result<(), GaugeError> {
        let mut page = self
            .pages
            .get(page_id)?
            .ok_or(StorageError::PageNotFound(page_id))?;

        self.queue.mark_cancelled(page_id).await?;
        page.transition(LifecycleEvent::Stop, None)?;
        self.pages.update(&page)?;

        tracing::info!("Stopped page {}", page_id);
        Ok(())
    }

    /// Clears cancellation marks, then starts the pages again
    pub async fn recrawl(&self, page_ids: &[i64]) -> Result<BulkOutcome, GaugeError> {
        let mut outcome = BulkOutcome::new();
        let mut cleared = Vec::with_capacity(page_ids.len());

        for &page_id in page_ids {
            match self.queue.clear_cancellation(page_id).await {
                Ok(()) => cleared.push(page_id),
                Err(e) => {
                    tracing::warn!("Failed to clear cancellation for page {}: {}", page_id, e);
                    outcome.fail(page_id, e);
                }
            }
        }

        if !cleared.is_empty() {
            match self.start(&cleared).await {
                Ok(started) => outcome.merge(started),
                Err(GaugeError::BatchFailed { .. }) => {
                    for page_id in cleared {
                        outcome.fail(page_id, "start failed");
                    }
                }
                Err(e) => return Err(e),
            }
        }

        outcome.into_result("recrawl")
    }

    /// Soft-deletes pages; their URLs can be restored by adding them again
    pub async fn delete(&self, page_ids: &[i64]) -> Result<BulkOutcome, GaugeError> {
        let mut outcome = BulkOutcome::new();

        for &page_id in page_ids {
            match self.pages.soft_delete(page_id) {
                Ok(()) => outcome.succeed(page_id),
                Err(e) => {
                    tracing::warn!("Failed to delete page {}: {}", page_id, e);
                    outcome.fail(page_id, e);
                }
            }
        }

        tracing::info!("Deleted {} page(s)", outcome.succeeded.len());
        outcome.into_result("delete")
    }

    /// Gets an active page by ID
    pub fn get_page(&self, page_id: i64) -> Result<Option<PageRecord>, GaugeError> {
        Ok(self.pages.get(page_id)?)
    }
}
