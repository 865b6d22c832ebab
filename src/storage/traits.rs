//! Storage traits and error types
//!
//! This module defines the repository interfaces the crawl engine depends on
//! and the associated error types. The engine only ever sees these traits, so
//! any backend that honors them can stand in for SQLite.

use crate::state::PageStatus;
use crate::storage::{CrawlResult, PageRecord, StoredCrawlResult};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Page not found: {0}")]
    PageNotFound(i64),

    #[error("Storage connection lock poisoned")]
    LockPoisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable store of pages keyed by normalized URL
///
/// Soft-deleted pages are invisible to every lookup except
/// `get_soft_deleted_by_url`. Implementations must be safe to share between
/// dispatch workers.
pub trait PageRepository: Send + Sync {
    // ===== Page Lifecycle =====

    /// Creates a new page in the `queued` status
    ///
    /// # Arguments
    ///
    /// * `url` - The normalized URL
    ///
    /// # Returns
    ///
    /// The created page, or `ConstraintViolation` if a page (active or
    /// soft-deleted) already owns the URL
    fn create(&self, url: &str) -> StorageResult<PageRecord>;

    /// Gets an active page by ID
    fn get(&self, page_id: i64) -> StorageResult<Option<PageRecord>>;

    /// Gets the active pages among the given IDs, in ID order
    fn get_many(&self, page_ids: &[i64]) -> StorageResult<Vec<PageRecord>>;

    /// Gets the active page registered for a normalized URL
    fn get_by_normalized_url(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Gets the soft-deleted page registered for a normalized URL
    fn get_soft_deleted_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Writes title, status and error message of a page
    fn update(&self, page: &PageRecord) -> StorageResult<()>;

    /// Sets the status and error message of a page
    fn update_status(
        &self,
        page_id: i64,
        status: PageStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Marks a page as deleted without removing its row
    fn soft_delete(&self, page_id: i64) -> StorageResult<()>;

    /// Brings a soft-deleted page back and returns it
    fn restore(&self, page_id: i64) -> StorageResult<PageRecord>;

    // ===== Queries =====

    /// Gets all active pages in a given status
    fn get_pages_by_status(&self, status: PageStatus) -> StorageResult<Vec<PageRecord>>;

    /// Counts active pages in a given status
    fn count_pages_by_status(&self, status: PageStatus) -> StorageResult<u64>;

    /// Counts all active pages
    fn count_total_pages(&self) -> StorageResult<u64>;
}

/// Store of the latest analysis result per page
pub trait ResultRepository: Send + Sync {
    /// Inserts or replaces the page's result together with its broken links
    ///
    /// The result row and its broken-link list are written in a single
    /// transaction; the previous broken links are removed.
    fn upsert(&self, result: &CrawlResult) -> StorageResult<StoredCrawlResult>;

    /// Gets the stored result of a page
    fn get_by_page(&self, page_id: i64) -> StorageResult<Option<StoredCrawlResult>>;

    /// Counts broken links recorded across all results
    fn count_broken_links(&self) -> StorageResult<u64>;
}
