//! Storage module for persisting pages and crawl results
//!
//! This module handles all database operations for Sitegauge, including:
//! - SQLite database initialization and schema management
//! - Page records with soft-delete and restore
//! - One analysis result per page with its broken-link list

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{PageRepository, ResultRepository, StorageError, StorageResult};

use crate::state::{ErrorEffect, LifecycleEvent, PageStatus};
use crate::GaugeError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(GaugeError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, GaugeError> {
    SqliteStorage::new(path)
}

/// Represents a registered page in the database
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub status: PageStatus,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PageRecord {
    /// Applies a lifecycle event to the in-memory record
    ///
    /// `message` is only stored for events that set an error. The record is
    /// left unchanged when the transition is illegal.
    pub fn transition(
        &mut self,
        event: LifecycleEvent,
        message: Option<&str>,
    ) -> Result<(), GaugeError> {
        let next = event
            .apply(self.status)
            .ok_or(GaugeError::InvalidTransition {
                page_id: self.id,
                from: self.status,
                event,
            })?;

        self.status = next;
        match event.error_effect() {
            ErrorEffect::Keep => {}
            ErrorEffect::Clear => self.error_message = None,
            ErrorEffect::Set => self.error_message = message.map(str::to_string),
        }
        Ok(())
    }
}

/// Number of elements found for each heading level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadingCounts {
    pub h1: u32,
    pub h2: u32,
    pub h3: u32,
    pub h4: u32,
    pub h5: u32,
    pub h6: u32,
}

impl HeadingCounts {
    /// Returns the count for a heading level (1-6)
    pub fn level(&self, level: u8) -> u32 {
        match level {
            1 => self.h1,
            2 => self.h2,
            3 => self.h3,
            4 => self.h4,
            5 => self.h5,
            6 => self.h6,
            _ => 0,
        }
    }

    pub fn total(&self) -> u32 {
        self.h1 + self.h2 + self.h3 + self.h4 + self.h5 + self.h6
    }
}

/// An outbound link that failed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenLink {
    pub url: String,
    /// HTTP status of the last response, absent on transport failure
    pub status_code: Option<u16>,
    /// Transport error text, absent when a response arrived
    pub error_message: Option<String>,
}

/// The analysis outcome of a page's latest completed crawl
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlResult {
    pub page_id: i64,
    pub html_version: String,
    pub title: Option<String>,
    pub headings: HeadingCounts,
    pub internal_links: u32,
    pub external_links: u32,
    pub has_login_form: bool,
    pub error_message: Option<String>,
    pub broken_links: Vec<BrokenLink>,
}

impl CrawlResult {
    /// Builds the result committed for a crawl that failed
    pub fn failed(page_id: i64, message: impl Into<String>) -> Self {
        Self {
            page_id,
            html_version: String::new(),
            title: None,
            headings: HeadingCounts::default(),
            internal_links: 0,
            external_links: 0,
            has_login_form: false,
            error_message: Some(message.into()),
            broken_links: Vec::new(),
        }
    }

    pub fn broken_link_count(&self) -> usize {
        self.broken_links.len()
    }
}

/// A crawl result as it is stored, with its row metadata
#[derive(Debug, Clone)]
pub struct StoredCrawlResult {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub result: CrawlResult,
}
