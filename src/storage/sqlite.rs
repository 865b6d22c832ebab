//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the page and result
//! repositories. The connection sits behind a mutex so one storage handle can
//! be shared by every dispatch worker; the lock is never held across an await.

use crate::state::PageStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{PageRepository, ResultRepository, StorageError, StorageResult};
use crate::storage::{BrokenLink, CrawlResult, HeadingCounts, PageRecord, StoredCrawlResult};
use crate::GaugeError;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const PAGE_COLUMNS: &str = "id, url, title, status, error_message, created_at, updated_at";

const RESULT_COLUMNS: &str = "id, page_id, html_version, title, h1_count, h2_count, h3_count, \
     h4_count, h5_count, h6_count, internal_links, external_links, has_login_form, \
     error_message, created_at, updated_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(GaugeError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, GaugeError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, GaugeError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn find_page(
        &self,
        condition: &str,
        param: &dyn rusqlite::ToSql,
    ) -> StorageResult<Option<PageRecord>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM pages WHERE {}", PAGE_COLUMNS, condition);
        let page = conn.query_row(&sql, [param], page_from_row).optional()?;
        Ok(page)
    }
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    let status_str: String = row.get(3)?;
    let status = PageStatus::from_db_string(&status_str)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(3, "status".to_string(), Type::Text))?;

    Ok(PageRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        status,
        error_message: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<StoredCrawlResult> {
    Ok(StoredCrawlResult {
        id: row.get(0)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        result: CrawlResult {
            page_id: row.get(1)?,
            html_version: row.get(2)?,
            title: row.get(3)?,
            headings: HeadingCounts {
                h1: row.get(4)?,
                h2: row.get(5)?,
                h3: row.get(6)?,
                h4: row.get(7)?,
                h5: row.get(8)?,
                h6: row.get(9)?,
            },
            internal_links: row.get(10)?,
            external_links: row.get(11)?,
            has_login_form: row.get(12)?,
            error_message: row.get(13)?,
            broken_links: Vec::new(),
        },
    })
}

fn load_broken_links(conn: &Connection, result_id: i64) -> StorageResult<Vec<BrokenLink>> {
    let mut stmt = conn.prepare(
        "SELECT url, status_code, error_message FROM broken_links WHERE result_id = ?1 ORDER BY id",
    )?;

    let links = stmt
        .query_map(params![result_id], |row| {
            Ok(BrokenLink {
                url: row.get(0)?,
                status_code: row.get(1)?,
                error_message: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(links)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl PageRepository for SqliteStorage {
    // ===== Page Lifecycle =====

    fn create(&self, url: &str) -> StorageResult<PageRecord> {
        let now = Utc::now().to_rfc3339();
        let page_id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO pages (url, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![url, PageStatus::Queued.to_db_string(), now],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StorageError::ConstraintViolation(format!("URL already registered: {}", url))
                } else {
                    StorageError::Sqlite(e)
                }
            })?;
            conn.last_insert_rowid()
        };

        Ok(PageRecord {
            id: page_id,
            url: url.to_string(),
            title: None,
            status: PageStatus::Queued,
            error_message: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    fn get(&self, page_id: i64) -> StorageResult<Option<PageRecord>> {
        self.find_page("id = ?1 AND deleted_at IS NULL", &page_id)
    }

    fn get_many(&self, page_ids: &[i64]) -> StorageResult<Vec<PageRecord>> {
        if page_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; page_ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM pages WHERE id IN ({}) AND deleted_at IS NULL ORDER BY id",
            PAGE_COLUMNS, placeholders
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let pages = stmt
            .query_map(params_from_iter(page_ids.iter()), page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages)
    }

    fn get_by_normalized_url(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        self.find_page("url = ?1 AND deleted_at IS NULL", &url)
    }

    fn get_soft_deleted_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        self.find_page("url = ?1 AND deleted_at IS NOT NULL", &url)
    }

    fn update(&self, page: &PageRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE pages SET title = ?1, status = ?2, error_message = ?3, updated_at = ?4
             WHERE id = ?5 AND deleted_at IS NULL",
            params![
                page.title,
                page.status.to_db_string(),
                page.error_message,
                now,
                page.id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::PageNotFound(page.id));
        }
        Ok(())
    }

    fn update_status(
        &self,
        page_id: i64,
        status: PageStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE pages SET status = ?1, error_message = ?2, updated_at = ?3
             WHERE id = ?4 AND deleted_at IS NULL",
            params![status.to_db_string(), error_message, now, page_id],
        )?;

        if updated == 0 {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }

    fn soft_delete(&self, page_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE pages SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![now, page_id],
        )?;

        if updated == 0 {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }

    fn restore(&self, page_id: i64) -> StorageResult<PageRecord> {
        let now = Utc::now().to_rfc3339();
        {
            let conn = self.conn()?;
            let updated = conn.execute(
                "UPDATE pages SET deleted_at = NULL, updated_at = ?1
                 WHERE id = ?2 AND deleted_at IS NOT NULL",
                params![now, page_id],
            )?;

            if updated == 0 {
                return Err(StorageError::PageNotFound(page_id));
            }
        }

        self.get(page_id)?
            .ok_or(StorageError::PageNotFound(page_id))
    }

    // ===== Queries =====

    fn get_pages_by_status(&self, status: PageStatus) -> StorageResult<Vec<PageRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM pages WHERE status = ?1 AND deleted_at IS NULL ORDER BY id",
            PAGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let pages = stmt
            .query_map(params![status.to_db_string()], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages)
    }

    fn count_pages_by_status(&self, status: PageStatus) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE status = ?1 AND deleted_at IS NULL",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total_pages(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl ResultRepository for SqliteStorage {
    fn upsert(&self, result: &CrawlResult) -> StorageResult<StoredCrawlResult> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, created_at FROM crawl_results WHERE page_id = ?1",
                params![result.page_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let h = &result.headings;
        let (result_id, created_at) = match existing {
            Some((result_id, created_at)) => {
                tx.execute(
                    "UPDATE crawl_results SET html_version = ?1, title = ?2,
                        h1_count = ?3, h2_count = ?4, h3_count = ?5,
                        h4_count = ?6, h5_count = ?7, h6_count = ?8,
                        internal_links = ?9, external_links = ?10, has_login_form = ?11,
                        error_message = ?12, updated_at = ?13
                     WHERE id = ?14",
                    params![
                        result.html_version,
                        result.title,
                        h.h1,
                        h.h2,
                        h.h3,
                        h.h4,
                        h.h5,
                        h.h6,
                        result.internal_links,
                        result.external_links,
                        result.has_login_form,
                        result.error_message,
                        now,
                        result_id
                    ],
                )?;
                tx.execute(
                    "DELETE FROM broken_links WHERE result_id = ?1",
                    params![result_id],
                )?;
                (result_id, created_at)
            }
            None => {
                tx.execute(
                    "INSERT INTO crawl_results (page_id, html_version, title,
                        h1_count, h2_count, h3_count, h4_count, h5_count, h6_count,
                        internal_links, external_links, has_login_form, error_message,
                        created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
                    params![
                        result.page_id,
                        result.html_version,
                        result.title,
                        h.h1,
                        h.h2,
                        h.h3,
                        h.h4,
                        h.h5,
                        h.h6,
                        result.internal_links,
                        result.external_links,
                        result.has_login_form,
                        result.error_message,
                        now
                    ],
                )?;
                (tx.last_insert_rowid(), now.clone())
            }
        };

        {
            let mut stmt = tx.prepare(
                "INSERT INTO broken_links (result_id, url, status_code, error_message)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for link in &result.broken_links {
                stmt.execute(params![
                    result_id,
                    link.url,
                    link.status_code,
                    link.error_message
                ])?;
            }
        }

        tx.commit()?;

        Ok(StoredCrawlResult {
            id: result_id,
            created_at,
            updated_at: now,
            result: result.clone(),
        })
    }

    fn get_by_page(&self, page_id: i64) -> StorageResult<Option<StoredCrawlResult>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM crawl_results WHERE page_id = ?1",
            RESULT_COLUMNS
        );

        let stored = conn
            .query_row(&sql, params![page_id], result_from_row)
            .optional()?;

        match stored {
            Some(mut stored) => {
                stored.result.broken_links = load_broken_links(&conn, stored.id)?;
                Ok(Some(stored))
            }
            None => Ok(None),
        }
    }

    fn count_broken_links(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM broken_links", [], |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }
}
