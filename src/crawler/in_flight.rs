//! Per-process registry of pages being crawled

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Set of page IDs with a crawl in progress, shared by all workers
#[derive(Debug, Clone, Default)]
pub struct InFlightPages {
    pages: Arc<Mutex<HashSet<i64>>>,
}

impl InFlightPages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a page for crawling
    ///
    /// Returns None if another worker holds it. The claim is released when
    /// the returned guard is dropped.
    pub fn try_claim(&self, page_id: i64) -> Option<InFlightGuard> {
        let mut pages = lock_pages(&self.pages);
        if !pages.insert(page_id) {
            return None;
        }

        Some(InFlightGuard {
            pages: Arc::clone(&self.pages),
            page_id,
        })
    }

    pub fn contains(&self, page_id: i64) -> bool {
        lock_pages(&self.pages).contains(&page_id)
    }
}

/// Locks the registry, recovering it if a worker panicked while holding it
///
/// Every critical section is a single insert, remove or lookup, so the set is
/// never left half-updated.
fn lock_pages(pages: &Mutex<HashSet<i64>>) -> MutexGuard<'_, HashSet<i64>> {
    pages.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
        tracing::warn!("In-flight page registry lock was poisoned; recovering");
        poisoned.into_inner()
    })
}

/// Releases a page claim on drop
#[derive(Debug)]
pub struct InFlightGuard {
    pages: Arc<Mutex<HashSet<i64>>>,
    page_id: i64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock_pages(&self.pages).remove(&self.page_id);
    }
}
