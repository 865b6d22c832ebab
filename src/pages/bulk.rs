//! Per-id outcomes of bulk page operations

use crate::GaugeError;

/// What happened to each id of a bulk operation
///
/// Every id is processed independently; one failure never stops the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub succeeded: Vec<i64>,
    /// Ids left alone on purpose, such as pages that are already running
    pub skipped: Vec<i64>,
    pub failed: Vec<(i64, String)>,
}

impl BulkOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(&mut self, page_id: i64) {
        self.succeeded.push(page_id);
    }

    pub fn skip(&mut self, page_id: i64) {
        self.skipped.push(page_id);
    }

    pub fn fail(&mut self, page_id: i64, reason: impl ToString) {
        self.failed.push((page_id, reason.to_string()));
    }

    /// Folds another outcome into this one
    pub fn merge(&mut self, other: BulkOutcome) {
        self.succeeded.extend(other.succeeded);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }

    /// Fails only when every id failed
    pub fn into_result(self, operation: &'static str) -> Result<Self, GaugeError> {
        if !self.failed.is_empty() && self.failed.len() == self.total() {
            return Err(GaugeError::BatchFailed {
                operation,
                count: self.failed.len(),
            });
        }
        Ok(self)
    }
}
