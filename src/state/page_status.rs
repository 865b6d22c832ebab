/// Page lifecycle status definitions
///
/// This module defines every status a page can be in between registration and
/// the end of its latest crawl.
use std::fmt;

/// Represents the current lifecycle status of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStatus {
    // ===== Active States =====
    /// Page is waiting for the dispatch worker
    Queued,

    /// Page is being crawled right now
    Running,

    // ===== Settled States =====
    /// Last crawl completed and its result was committed
    Done,

    /// Last crawl failed; the page carries the failure message
    Error,

    /// An operator stopped the page
    Stopped,
}

impl PageStatus {
    /// Returns true while the page has work pending or in flight
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Returns all possible page statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Queued,
            Self::Running,
            Self::Done,
            Self::Error,
            Self::Stopped,
        ]
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
