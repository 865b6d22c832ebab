//! Page lifecycle transitions
//!
//! `queued -> running -> {done, error, stopped}`. None of the settled states
//! is terminal: each can be queued again by start, recrawl or restore.

use crate::state::PageStatus;

/// Events that move a page between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Page was added, restored, started or recrawled
    Enqueue,

    /// The dispatch worker picked up the page's job
    Dispatch,

    /// The crawl completed and its result is about to be committed
    Succeed,

    /// The crawl failed for a reason other than cancellation
    Fail,

    /// The crawl noticed an operator stop while in flight
    Cancel,

    /// An operator stopped the page
    Stop,

    /// A worker found the page stuck in `running` after a restart
    Recover,
}

/// What happens to the page's last error message on a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorEffect {
    /// Leave the stored message as it is
    Keep,
    /// Remove any stored message
    Clear,
    /// Store the failure message of the crawl
    Set,
}

impl LifecycleEvent {
    /// Returns the status this event leads to from `from`, or None if the
    /// transition is illegal
    pub fn apply(self, from: PageStatus) -> Option<PageStatus> {
        use PageStatus::*;

        match (self, from) {
            (Self::Enqueue, Running) => None,
            (Self::Enqueue, _) => Some(Queued),
            (Self::Dispatch, Queued) => Some(Running),
            (Self::Succeed, Running) => Some(Done),
            (Self::Fail, Running) => Some(Error),
            (Self::Cancel, Running) => Some(Stopped),
            (Self::Stop, _) => Some(Stopped),
            (Self::Recover, Running) => Some(Queued),
            _ => None,
        }
    }

    /// Returns how the event treats the page's error message
    pub fn error_effect(self) -> ErrorEffect {
        match self {
            Self::Fail => ErrorEffect::Set,
            Self::Succeed | Self::Cancel | Self::Stop => ErrorEffect::Clear,
            Self::Enqueue | Self::Dispatch | Self::Recover => ErrorEffect::Keep,
        }
    }
}
