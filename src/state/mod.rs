//! State module for tracking page lifecycles
//!
//! # Components
//!
//! - `PageStatus`: the lifecycle status stored on every page
//! - `LifecycleEvent`: the events that move a page between statuses, and
//!   which of them are legal from where

mod lifecycle;
mod page_status;

// Re-export main types
pub use lifecycle::{ErrorEffect, LifecycleEvent};
pub use page_status::PageStatus;
