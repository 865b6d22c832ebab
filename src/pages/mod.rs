//! Page operations exposed to callers
//!
//! `PageService` is the entry point for registering pages and steering their
//! crawls: add, start, stop, recrawl, delete and show.

mod bulk;
mod service;

pub use bulk::BulkOutcome;
pub use service::{AddDisposition, AddOutcome, PageService};
