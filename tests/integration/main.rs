//! Integration tests for Sitegauge
//!
//! These tests use wiremock to create mock HTTP servers and drive the crawl
//! pipeline and the dispatch loop end-to-end against in-memory storage.

mod common;
mod dispatch_tests;
mod pipeline_tests;
