//! URL handling module for Sitegauge
//!
//! This module provides page identity normalization and host comparison used
//! to classify outbound links.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{extract_host, is_internal_link};
pub use normalize::normalize_page_url;
