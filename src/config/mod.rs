//! Configuration module for Sitegauge
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section has defaults, so an empty file is a valid configuration.
//!
//! # Example
//!
//! ```no_run
//! use sitegauge::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitegauge.toml")).unwrap();
//! println!("Page fetch timeout: {}s", config.crawler.fetch_timeout_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, QueueConfig, StorageConfig, UserAgentConfig, WorkerConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
