//! Configuration module for the crawler
//!
//! This module handles loading, parsing, overriding and validating the TOML
//! configuration. The resulting [`Config`] is immutable and is passed down
//! explicitly to every component.
//!
//! # Example
//!
//! ```no_run
//! use clientside_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod overrides;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, CrawlerConfig, FetcherConfig, LoginStep, OutputConfig, SiteEntry,
    StateEntry,
};

pub use overrides::{apply_env_overrides, apply_overrides};
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{is_valid_label, validate};
