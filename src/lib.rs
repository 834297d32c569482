//! Clientside-Crawler: a crawler for client-side security research
//!
//! This crate walks a target site from a seed URL, renders every page in an
//! instrumented Chromium, and archives the rendered DOM, the page scripts and
//! the XHR/form traffic observed during rendering so that a downstream
//! analyzer can look for client-side vulnerabilities.

pub mod auth;
pub mod browser;
pub mod config;
pub mod crawler;
pub mod site;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown site id: {site_id}")]
    InvalidSite { site_id: u32 },

    #[error("Browser driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("Authentication error: {0}")]
    Auth(#[from] auth::AuthError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlError {
    /// Returns true for errors that must abort the whole run
    ///
    /// Everything else is handled per URL inside a crawl.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::InvalidSite { .. } | Self::DriverUnavailable(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid value for environment override {name}: {value}")]
    InvalidOverride { name: String, value: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Orchestrator, TerminationReason};
pub use site::{Site, SiteRegistry};
pub use state::{FailureKind, PageOutcome};
pub use url::{canonicalize, registrable_domain, UrlFilter};
