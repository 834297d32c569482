use crate::browser::BrowserError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One line of the browser console, as received
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleEntry {
    pub timestamp: DateTime<Utc>,
    /// `log`, `info`, `warning`, `error`, `debug`, ...
    pub level: String,
    /// `console-api` for page/extension `console.*` calls, otherwise the
    /// browser log source (`network`, `security`, `javascript`, ...)
    pub source: String,
    pub text: String,
}

/// A handle on one running browser
///
/// Implementations own a single tab. Every method may fail if the browser
/// crashed or disconnected; callers treat such failures as a broken session.
#[async_trait]
pub trait Driver: Send {
    /// Navigates the tab and waits for the load event
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&mut self) -> Result<String, BrowserError>;

    /// Serializes the live DOM (post-script), not the network response
    async fn rendered_html(&mut self) -> Result<String, BrowserError>;

    /// Returns the inner HTML of every element bearing `class`, in document order
    async fn marker_payloads(&mut self, class: &str) -> Result<Vec<String>, BrowserError>;

    /// Drains the console lines received since the previous call
    async fn console_entries(&mut self) -> Result<Vec<ConsoleEntry>, BrowserError>;

    async fn cookies(&mut self) -> Result<Vec<serde_json::Value>, BrowserError>;

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError>;

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;

    /// Discards cookies and web storage
    async fn clear_state(&mut self) -> Result<(), BrowserError>;

    /// Shuts the browser down; the driver is unusable afterwards
    async fn quit(&mut self) -> Result<(), BrowserError>;
}

/// Builds fresh drivers, for the first session and for every rebuild
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Driver>, BrowserError>;
}
