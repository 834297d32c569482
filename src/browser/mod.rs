//! Browser module
//!
//! This module drives the instrumented browser used to render pages.
//!
//! # Components
//!
//! - `Driver` / `DriverFactory`: the seam between the crawler and a browser
//! - `ChromiumDriverFactory`: Chromium over the DevTools protocol, with the
//!   request-capture and event-logger extensions installed
//! - `VirtualDisplay`: Xvfb wrapper for non-headless runs on Linux
//! - `BrowserSession`: load / harvest / reset / rebuild on top of a driver
//! - `decoder`: turns marker nodes and console lines into typed events

mod chromium;
pub mod decoder;
mod display;
mod driver;
mod session;

use thiserror::Error;

pub use chromium::{ChromiumDriver, ChromiumDriverFactory, EXTENSIONS};
pub use decoder::{
    decode_console, decode_markers, summarize_requests, ConsoleRecord, EventBundle, EventKind,
    EventPayload, MarkerSnapshot, RequestSummary,
};
pub use display::VirtualDisplay;
pub use driver::{ConsoleEntry, Driver, DriverFactory};
pub use session::{BrowserSession, HarvestSnapshot, SessionTimings};

/// Browser and driver errors
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {cause}")]
    Navigation { url: String, cause: String },

    #[error("Navigation to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("No element matches selector '{0}'")]
    ElementNotFound(String),

    #[error("DevTools protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Virtual display error: {0}")]
    Display(String),

    #[error("Browser session is closed")]
    Closed,
}
