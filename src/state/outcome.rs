/// Outcome definitions for visited URLs
///
/// Every URL the frontier hands out ends in exactly one of these outcomes,
/// which is recorded in the crawl manifest.
use serde::Serialize;
use std::fmt;

/// What happened to a visited URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOutcome {
    // ===== Terminal Success States =====
    /// Page was rendered, harvested and written to the artifact store
    Archived,

    // ===== Terminal Skip States =====
    /// Probe returned a non-HTML content type; never rendered
    NotHtml,

    /// Probe returned 404 or 410
    NotFound,

    /// Probe failed at the transport level (DNS, TLS, timeout, redirects)
    Unreachable,

    // ===== Terminal Error States =====
    /// Rendering failed and session recovery did not help
    LoadFailed,

    /// Artifacts could not be written
    PersistFailed,
}

impl PageOutcome {
    /// Returns true if the page's artifacts were written
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Archived)
    }

    /// Returns true if the page was filtered by the probe and never rendered
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::NotHtml | Self::NotFound | Self::Unreachable)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::LoadFailed | Self::PersistFailed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Archived => "archived",
            Self::NotHtml => "not_html",
            Self::NotFound => "not_found",
            Self::Unreachable => "unreachable",
            Self::LoadFailed => "load_failed",
            Self::PersistFailed => "persist_failed",
        }
    }

    /// Returns all possible outcomes
    pub fn all() -> [Self; 6] {
        [
            Self::Archived,
            Self::NotHtml,
            Self::NotFound,
            Self::Unreachable,
            Self::LoadFailed,
            Self::PersistFailed,
        ]
    }
}

impl fmt::Display for PageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
