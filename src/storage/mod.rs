//! Storage module for persisting crawl artifacts
//!
//! This module owns the on-disk layout rooted at `<output>/<site_id>/`:
//! - one directory per visited URL, named by the SHA-256 of its canonical form
//! - `urls`, the visited URL list
//! - `navigation_graph`, the discovered edges
//! - `crawl_<label>.json`, the run manifest
//!
//! Every file is written to `<name>.tmp` and renamed into place.

mod beautify;
mod fs;
mod traits;

pub use beautify::{beautify_js, format_script};
pub use fs::FsArtifactStore;
pub use traits::{ArtifactStore, StorageError, StorageResult};

use crate::browser::{ConsoleRecord, EventBundle, RequestSummary};
use crate::state::PageOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Where a saved script came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Body of an inline `<script>` element
    Inline,
    /// `<script src>` fetched separately
    External(String),
}

impl ScriptSource {
    /// Value recorded in `scripts/mappings.json`
    pub fn mapping(&self) -> &str {
        match self {
            Self::Inline => "internal_script",
            Self::External(url) => url,
        }
    }
}

/// One script of a page, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptArtifact {
    pub source: ScriptSource,
    pub body: String,
}

/// Everything archived for one URL
#[derive(Debug, Clone)]
pub struct PageArtifact {
    /// Canonical URL; keys the artifact directory
    pub url: String,
    pub final_url: String,
    pub depth: u32,
    pub parent: Option<String>,
    /// Hex SHA-256 of `html`
    pub content_hash: String,
    /// Rendered DOM
    pub html: String,
    /// Body returned by the reachability probe
    pub html_initial: Option<String>,
    pub scripts: Vec<ScriptArtifact>,
    pub events: EventBundle,
    pub console: Vec<ConsoleRecord>,
    pub requests: Vec<RequestSummary>,
    pub cookies: Vec<serde_json::Value>,
    /// `document.<form>` and `document.<form>.<field>` names
    pub document_props: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// `artifact.json`: metadata of one page artifact
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactMeta<'a> {
    pub url: &'a str,
    pub final_url: &'a str,
    pub depth: u32,
    pub parent: Option<&'a str>,
    pub content_hash: &'a str,
    pub timestamp: DateTime<Utc>,
    pub scripts: usize,
    pub without_data: usize,
    pub with_data: usize,
    pub succ: usize,
    pub console_entries: usize,
}

impl<'a> From<&'a PageArtifact> for ArtifactMeta<'a> {
    fn from(page: &'a PageArtifact) -> Self {
        Self {
            url: &page.url,
            final_url: &page.final_url,
            depth: page.depth,
            parent: page.parent.as_deref(),
            content_hash: &page.content_hash,
            timestamp: page.timestamp,
            scripts: page.scripts.len(),
            without_data: page.events.without_data.len(),
            with_data: page.events.with_data.len(),
            succ: page.events.succ.len(),
            console_entries: page.console.len(),
        }
    }
}

/// One visited URL in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub url: String,
    pub depth: u32,
    pub parent: Option<String>,
    pub outcome: PageOutcome,
}

/// `crawl_<label>.json`: summary of one crawl run
#[derive(Debug, Clone, Serialize)]
pub struct CrawlManifest {
    pub site_id: u32,
    pub site_name: String,
    pub label: String,
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub termination: String,
    pub outcomes: BTreeMap<String, usize>,
    pub edges: usize,
    pub session_rebuilds: u32,
    pub pages: Vec<ManifestEntry>,
}
