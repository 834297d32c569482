//! Storage traits and error types
//!
//! This module defines the trait interface for artifact stores and the
//! associated error types.

use crate::crawler::NavigationEdge;
use crate::storage::{CrawlManifest, PageArtifact};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid artifact name: {0}")]
    InvalidName(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for artifact store implementations
///
/// A store owns every path under one site's output root; callers never
/// touch those files directly.
pub trait ArtifactStore: Send {
    // ===== Per-URL Artifacts =====

    /// Writes (or atomically replaces) the artifact directory of one URL
    ///
    /// # Returns
    ///
    /// The directory the artifact was written to
    fn write_page(&mut self, artifact: &PageArtifact) -> StorageResult<PathBuf>;

    /// Returns the directory that holds (or would hold) `url`'s artifact
    fn page_dir(&self, url: &str) -> PathBuf;

    // ===== Crawl-Level Artifacts =====

    /// Writes the newline-separated list of discovered URLs
    fn write_urls(&mut self, urls: &[String]) -> StorageResult<()>;

    /// Writes the navigation graph as `src\tdst\tdepth` lines
    fn write_navigation_graph(&mut self, edges: &[NavigationEdge]) -> StorageResult<()>;

    /// Writes the run manifest `crawl_<label>.json`
    fn write_manifest(&mut self, manifest: &CrawlManifest) -> StorageResult<()>;
}
