//! Crawler coordinator - the crawl loop of one site
//!
//! This module contains the loop that ties the frontier to the collector:
//! - Taking URLs from the frontier until a limit ends the crawl
//! - Collecting each URL and feeding its links back
//! - Recording per-URL outcomes
//! - Writing the crawl-level artifacts at the end

use crate::config::Config;
use crate::crawler::collector::PageCollector;
use crate::crawler::frontier::{Frontier, NavigationEdge, Next, TerminationReason};
use crate::site::Site;
use crate::state::{FailureKind, PageOutcome};
use crate::storage::{ArtifactStore, CrawlManifest, ManifestEntry, StorageResult};
use crate::url::UrlFilter;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Summary of one finished site crawl
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub site_id: u32,
    pub label: String,
    pub termination: TerminationReason,
    pub visited: usize,
    pub edges: usize,
    /// `PageOutcome::as_str` → count
    pub outcomes: BTreeMap<String, usize>,
    pub session_rebuilds: u32,
}

impl CrawlSummary {
    /// Count of visited URLs with `outcome`
    pub fn count(&self, outcome: PageOutcome) -> usize {
        self.outcomes.get(outcome.as_str()).copied().unwrap_or(0)
    }
}

/// Crawls one site to completion
pub struct Coordinator<S: ArtifactStore> {
    site: Site,
    config_hash: String,
    save_navigation_graph: bool,
    frontier: Frontier,
    filter: UrlFilter,
    collector: PageCollector<S>,
    pages: Vec<ManifestEntry>,
}

impl<S: ArtifactStore> Coordinator<S> {
    /// Creates a coordinator instance
    ///
    /// # Arguments
    ///
    /// * `site` - The site being crawled
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration file, recorded in the manifest
    /// * `frontier` - A frontier seeded with the site's seed URL
    /// * `collector` - The per-URL pipeline, with an open browser session
    pub fn new(
        site: Site,
        config: &Config,
        config_hash: impl Into<String>,
        frontier: Frontier,
        collector: PageCollector<S>,
    ) -> Self {
        let filter = UrlFilter::new(&site.origin, config.crawler.skip_logout_urls);

        Self {
            site,
            config_hash: config_hash.into(),
            save_navigation_graph: config.crawler.save_navigation_graph,
            frontier,
            filter,
            collector,
            pages: Vec::new(),
        }
    }

    /// Runs the crawl loop, then closes the browser and writes `urls`,
    /// `navigation_graph` and the manifest
    ///
    /// Per-URL failures never end the crawl; failures to write the
    /// crawl-level files are logged as `PersistFailure`.
    pub async fn run(mut self) -> CrawlSummary {
        let site_id = self.site.id;
        let started_at = Utc::now();
        info!(
            site_id,
            site = %self.site.name,
            seed = %self.site.seed_url,
            state = self.collector.label(),
            "Starting crawl"
        );

        let mut pages_crawled = 0usize;

        let termination = loop {
            let record = match self.frontier.next() {
                Next::Url(record) => record,
                Next::Done(reason) => break reason,
            };

            tracing::debug!(site_id, url = %record.url, depth = record.depth, "Processing URL");

            let collected = self.collector.collect(&record).await;
            let accepted = self.frontier.discover(&record, &collected.links, &self.filter);
            tracing::debug!(
                site_id,
                url = %record.url,
                outcome = %collected.outcome,
                links = collected.links.len(),
                accepted,
                "Collected URL"
            );

            self.pages.push(ManifestEntry {
                url: record.url.to_string(),
                depth: record.depth,
                parent: record.parent.as_ref().map(ToString::to_string),
                outcome: collected.outcome,
            });
            pages_crawled += 1;

            // Progress reporting every 10 pages
            if pages_crawled % 10 == 0 {
                let elapsed = self.frontier.elapsed();
                let rate = pages_crawled as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
                info!(
                    "Progress: {} pages crawled, {} queued at depth {}, {:.2} pages/sec",
                    pages_crawled,
                    self.frontier.queued(),
                    record.depth,
                    rate
                );
            }
        };

        if termination == TerminationReason::Timeout {
            warn!(
                site_id,
                url = %self.site.seed_url,
                kind = %FailureKind::Timeout,
                cause = %format!("crawl budget of {:?} exhausted", self.frontier.elapsed()),
                "Crawl timed out"
            );
        }

        self.finish(started_at, termination).await
    }

    async fn finish(self, started_at: DateTime<Utc>, termination: TerminationReason) -> CrawlSummary {
        let Self {
            site,
            config_hash,
            save_navigation_graph,
            frontier,
            collector,
            pages,
            ..
        } = self;

        let label = collector.label().to_string();
        let session_rebuilds = collector.session_rebuilds();
        let mut store = collector.close().await;

        let mut outcomes: BTreeMap<String, usize> = PageOutcome::all()
            .iter()
            .map(|o| (o.as_str().to_string(), 0))
            .collect();
        for page in &pages {
            *outcomes.entry(page.outcome.as_str().to_string()).or_insert(0) += 1;
        }

        let summary = CrawlSummary {
            site_id: site.id,
            label: label.clone(),
            termination,
            visited: frontier.visited().len(),
            edges: frontier.edges().len(),
            outcomes: outcomes.clone(),
            session_rebuilds,
        };

        let manifest = CrawlManifest {
            site_id: site.id,
            site_name: site.name.clone(),
            label,
            config_hash,
            started_at,
            finished_at: Utc::now(),
            termination: termination.to_string(),
            outcomes,
            edges: frontier.edges().len(),
            session_rebuilds,
            pages,
        };

        let graph = save_navigation_graph.then(|| frontier.edges());
        if let Err(e) = write_crawl_files(&mut store, frontier.discovered(), graph, &manifest) {
            warn!(
                site_id = site.id,
                url = %site.seed_url,
                kind = %FailureKind::PersistFailure,
                cause = %e,
                "Failed to write crawl artifacts"
            );
        }

        info!(
            site_id = site.id,
            termination = %termination,
            visited = summary.visited,
            edges = summary.edges,
            archived = summary.count(PageOutcome::Archived),
            rebuilds = session_rebuilds,
            "Crawl completed in {:?}",
            frontier.elapsed()
        );

        summary
    }
}

fn write_crawl_files<S: ArtifactStore>(
    store: &mut S,
    urls: &[String],
    graph: Option<&[NavigationEdge]>,
    manifest: &CrawlManifest,
) -> StorageResult<()> {
    store.write_urls(urls)?;
    if let Some(edges) = graph {
        store.write_navigation_graph(edges)?;
    }
    store.write_manifest(manifest)
}
