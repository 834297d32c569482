//! Top-level entry point: resolves sites and manages the display/driver
//! lifecycle around each site crawl

use crate::auth::{AuthRegistry, SessionState};
use crate::browser::{
    BrowserSession, ChromiumDriverFactory, DriverFactory, SessionTimings, VirtualDisplay,
};
use crate::config::Config;
use crate::crawler::collector::PageCollector;
use crate::crawler::coordinator::{Coordinator, CrawlSummary};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::{Frontier, FrontierLimits};
use crate::site::{Site, SiteRegistry};
use crate::state::FailureKind;
use crate::storage::FsArtifactStore;
use crate::CrawlError;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs site crawls sequentially
pub struct Orchestrator {
    config: Config,
    config_hash: String,
    sites: SiteRegistry,
    auth: AuthRegistry,
    factory: Arc<dyn DriverFactory>,
}

impl Orchestrator {
    /// Builds the site and auth registries from `config`
    ///
    /// Browsers are launched through Chromium unless another factory is set
    /// with [`Orchestrator::with_driver_factory`].
    pub fn new(config: Config, config_hash: impl Into<String>) -> Result<Self, CrawlError> {
        let sites = SiteRegistry::from_config(&config)?;
        let auth = AuthRegistry::from_config(&config)?;
        let factory: Arc<dyn DriverFactory> = Arc::new(ChromiumDriverFactory::new(&config.browser));

        Ok(Self {
            config,
            config_hash: config_hash.into(),
            sites,
            auth,
            factory,
        })
    }

    pub fn with_driver_factory(mut self, factory: Arc<dyn DriverFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Replaces the login states, e.g. with custom `LoginRoutine`s
    pub fn with_auth_registry(mut self, auth: AuthRegistry) -> Self {
        self.auth = auth;
        self
    }

    pub fn sites(&self) -> &SiteRegistry {
        &self.sites
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Crawls every site in the inclusive range `[low, high]`, in order
    ///
    /// Every id is resolved before the first crawl starts.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<CrawlSummary>)` - One summary per site that was crawled
    /// * `Err(CrawlError)` - A fatal error (unknown site, no browser)
    pub async fn run_range(
        &self,
        low: u32,
        high: u32,
        state_label: Option<&str>,
    ) -> Result<Vec<CrawlSummary>, CrawlError> {
        let sites = self.sites.resolve_range(low, high)?;
        let mut summaries = Vec::with_capacity(sites.len());

        for site in sites {
            match self.run_site(site, state_label).await {
                Ok(summary) => summaries.push(summary),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => error!(site_id = site.id, "Site crawl aborted: {}", e),
            }
        }

        Ok(summaries)
    }

    /// Crawls one site
    ///
    /// Order: display start → browser launch → login → crawl → browser
    /// shutdown → display stop.
    pub async fn run_site(
        &self,
        site: &Site,
        state_label: Option<&str>,
    ) -> Result<CrawlSummary, CrawlError> {
        let frontier = Frontier::new(
            site.id,
            site.seed_url.clone(),
            FrontierLimits::from_config(&self.config.crawler),
        )?;
        let fetcher = Fetcher::new(&self.config.fetcher)?;
        let store = FsArtifactStore::new(
            Path::new(&self.config.output.root),
            site.id,
            self.config.output.beautify_scripts,
        )?;
        let state = self.session_state(site, state_label);

        let display = VirtualDisplay::start(&self.config.browser)
            .await
            .map_err(|e| CrawlError::DriverUnavailable(e.to_string()))?;

        let session = match BrowserSession::open(
            Arc::clone(&self.factory),
            state,
            SessionTimings::from_config(&self.config),
            site.id,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                display.stop().await;
                return Err(CrawlError::DriverUnavailable(e.to_string()));
            }
        };

        let collector = PageCollector::new(
            site.id,
            fetcher,
            session,
            store,
            self.config.crawler.rebuild_attempts,
        );
        let coordinator = Coordinator::new(
            site.clone(),
            &self.config,
            self.config_hash.clone(),
            frontier,
            collector,
        );

        let summary = coordinator.run().await;
        display.stop().await;

        info!(
            site_id = site.id,
            visited = summary.visited,
            termination = %summary.termination,
            "Site finished"
        );
        Ok(summary)
    }

    /// Picks the login state, or `None` for an anonymous crawl
    fn session_state(&self, site: &Site, label: Option<&str>) -> Option<SessionState> {
        if !self.config.browser.use_state_scripts {
            if site.requires_auth {
                warn!(site_id = site.id, "Site requires auth but state scripts are disabled");
            }
            return None;
        }

        match self.auth.select(site.id, label) {
            Ok(Some(state)) => Some(state),
            Ok(None) => {
                if site.requires_auth {
                    warn!(
                        site_id = site.id,
                        url = %site.seed_url,
                        kind = %FailureKind::AuthFailure,
                        cause = "no login state registered",
                        "Crawling unauthenticated"
                    );
                }
                None
            }
            Err(e) => {
                warn!(
                    site_id = site.id,
                    url = %site.seed_url,
                    kind = %FailureKind::AuthFailure,
                    cause = %e,
                    "Crawling unauthenticated"
                );
                None
            }
        }
    }
}
