//! Per-URL collection pipeline
//!
//! probe → load → harvest → decode → persist → extract links

use crate::browser::{
    decode_console, decode_markers, summarize_requests, BrowserSession, HarvestSnapshot,
};
use crate::crawler::fetcher::{Fetcher, ProbeResult};
use crate::crawler::frontier::UrlRecord;
use crate::crawler::parser::{parse_html, ScriptRef};
use crate::state::{FailureKind, PageOutcome};
use crate::storage::{sha256_hex, ArtifactStore, PageArtifact, ScriptArtifact, ScriptSource};
use chrono::Utc;
use tracing::{debug, warn};
use url::Url;

/// Result of collecting one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collected {
    pub outcome: PageOutcome,
    /// Outbound links of the rendered page (unfiltered)
    pub links: Vec<Url>,
}

impl Collected {
    fn skipped(outcome: PageOutcome) -> Self {
        Self {
            outcome,
            links: Vec::new(),
        }
    }
}

/// Runs the per-URL pipeline inside one browser session
///
/// Owns the session and the artifact store for the duration of a site crawl.
pub struct PageCollector<S: ArtifactStore> {
    site_id: u32,
    fetcher: Fetcher,
    session: BrowserSession,
    store: S,
    rebuild_attempts: u32,
}

impl<S: ArtifactStore> PageCollector<S> {
    pub fn new(
        site_id: u32,
        fetcher: Fetcher,
        session: BrowserSession,
        store: S,
        rebuild_attempts: u32,
    ) -> Self {
        Self {
            site_id,
            fetcher,
            session,
            store,
            rebuild_attempts,
        }
    }

    /// Label of the session state pages are collected under
    pub fn label(&self) -> &str {
        self.session.label()
    }

    pub fn session_rebuilds(&self) -> u32 {
        self.session.rebuilds()
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Collects one URL
    ///
    /// Never fails: every failure is logged with its `FailureKind` and
    /// folded into the returned outcome.
    pub async fn collect(&mut self, record: &UrlRecord) -> Collected {
        let url = record.url.as_str();

        // 1. Probe
        let (final_url, initial_html) = match self.fetcher.probe(url).await {
            ProbeResult::Html {
                final_url, body, ..
            } => (final_url, body),
            ProbeResult::NotHtml { content_type } => {
                self.warn(url, FailureKind::ProbeFailure, &format!("not HTML: {}", content_type));
                return Collected::skipped(PageOutcome::NotHtml);
            }
            ProbeResult::NotFound { status } => {
                self.warn(url, FailureKind::ProbeFailure, &format!("HTTP {}", status));
                return Collected::skipped(PageOutcome::NotFound);
            }
            ProbeResult::Unreachable { reason } => {
                self.warn(url, FailureKind::ProbeFailure, &reason);
                return Collected::skipped(PageOutcome::Unreachable);
            }
        };

        // 2. Load, rebuilding the session on failure
        if !self.load_with_recovery(url).await {
            return Collected::skipped(PageOutcome::LoadFailed);
        }

        // 3. Harvest
        let snapshot = match self.session.harvest().await {
            Ok(snapshot) => {
                for cause in &snapshot.warnings {
                    self.warn(url, FailureKind::HarvestFailure, cause);
                }
                snapshot
            }
            Err(e) => {
                self.warn(
                    url,
                    FailureKind::HarvestFailure,
                    &format!("rendered DOM unavailable, keeping probe body: {}", e),
                );
                HarvestSnapshot {
                    final_url: final_url.clone(),
                    html: initial_html.clone(),
                    ..HarvestSnapshot::default()
                }
            }
        };

        // 4. Decode
        let events = decode_markers(&snapshot.markers);
        if events.is_empty() {
            debug!(site_id = self.site_id, url = %url, "No instrumentation markers");
        }
        let console = decode_console(&snapshot.console);
        let requests = summarize_requests(&events);

        let base = Url::parse(&snapshot.final_url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or_else(|| record.url.clone());
        let parsed = parse_html(&snapshot.html, &base);
        let scripts = self.resolve_scripts(parsed.scripts).await;

        // 5. Persist
        let artifact = PageArtifact {
            url: url.to_string(),
            final_url: if snapshot.final_url.is_empty() {
                final_url
            } else {
                snapshot.final_url.clone()
            },
            depth: record.depth,
            parent: record.parent.as_ref().map(Url::to_string),
            content_hash: sha256_hex(snapshot.html.as_bytes()),
            html: snapshot.html,
            html_initial: Some(initial_html),
            scripts,
            events,
            console,
            requests,
            cookies: snapshot.cookies,
            document_props: parsed.document_props,
            timestamp: Utc::now(),
        };

        let outcome = match self.store.write_page(&artifact) {
            Ok(dir) => {
                debug!(
                    site_id = self.site_id,
                    url = %url,
                    dir = %dir.display(),
                    scripts = artifact.scripts.len(),
                    events = artifact.events.len(),
                    "Archived page"
                );
                PageOutcome::Archived
            }
            Err(e) => {
                self.warn(url, FailureKind::PersistFailure, &e.to_string());
                PageOutcome::PersistFailed
            }
        };

        // 6. Links
        Collected {
            outcome,
            links: parsed.links,
        }
    }

    /// Shuts the browser down and hands the store back
    pub async fn close(self) -> S {
        self.session.close().await;
        self.store
    }

    /// Loads `url`, rebuilding the session up to `rebuild_attempts` times
    async fn load_with_recovery(&mut self, url: &str) -> bool {
        let mut attempt = 0;

        loop {
            let error = match self.session.load(url).await {
                Ok(()) => return true,
                Err(e) => e,
            };
            self.warn(url, FailureKind::LoadFailure, &error.to_string());

            if attempt >= self.rebuild_attempts {
                self.session.mark_unhealthy();
                return false;
            }
            attempt += 1;

            if let Err(e) = self.session.rebuild().await {
                self.warn(url, FailureKind::LoadFailure, &format!("rebuild failed: {}", e));
                self.session.mark_unhealthy();
                return false;
            }
        }
    }

    /// Turns script references into archived bodies, in document order
    async fn resolve_scripts(&self, refs: Vec<ScriptRef>) -> Vec<ScriptArtifact> {
        let mut scripts = Vec::with_capacity(refs.len());

        for script in refs {
            match script {
                ScriptRef::Inline(body) => scripts.push(ScriptArtifact {
                    source: ScriptSource::Inline,
                    body,
                }),
                ScriptRef::External(src) => {
                    if let Some(body) = self.fetcher.fetch_script(src.as_str()).await {
                        scripts.push(ScriptArtifact {
                            source: ScriptSource::External(src.to_string()),
                            body,
                        });
                    }
                }
            }
        }

        scripts
    }

    fn warn(&self, url: &str, kind: FailureKind, cause: &str) {
        warn!(
            site_id = self.site_id,
            url = %url,
            kind = %kind,
            cause = %cause,
            "Page collection problem"
        );
    }
}
