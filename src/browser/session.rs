use crate::auth::{SessionState, ANONYMOUS_LABEL};
use crate::browser::decoder::{EventKind, MarkerSnapshot};
use crate::browser::driver::{ConsoleEntry, Driver, DriverFactory};
use crate::browser::BrowserError;
use crate::config::Config;
use crate::state::FailureKind;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// URL a Chromium tab shows when the renderer lost its page
const BROKEN_SESSION_URL: &str = "data:,";

/// Fixed waits around navigation and login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// After navigation completes
    pub page_load_wait: Duration,
    /// After `page_load_wait`, for late asynchronous traffic
    pub xhr_read_wait: Duration,
    /// After a login routine returns
    pub wait_after_login: Duration,
}

impl SessionTimings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_load_wait: config.crawler.page_load_wait(),
            xhr_read_wait: config.crawler.xhr_read_wait(),
            wait_after_login: config.browser.wait_after_login(),
        }
    }
}

/// Everything read from the browser after a load
#[derive(Debug, Clone, Default)]
pub struct HarvestSnapshot {
    /// URL the tab ended on (after client-side redirects)
    pub final_url: String,
    /// Rendered DOM
    pub html: String,
    pub markers: MarkerSnapshot,
    pub console: Vec<ConsoleEntry>,
    pub cookies: Vec<Value>,
    /// Partial failures; the matching parts of the snapshot are empty
    pub warnings: Vec<String>,
}

/// An instrumented, optionally authenticated browser session
///
/// Owns the driver exclusively. A failed load marks the session unhealthy;
/// the next `load` then rebuilds a fresh browser and replays the login.
pub struct BrowserSession {
    factory: Arc<dyn DriverFactory>,
    driver: Option<Box<dyn Driver>>,
    state: Option<SessionState>,
    timings: SessionTimings,
    site_id: u32,
    healthy: bool,
    rebuilds: u32,
}

impl BrowserSession {
    /// Launches a browser and applies `state`
    ///
    /// # Returns
    ///
    /// * `Ok(BrowserSession)` - Browser is up (login failures only warn)
    /// * `Err(BrowserError)` - The browser could not be launched
    pub async fn open(
        factory: Arc<dyn DriverFactory>,
        state: Option<SessionState>,
        timings: SessionTimings,
        site_id: u32,
    ) -> Result<Self, BrowserError> {
        let driver = factory.launch().await?;

        let mut session = Self {
            factory,
            driver: Some(driver),
            state,
            timings,
            site_id,
            healthy: true,
            rebuilds: 0,
        };
        session.authenticate().await;

        Ok(session)
    }

    /// Label of the applied session state
    pub fn label(&self) -> &str {
        self.state
            .as_ref()
            .map(SessionState::label)
            .unwrap_or(ANONYMOUS_LABEL)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy && self.driver.is_some()
    }

    /// Number of rebuilds performed so far
    pub fn rebuilds(&self) -> u32 {
        self.rebuilds
    }

    /// Flags the session for a rebuild before the next load
    pub fn mark_unhealthy(&mut self) {
        self.healthy = false;
    }

    /// Navigates to `url` and waits for scripts and late XHRs
    ///
    /// A landing on `data:,` means the tab lost its renderer: the session is
    /// reset and the navigation retried once.
    pub async fn load(&mut self, url: &str) -> Result<(), BrowserError> {
        self.ensure_ready().await?;

        self.navigate_and_wait(url).await?;

        let landed = self.current_url().await?;
        if landed.starts_with(BROKEN_SESSION_URL) {
            warn!(
                site_id = self.site_id,
                url = %url,
                kind = %FailureKind::LoadFailure,
                cause = "landed on data:,",
                "Browser session looks broken; resetting"
            );
            self.reset().await?;
            self.navigate_and_wait(url).await?;

            let landed = self.current_url().await?;
            if landed.starts_with(BROKEN_SESSION_URL) {
                self.healthy = false;
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    cause: "still on data:, after reset".to_string(),
                });
            }
        }

        tokio::time::sleep(self.timings.xhr_read_wait).await;
        Ok(())
    }

    /// Reads the rendered DOM, marker nodes, console and cookies
    ///
    /// Only a failure to read the DOM is an error; the other parts degrade
    /// to empty values with a warning in the snapshot.
    pub async fn harvest(&mut self) -> Result<HarvestSnapshot, BrowserError> {
        let html = self.driver_mut()?.rendered_html().await;
        let html = self.track(html)?;
        let driver = self.driver_mut()?;

        let mut snapshot = HarvestSnapshot {
            html,
            ..HarvestSnapshot::default()
        };

        match driver.current_url().await {
            Ok(url) => snapshot.final_url = url,
            Err(e) => snapshot.warnings.push(format!("current url: {}", e)),
        }

        for kind in EventKind::ALL {
            match driver.marker_payloads(kind.marker_class()).await {
                Ok(payloads) => *snapshot.markers.slot_mut(kind) = payloads,
                Err(e) => snapshot
                    .warnings
                    .push(format!("{} markers: {}", kind.marker_class(), e)),
            }
        }

        match driver.console_entries().await {
            Ok(entries) => snapshot.console = entries,
            Err(e) => snapshot.warnings.push(format!("console: {}", e)),
        }

        match driver.cookies().await {
            Ok(cookies) => snapshot.cookies = cookies,
            Err(e) => snapshot.warnings.push(format!("cookies: {}", e)),
        }

        Ok(snapshot)
    }

    /// Discards cookies and storage, then replays the login routine
    pub async fn reset(&mut self) -> Result<(), BrowserError> {
        let cleared = self.driver_mut()?.clear_state().await;
        self.track(cleared)?;
        self.authenticate().await;
        debug!(site_id = self.site_id, "Session reset");
        Ok(())
    }

    /// Tears the browser down and builds a fresh authenticated one
    pub async fn rebuild(&mut self) -> Result<(), BrowserError> {
        self.shutdown_driver().await;

        let driver = self.factory.launch().await?;
        self.driver = Some(driver);
        self.healthy = true;
        self.rebuilds += 1;

        info!(
            site_id = self.site_id,
            rebuilds = self.rebuilds,
            "Rebuilt browser session"
        );
        self.authenticate().await;
        Ok(())
    }

    /// Shuts the browser down
    pub async fn close(mut self) {
        self.shutdown_driver().await;
    }

    async fn ensure_ready(&mut self) -> Result<(), BrowserError> {
        if !self.is_healthy() {
            self.rebuild().await?;
        }
        Ok(())
    }

    async fn navigate_and_wait(&mut self, url: &str) -> Result<(), BrowserError> {
        let navigated = self.driver_mut()?.navigate(url).await;
        self.track(navigated)?;
        tokio::time::sleep(self.timings.page_load_wait).await;
        Ok(())
    }

    /// Runs the login routine; failures leave the session anonymous
    async fn authenticate(&mut self) {
        let Some(state) = self.state.clone() else {
            return;
        };
        let Some(driver) = self.driver.as_mut() else {
            return;
        };

        match state.apply(driver.as_mut()).await {
            Ok(()) => info!(site_id = self.site_id, state = state.label(), "Logged in"),
            Err(e) => warn!(
                site_id = self.site_id,
                state = state.label(),
                kind = %FailureKind::AuthFailure,
                cause = %e,
                "Login routine failed; continuing unauthenticated"
            ),
        }

        tokio::time::sleep(self.timings.wait_after_login).await;
    }

    async fn shutdown_driver(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            if let Err(e) = driver.quit().await {
                debug!(site_id = self.site_id, "Browser did not quit cleanly: {}", e);
            }
        }
    }

    fn driver_mut(&mut self) -> Result<&mut Box<dyn Driver>, BrowserError> {
        self.driver.as_mut().ok_or(BrowserError::Closed)
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        let url = self.driver_mut()?.current_url().await;
        self.track(url)
    }

    /// Marks the session unhealthy when a driver call failed
    fn track<T>(&mut self, result: Result<T, BrowserError>) -> Result<T, BrowserError> {
        if result.is_err() {
            self.healthy = false;
        }
        result
    }
}
