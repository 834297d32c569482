//! Shared fixtures: a wiremock site for probes and an in-memory browser

use async_trait::async_trait;
use chrono::Utc;
use clientside_crawler::browser::{BrowserError, ConsoleEntry, Driver, DriverFactory};
use clientside_crawler::config::{
    BrowserConfig, Config, CrawlerConfig, FetcherConfig, OutputConfig, SiteEntry,
};
use clientside_crawler::Orchestrator;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SITE_ID: u32 = 1;

/// What the fake browser renders, keyed by URL path
#[derive(Default)]
pub struct FakeWeb {
    pages: Mutex<HashMap<String, String>>,
    markers: Mutex<HashMap<String, Vec<(String, String)>>>,
    console: Mutex<HashMap<String, Vec<String>>>,
    fail_on: Mutex<Option<String>>,
    pub launches: AtomicUsize,
    pub navigations: AtomicUsize,
}

impl FakeWeb {
    pub fn render(&self, path: &str, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(path.to_string(), html.to_string());
    }

    /// Publishes a marker node with `payload` as inner HTML on `path`
    pub fn marker(&self, path: &str, class: &str, payload: &str) {
        self.markers
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push((class.to_string(), payload.to_string()));
    }

    pub fn console_line(&self, path: &str, text: &str) {
        self.console
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push(text.to_string());
    }

    /// Every navigation to `path` fails as if the browser crashed
    pub fn fail_on(&self, path: &str) {
        *self.fail_on.lock().unwrap() = Some(path.to_string());
    }
}

pub struct FakeDriver {
    web: Arc<FakeWeb>,
    current: String,
    console: Vec<ConsoleEntry>,
}

impl FakeDriver {
    fn current_path(&self) -> String {
        Url::parse(&self.current)
            .map(|u| u.path().to_string())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.web.navigations.fetch_add(1, Ordering::SeqCst);
        let path = Url::parse(url).map(|u| u.path().to_string()).unwrap_or_default();

        if self.web.fail_on.lock().unwrap().as_deref() == Some(path.as_str()) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                cause: "renderer crashed".to_string(),
            });
        }

        self.current = url.to_string();
        if let Some(lines) = self.web.console.lock().unwrap().get(&path) {
            for text in lines {
                self.console.push(ConsoleEntry {
                    timestamp: Utc::now(),
                    level: "debug".to_string(),
                    source: "console-api".to_string(),
                    text: text.clone(),
                });
            }
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self.current.clone())
    }

    async fn rendered_html(&mut self) -> Result<String, BrowserError> {
        let path = self.current_path();
        Ok(self
            .web
            .pages
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string()))
    }

    async fn marker_payloads(&mut self, class: &str) -> Result<Vec<String>, BrowserError> {
        let path = self.current_path();
        Ok(self
            .web
            .markers
            .lock()
            .unwrap()
            .get(&path)
            .map(|nodes| {
                nodes
                    .iter()
                    .filter(|(c, _)| c == class)
                    .map(|(_, payload)| payload.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn console_entries(&mut self) -> Result<Vec<ConsoleEntry>, BrowserError> {
        Ok(std::mem::take(&mut self.console))
    }

    async fn cookies(&mut self) -> Result<Vec<serde_json::Value>, BrowserError> {
        Ok(vec![serde_json::json!({"name": "sid", "value": "fake"})])
    }

    async fn fill(&mut self, _selector: &str, _value: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn click(&mut self, _selector: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn clear_state(&mut self) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        Ok(())
    }
}

pub struct FakeDriverFactory {
    pub web: Arc<FakeWeb>,
}

#[async_trait]
impl DriverFactory for FakeDriverFactory {
    async fn launch(&self) -> Result<Box<dyn Driver>, BrowserError> {
        self.web.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDriver {
            web: Arc::clone(&self.web),
            current: "about:blank".to_string(),
            console: Vec::new(),
        }))
    }
}

/// A site served by wiremock (for probes) and by `FakeWeb` (for rendering)
pub struct TestSite {
    pub server: MockServer,
    pub web: Arc<FakeWeb>,
    pub output: TempDir,
}

impl TestSite {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            web: Arc::new(FakeWeb::default()),
            output: TempDir::new().unwrap(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Serves `html` at `path` to both the probe and the browser
    pub async fn page(&self, path_str: &str, html: &str) {
        Mock::given(method("GET"))
            .and(path(path_str))
            .respond_with(ResponseTemplate::new(200).set_body_raw(html.to_string(), "text/html"))
            .mount(&self.server)
            .await;
        self.web.render(path_str, html);
    }

    pub async fn status(&self, path_str: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(path_str))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Test configuration: no waits, headless, no beautifier
    pub fn config(&self) -> Config {
        Config {
            crawler: CrawlerConfig {
                page_load_wait: 0,
                xhr_read_wait: 0,
                ..CrawlerConfig::default()
            },
            browser: BrowserConfig {
                headless: true,
                virtual_display: false,
                wait_after_login: 0,
                ..BrowserConfig::default()
            },
            fetcher: FetcherConfig {
                timeout: 5,
                ..FetcherConfig::default()
            },
            output: OutputConfig {
                root: self.output.path().to_string_lossy().into_owned(),
                beautify_scripts: false,
            },
            sites: vec![SiteEntry {
                id: SITE_ID,
                name: "wiremock".to_string(),
                seed_url: self.url("/"),
                origin: None,
                requires_auth: false,
                states: Vec::new(),
            }],
        }
    }

    pub fn orchestrator(&self, config: Config) -> Orchestrator {
        Orchestrator::new(config, "test-hash")
            .unwrap()
            .with_driver_factory(Arc::new(FakeDriverFactory {
                web: Arc::clone(&self.web),
            }))
    }

    pub fn site_root(&self) -> PathBuf {
        self.output.path().join(SITE_ID.to_string())
    }

    /// Contents of the `urls` file: every discovered URL
    pub fn urls(&self) -> Vec<String> {
        std::fs::read_to_string(self.site_root().join("urls"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Visited URLs in visit order, from the anonymous crawl manifest
    pub fn visited(&self) -> Vec<String> {
        manifest_pages(&self.manifest("anonymous"))
    }

    /// `(src, dst, depth)` lines of `navigation_graph`
    pub fn edges(&self) -> Vec<(String, String, u32)> {
        std::fs::read_to_string(self.site_root().join("navigation_graph"))
            .unwrap()
            .lines()
            .map(|line| {
                let mut parts = line.split('\t');
                (
                    parts.next().unwrap().to_string(),
                    parts.next().unwrap().to_string(),
                    parts.next().unwrap().parse().unwrap(),
                )
            })
            .collect()
    }

    /// Artifact directories under the site root
    pub fn artifact_dirs(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.site_root())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect()
    }

    pub fn artifact_dir(&self, path: &str) -> PathBuf {
        self.site_root()
            .join(clientside_crawler::storage::FsArtifactStore::dir_name(&self.url(path)))
    }

    pub fn manifest(&self, label: &str) -> serde_json::Value {
        let body =
            std::fs::read_to_string(self.site_root().join(format!("crawl_{}.json", label))).unwrap();
        serde_json::from_str(&body).unwrap()
    }
}

pub fn manifest_pages(manifest: &serde_json::Value) -> Vec<String> {
    manifest["pages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["url"].as_str().unwrap().to_string())
        .collect()
}

/// Captures formatted log output of the current thread
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Routes `warn` and above to this capture until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
