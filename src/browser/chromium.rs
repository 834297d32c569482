//! Chromium driver over the DevTools protocol

use crate::browser::driver::{ConsoleEntry, Driver, DriverFactory};
use crate::browser::{BrowserError, VirtualDisplay};
use crate::config::BrowserConfig;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::log::{EnableParams as LogEnableParams, EventEntryAdded};
use chromiumoxide::cdp::browser_protocol::network::ClearBrowserCookiesParams;
use chromiumoxide::cdp::browser_protocol::storage::ClearDataForOriginParams;
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::Page;
use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Unpacked extensions loaded into every browser, relative to `extensions-dir`
pub const EXTENSIONS: [&str; 2] = ["request-capture", "event-logger"];

/// Storage types dropped by `Storage.clearDataForOrigin`
const CLEARED_STORAGE_TYPES: &str = "all";

/// Launches Chromium processes configured for instrumented crawling
#[derive(Debug, Clone)]
pub struct ChromiumDriverFactory {
    config: BrowserConfig,
}

impl ChromiumDriverFactory {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Returns the extension directories that exist on disk
    fn extension_paths(&self) -> Vec<PathBuf> {
        let root = Path::new(&self.config.extensions_dir);
        EXTENSIONS
            .iter()
            .map(|name| root.join(name))
            .filter(|path| {
                let present = path.join("manifest.json").is_file();
                if !present {
                    warn!(path = %path.display(), "Instrumentation extension missing; events will be empty");
                }
                present
            })
            .collect()
    }

    fn launch_config(&self) -> Result<LaunchConfig, BrowserError> {
        let mut builder = LaunchConfig::builder()
            .disable_default_args()
            .no_sandbox()
            .window_size(self.config.window_width, self.config.window_height)
            .request_timeout(self.config.page_load_timeout())
            .arg("--disable-dev-shm-usage")
            .arg("--ignore-certificate-errors")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        let extensions = self.extension_paths();
        if !extensions.is_empty() {
            let joined = extensions
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(",");
            builder = builder
                .arg(format!("--disable-extensions-except={}", joined))
                .arg(format!("--load-extension={}", joined));
        }

        builder = if self.config.headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };

        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        if let Some(name) = VirtualDisplay::display_name(&self.config) {
            builder = builder.env("DISPLAY", name);
        }

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl DriverFactory for ChromiumDriverFactory {
    async fn launch(&self) -> Result<Box<dyn Driver>, BrowserError> {
        let launch_config = self.launch_config()?;

        // create a `Browser` that spawns a chromium process
        // and the handler that drives the websocket
        let (browser, mut handler) = Browser::launch(launch_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });

        let page = browser.new_page("about:blank").await?;
        page.execute(LogEnableParams::default()).await?;

        let console = Arc::new(Mutex::new(Vec::new()));
        let mut listener_tasks = Vec::with_capacity(2);

        let mut api_calls = page.event_listener::<EventConsoleApiCalled>().await?;
        let sink = Arc::clone(&console);
        listener_tasks.push(tokio::spawn(async move {
            while let Some(event) = api_calls.next().await {
                sink.lock().await.push(console_api_entry(&event));
            }
        }));

        let mut log_entries = page.event_listener::<EventEntryAdded>().await?;
        let sink = Arc::clone(&console);
        listener_tasks.push(tokio::spawn(async move {
            while let Some(event) = log_entries.next().await {
                sink.lock().await.push(log_entry(&event));
            }
        }));

        info!(headless = self.config.headless, "Launched Chromium");

        Ok(Box::new(ChromiumDriver {
            browser,
            page,
            handler_task,
            listener_tasks,
            console,
            origins: BTreeSet::new(),
            page_load_timeout: self.config.page_load_timeout(),
        }))
    }
}

/// A single-tab Chromium session
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    listener_tasks: Vec<JoinHandle<()>>,
    console: Arc<Mutex<Vec<ConsoleEntry>>>,
    /// Every origin navigated to since the last `clear_state`
    origins: BTreeSet<String>,
    page_load_timeout: Duration,
}

#[async_trait]
impl Driver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        if let Some(origin) = storage_origin(url) {
            self.origins.insert(origin);
        }
        match tokio::time::timeout(self.page_load_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                cause: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout {
                url: url.to_string(),
                secs: self.page_load_timeout.as_secs(),
            }),
        }
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn rendered_html(&mut self) -> Result<String, BrowserError> {
        Ok(self.page.content().await?)
    }

    async fn marker_payloads(&mut self, class: &str) -> Result<Vec<String>, BrowserError> {
        let class_literal =
            serde_json::to_string(class).map_err(|e| BrowserError::Script(e.to_string()))?;
        let js = format!(
            "Array.from(document.getElementsByClassName({})).map(e => e.innerHTML)",
            class_literal
        );

        self.page
            .evaluate(js)
            .await?
            .into_value::<Vec<String>>()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }

    async fn console_entries(&mut self) -> Result<Vec<ConsoleEntry>, BrowserError> {
        let mut buffer = self.console.lock().await;
        Ok(std::mem::take(&mut *buffer))
    }

    async fn cookies(&mut self) -> Result<Vec<Value>, BrowserError> {
        self.page
            .get_cookies()
            .await?
            .iter()
            .map(|cookie| {
                serde_json::to_value(cookie).map_err(|e| BrowserError::Script(e.to_string()))
            })
            .collect()
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element.click().await?;
        element.type_str(value).await?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element.click().await?;
        Ok(())
    }

    async fn clear_state(&mut self) -> Result<(), BrowserError> {
        self.page
            .execute(ClearBrowserCookiesParams::default())
            .await?;

        // redirects may have landed on origins never passed to `navigate`
        if let Some(origin) = self.page.url().await?.as_deref().and_then(storage_origin) {
            self.origins.insert(origin);
        }
        for origin in std::mem::take(&mut self.origins) {
            debug!(origin = %origin, "Clearing origin storage");
            self.page
                .execute(ClearDataForOriginParams::new(origin, CLEARED_STORAGE_TYPES))
                .await?;
        }

        self.console.lock().await.clear();
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        for task in self.listener_tasks.drain(..) {
            task.abort();
        }

        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            debug!("Chromium did not exit cleanly: {}", e);
        }
        self.handler_task.abort();

        closed.map(|_| ()).map_err(BrowserError::from)
    }
}

/// Serialized origin of an http(s) URL, as `Storage.clearDataForOrigin` expects it
fn storage_origin(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.origin().ascii_serialization())
}

fn console_api_entry(event: &EventConsoleApiCalled) -> ConsoleEntry {
    let text = event
        .args
        .iter()
        .map(|arg| match &arg.value {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => arg.description.clone().unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join(" ");

    ConsoleEntry {
        timestamp: Utc::now(),
        level: enum_name(&event.r#type),
        source: "console-api".to_string(),
        text,
    }
}

fn log_entry(event: &EventEntryAdded) -> ConsoleEntry {
    let entry = &event.entry;
    let text = match &entry.url {
        Some(url) => format!("{} {}", url, entry.text),
        None => entry.text.clone(),
    };

    ConsoleEntry {
        timestamp: Utc::now(),
        level: enum_name(&entry.level),
        source: enum_name(&entry.source),
        text,
    }
}

/// Protocol enums serialize to their wire names
fn enum_name<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}
