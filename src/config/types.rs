use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the crawler
///
/// Every section has defaults, so a configuration file only has to list the
/// `[[site]]` tables it wants to crawl.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteEntry>,
}

/// Frontier limits and crawl behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of URLs enqueued over the whole crawl
    #[serde(rename = "max-urls")]
    pub max_urls: usize,

    /// Maximum breadth-first depth (the seed is depth 0)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of URLs promoted from one depth to the next
    #[serde(rename = "max-per-depth")]
    pub max_per_depth: usize,

    /// Seconds to wait after navigation completes
    #[serde(rename = "page-load-wait")]
    pub page_load_wait: u64,

    /// Additional seconds to wait for late XHR traffic before harvesting
    #[serde(rename = "xhr-read-wait")]
    pub xhr_read_wait: u64,

    /// Wall-clock budget of one site crawl (seconds)
    pub timeout: u64,

    /// Session rebuilds attempted for a URL whose load failed
    #[serde(rename = "rebuild-attempts")]
    pub rebuild_attempts: u32,

    /// Whether the navigation graph is written when the crawl ends
    #[serde(rename = "save-navigation-graph")]
    pub save_navigation_graph: bool,

    /// Never follow URLs that look like a logout endpoint
    #[serde(rename = "skip-logout-urls")]
    pub skip_logout_urls: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_urls: 1000,
            max_depth: 15,
            max_per_depth: 25,
            page_load_wait: 4,
            xhr_read_wait: 1,
            timeout: 300,
            rebuild_attempts: 1,
            save_navigation_graph: true,
            skip_logout_urls: true,
        }
    }
}

impl CrawlerConfig {
    pub fn page_load_wait(&self) -> Duration {
        Duration::from_secs(self.page_load_wait)
    }

    pub fn xhr_read_wait(&self) -> Duration {
        Duration::from_secs(self.xhr_read_wait)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Browser and driver configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,

    /// Path to the Chromium binary; auto-detected when absent
    #[serde(rename = "chrome-executable")]
    pub chrome_executable: Option<String>,

    /// Directory holding the unpacked `request-capture` and `event-logger` extensions
    #[serde(rename = "extensions-dir")]
    pub extensions_dir: String,

    /// Apply the site's login states before crawling
    #[serde(rename = "use-state-scripts")]
    pub use_state_scripts: bool,

    /// Seconds to wait after a login routine returns
    #[serde(rename = "wait-after-login")]
    pub wait_after_login: u64,

    /// Seconds before a single navigation is abandoned
    #[serde(rename = "page-load-timeout")]
    pub page_load_timeout: u64,

    /// Wrap non-headless browsers in an Xvfb display on Linux
    #[serde(rename = "virtual-display")]
    pub virtual_display: bool,

    #[serde(rename = "display-number")]
    pub display_number: u32,

    #[serde(rename = "window-width")]
    pub window_width: u32,

    #[serde(rename = "window-height")]
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_executable: None,
            extensions_dir: "extensions".to_string(),
            use_state_scripts: false,
            wait_after_login: 3,
            page_load_timeout: 30,
            virtual_display: true,
            display_number: 99,
            window_width: 800,
            window_height: 600,
        }
    }
}

impl BrowserConfig {
    pub fn wait_after_login(&self) -> Duration {
        Duration::from_secs(self.wait_after_login)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout)
    }
}

/// Reachability probe configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Request timeout (seconds)
    pub timeout: u64,

    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,

    /// Download `<script src>` bodies so they are archived with the page
    #[serde(rename = "fetch-external-scripts")]
    pub fetch_external_scripts: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: 10,
            max_redirects: 3,
            fetch_external_scripts: true,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory under which `<site_id>/` artifact trees are created
    pub root: String,

    /// Pretty-print scripts before saving them
    #[serde(rename = "beautify-scripts")]
    pub beautify_scripts: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: "data".to_string(),
            beautify_scripts: true,
        }
    }
}

/// One entry of the site registry
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    pub id: u32,

    pub name: String,

    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Origin used for same-site containment; defaults to the seed's origin
    #[serde(default)]
    pub origin: Option<String>,

    #[serde(default, rename = "requires-auth")]
    pub requires_auth: bool,

    #[serde(default, rename = "state")]
    pub states: Vec<StateEntry>,
}

/// A labeled login routine expressed as browser steps
#[derive(Debug, Clone, Deserialize)]
pub struct StateEntry {
    pub label: String,

    #[serde(rename = "login-url")]
    pub login_url: String,

    /// Seconds to let the login page settle before the first step
    #[serde(default = "default_settle")]
    pub settle: u64,

    #[serde(default, rename = "step")]
    pub steps: Vec<LoginStep>,
}

fn default_settle() -> u64 {
    4
}

/// One UI action of a form login
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum LoginStep {
    Fill { selector: String, value: String },
    Click { selector: String },
    Wait { seconds: u64 },
    Navigate { url: String },
}
