//! HTTP fetcher implementation
//!
//! This module handles the cheap requests made outside the browser:
//! - Building the HTTP client (TLS verification off, bounded redirects)
//! - Probing a URL before investing a browser load in it
//! - Fetching external `<script src>` bodies
//! - Error classification

use crate::config::FetcherConfig;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE, USER_AGENT};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Desktop browser user agents rotated across requests
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.4; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Result of probing a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// The URL serves an HTML document
    Html {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The response declares a non-HTML Content-Type
    NotHtml {
        /// The actual Content-Type received
        content_type: String,
    },

    /// HTTP 404 or 410
    NotFound {
        /// The HTTP status code
        status: u16,
    },

    /// Connection failure, timeout, TLS failure or too many redirects
    Unreachable {
        /// Error description
        reason: String,
    },
}

impl ProbeResult {
    pub fn is_html(&self) -> bool {
        matches!(self, Self::Html { .. })
    }
}

/// Picks a user agent from the pool
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use clientside_crawler::config::FetcherConfig;
/// use clientside_crawler::crawler::build_http_client;
///
/// let client = build_http_client(&FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    headers.insert("DNT", HeaderValue::from_static("1"));
    headers.insert(CONNECTION, HeaderValue::from_static("close"));

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout))
        .redirect(Policy::limited(config.max_redirects))
        .danger_accept_invalid_certs(true)
        .build()
}

/// Probing and script-fetching client for one crawl
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    fetch_external_scripts: bool,
}

impl Fetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            fetch_external_scripts: config.fetch_external_scripts,
        })
    }

    /// Probes a URL with a single GET
    ///
    /// # Classification
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | HTTP 404 / 410 | NotFound |
    /// | Content-Type present and not HTML | NotHtml |
    /// | Any other status | Html |
    /// | Timeout | Unreachable |
    /// | Connection refused / TLS failure | Unreachable |
    /// | Redirect chain over the limit | Unreachable |
    ///
    /// Missing Content-Type is treated as HTML; the browser decides.
    pub async fn probe(&self, url: &str) -> ProbeResult {
        let response = match self
            .client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return classify_error(&e),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return ProbeResult::NotFound {
                status: status.as_u16(),
            };
        }

        if let Some(content_type) = content_type(response.headers()) {
            if !is_html_content_type(&content_type) {
                return ProbeResult::NotHtml { content_type };
            }
        }

        let final_url = response.url().to_string();
        match response.text().await {
            Ok(body) => ProbeResult::Html {
                final_url,
                status: status.as_u16(),
                body,
            },
            Err(e) => classify_error(&e),
        }
    }

    /// Fetches the body of an external script
    ///
    /// Returns `None` when script fetching is disabled, the request fails,
    /// or the server answered with an HTML page (a soft 404 or login wall).
    pub async fn fetch_script(&self, url: &str) -> Option<String> {
        if !self.fetch_external_scripts {
            return None;
        }

        let response = match self
            .client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(url = %url, status = response.status().as_u16(), "Script fetch returned error status");
                return None;
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Script fetch failed");
                return None;
            }
        };

        let declared_html = content_type(response.headers())
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false);

        let body = response.text().await.ok()?;
        if declared_html || looks_like_html(&body) {
            debug!(url = %url, "Script URL served an HTML page; skipping");
            return None;
        }

        Some(body)
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("text/html") || lower.contains("application/xhtml+xml")
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body.trim_start().chars().take(15).collect();
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

fn classify_error(error: &reqwest::Error) -> ProbeResult {
    let reason = if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_redirect() {
        "Too many redirects".to_string()
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else {
        error.to_string()
    };
    ProbeResult::Unreachable { reason }
}
