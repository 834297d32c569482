use crate::config::types::{
    BrowserConfig, Config, CrawlerConfig, FetcherConfig, OutputConfig, SiteEntry, StateEntry,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_browser_config(&config.browser)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_output_config(&config.output)?;
    validate_sites(&config.sites)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    // max_depth == 0 is legal: only the seed is crawled

    if config.max_urls < 1 {
        return Err(ConfigError::Validation(format!(
            "max-urls must be >= 1, got {}",
            config.max_urls
        )));
    }

    if config.max_per_depth < 1 {
        return Err(ConfigError::Validation(format!(
            "max-per-depth must be >= 1, got {}",
            config.max_per_depth
        )));
    }

    if config.timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout must be >= 1s, got {}s",
            config.timeout
        )));
    }

    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.extensions_dir.is_empty() {
        return Err(ConfigError::Validation(
            "extensions-dir cannot be empty".to_string(),
        ));
    }

    if config.page_load_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "page-load-timeout must be >= 1s, got {}s",
            config.page_load_timeout
        )));
    }

    if config.window_width == 0 || config.window_height == 0 {
        return Err(ConfigError::Validation(format!(
            "window size must be non-zero, got {}x{}",
            config.window_width, config.window_height
        )));
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "fetcher timeout must be >= 1s, got {}s",
            config.timeout
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.root.is_empty() {
        return Err(ConfigError::Validation(
            "output root cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates the site registry entries
fn validate_sites(sites: &[SiteEntry]) -> Result<(), ConfigError> {
    let mut ids = HashSet::new();

    for entry in sites {
        if !ids.insert(entry.id) {
            return Err(ConfigError::Validation(format!(
                "Duplicate site id {}",
                entry.id
            )));
        }

        validate_http_url(&entry.seed_url, "seed-url")?;
        if let Some(origin) = &entry.origin {
            validate_http_url(origin, "origin")?;
        }

        let mut labels = HashSet::new();
        for state in &entry.states {
            validate_state(state)?;
            if !labels.insert(state.label.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Site {} declares state '{}' twice",
                    entry.id, state.label
                )));
            }
        }

        if entry.requires_auth && entry.states.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Site {} requires auth but declares no login state",
                entry.id
            )));
        }
    }

    Ok(())
}

fn validate_state(state: &StateEntry) -> Result<(), ConfigError> {
    if !is_valid_label(&state.label) {
        return Err(ConfigError::Validation(format!(
            "State label must contain only alphanumeric characters and hyphens, got '{}'",
            state.label
        )));
    }
    validate_http_url(&state.login_url, "login-url")?;
    Ok(())
}

/// Labels name output files, so they are restricted to `[A-Za-z0-9-]+`
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn validate_http_url(raw: &str, field: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, raw
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!("{} '{}' has no host", field, raw)));
    }

    Ok(())
}
