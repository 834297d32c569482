//! Site registry
//!
//! Maps a numeric site id to the immutable record of the site to crawl.

use crate::config::{Config, SiteEntry};
use crate::{ConfigError, CrawlError};
use std::collections::BTreeMap;
use url::Url;

/// A crawl target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub id: u32,
    pub name: String,
    pub seed_url: Url,
    /// Origin whose registrable domain bounds the crawl
    pub origin: Url,
    pub requires_auth: bool,
}

impl Site {
    /// Builds a site from its configuration entry
    ///
    /// When no origin is configured, the origin of the seed URL is used.
    pub fn from_entry(entry: &SiteEntry) -> Result<Self, ConfigError> {
        let seed_url = Url::parse(&entry.seed_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed-url '{}': {}", entry.seed_url, e))
        })?;

        let origin = match &entry.origin {
            Some(raw) => Url::parse(raw)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid origin '{}': {}", raw, e)))?,
            None => Url::parse(&seed_url.origin().ascii_serialization()).map_err(|e| {
                ConfigError::InvalidUrl(format!("Seed '{}' has no origin: {}", seed_url, e))
            })?,
        };

        Ok(Self {
            id: entry.id,
            name: entry.name.clone(),
            seed_url,
            origin,
            requires_auth: entry.requires_auth,
        })
    }
}

/// `site_id` → `Site`
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: BTreeMap<u32, Site>,
}

impl SiteRegistry {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for entry in &config.sites {
            registry.insert(Site::from_entry(entry)?);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, site: Site) {
        self.sites.insert(site.id, site);
    }

    /// Resolves a site id
    ///
    /// # Returns
    ///
    /// * `Ok(&Site)` - The registered site
    /// * `Err(CrawlError::InvalidSite)` - No site has this id
    pub fn get(&self, site_id: u32) -> Result<&Site, CrawlError> {
        self.sites
            .get(&site_id)
            .ok_or(CrawlError::InvalidSite { site_id })
    }

    /// Resolves every id in the inclusive range, failing on the first gap
    pub fn resolve_range(&self, low: u32, high: u32) -> Result<Vec<&Site>, CrawlError> {
        (low..=high).map(|id| self.get(id)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Site> {
        self.sites.values()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
