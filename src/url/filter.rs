use crate::url::domain::registrable_domain;
use crate::url::normalize::canonicalize;
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Path suffixes that are never worth a browser load
pub const BLOCKED_SUFFIXES: &[&str] = &[
    ".bmp", ".woff", ".ttf", ".otf", ".css", ".csv", ".docx", ".ico", ".jpeg", ".jpg", ".js",
    ".json", ".pdf", ".png", ".svg", ".xls", ".xml", ".wasm", ".txt",
];

/// Why a URL was not admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Could not be parsed even against the page base
    Malformed,
    /// Scheme other than http/https (mailto:, javascript:, data:, ...)
    Scheme(String),
    /// Path ends with a blocked suffix
    Extension(&'static str),
    /// Registrable domain differs from the site's
    CrossSite(String),
    /// Looks like a logout endpoint
    Logout,
    /// Canonical form already seen
    Duplicate,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed"),
            Self::Scheme(s) => write!(f, "scheme {}", s),
            Self::Extension(ext) => write!(f, "blocked suffix {}", ext),
            Self::CrossSite(d) => write!(f, "cross-site {}", d),
            Self::Logout => write!(f, "logout"),
            Self::Duplicate => write!(f, "duplicate"),
        }
    }
}

/// URL admission policy for one site
///
/// A URL is admitted iff its scheme is http(s), its path does not end with
/// a blocked suffix, its registrable domain equals the site's, and its
/// canonical form is not in the seen set.
#[derive(Debug, Clone)]
pub struct UrlFilter {
    site_domain: String,
    skip_logout: bool,
}

impl UrlFilter {
    /// Creates a filter for the site whose origin is `origin`
    pub fn new(origin: &Url, skip_logout: bool) -> Self {
        let site_domain = registrable_domain(origin).unwrap_or_default();
        Self {
            site_domain,
            skip_logout,
        }
    }

    /// Returns the registrable domain URLs must share
    pub fn site_domain(&self) -> &str {
        &self.site_domain
    }

    /// Checks one URL against the policy
    ///
    /// # Returns
    ///
    /// * `Ok(Url)` - The canonical form of an admitted URL
    /// * `Err(Rejection)` - The first rule the URL failed
    pub fn check(&self, url: &Url, seen: &HashSet<String>) -> Result<Url, Rejection> {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(Rejection::Scheme(scheme.to_string()));
        }

        let canonical = canonicalize(url.as_str()).map_err(|_| Rejection::Malformed)?;

        if let Some(ext) = blocked_suffix(canonical.path()) {
            return Err(Rejection::Extension(ext));
        }

        let domain = registrable_domain(&canonical).unwrap_or_default();
        if domain != self.site_domain {
            return Err(Rejection::CrossSite(domain));
        }

        if self.skip_logout && canonical.as_str().to_lowercase().contains("logout") {
            return Err(Rejection::Logout);
        }

        if seen.contains(canonical.as_str()) {
            return Err(Rejection::Duplicate);
        }

        Ok(canonical)
    }

    /// Returns true if `url` would be admitted
    pub fn admits(&self, url: &Url, seen: &HashSet<String>) -> bool {
        self.check(url, seen).is_ok()
    }

    /// Filters a batch of discovered URLs
    ///
    /// Admitted URLs are returned in canonical form, in input order, with
    /// duplicates inside the batch collapsed to their first occurrence.
    /// Filtering the output again yields the same list.
    pub fn filter_batch<'a, I>(&self, urls: I, seen: &HashSet<String>) -> Vec<Url>
    where
        I: IntoIterator<Item = &'a Url>,
    {
        let mut batch_seen: HashSet<String> = HashSet::new();
        let mut admitted = Vec::new();

        for url in urls {
            match self.check(url, seen) {
                Ok(canonical) => {
                    if batch_seen.insert(canonical.as_str().to_string()) {
                        admitted.push(canonical);
                    }
                }
                Err(reason) => {
                    tracing::trace!(url = %url, reason = %reason, "URL rejected");
                }
            }
        }

        admitted
    }
}

/// Returns the blocked suffix `path` ends with, case-insensitively
fn blocked_suffix(path: &str) -> Option<&'static str> {
    let lower = path.to_ascii_lowercase();
    BLOCKED_SUFFIXES
        .iter()
        .copied()
        .find(|ext| lower.ends_with(ext))
}
