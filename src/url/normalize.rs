use crate::UrlError;
use url::Url;

/// Canonicalizes a URL for duplicate suppression
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an http or https scheme
/// 3. Lowercase the scheme and host, drop the default port
/// 4. Remove dot segments; empty path becomes /
/// 5. Remove the trailing slash (except for root /)
/// 6. Remove the fragment (everything after #)
///
/// The query string is kept verbatim: parameter order and tracking
/// parameters can change what a client-side page does.
///
/// # Arguments
///
/// * `url_str` - The URL string to canonicalize
///
/// # Returns
///
/// * `Ok(Url)` - Canonical URL; `as_str()` is the key of the seen set
/// * `Err(UrlError)` - Failed to parse, or not a web URL
///
/// # Examples
///
/// ```
/// use clientside_crawler::url::canonicalize;
///
/// let url = canonicalize("HTTP://Ex.TEST:80/Page/#top").unwrap();
/// assert_eq!(url.as_str(), "http://ex.test/Page");
/// ```
pub fn canonicalize(url_str: &str) -> Result<Url, UrlError> {
    // Steps 1, 3 and 4 are performed by the WHATWG parser
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize_url(url)
}

/// Canonicalizes an already parsed URL
pub fn canonicalize_url(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        url.set_path(&trimmed);
    }

    url.set_fragment(None);

    Ok(url)
}
