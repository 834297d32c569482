use url::{Host, Url};

/// Extracts the registrable domain (eTLD+1) of a URL
///
/// The public suffix list is consulted through the `psl` crate. IP
/// addresses, single-label hosts (`localhost`) and hosts that are
/// themselves a public suffix fall back to the lowercase host, so they
/// only ever match themselves.
///
/// # Arguments
///
/// * `url` - The URL to extract the domain from
///
/// # Returns
///
/// * `Some(String)` - The lowercase registrable domain
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use clientside_crawler::url::registrable_domain;
///
/// let url = Url::parse("https://a.b.example.co.uk/path").unwrap();
/// assert_eq!(registrable_domain(&url), Some("example.co.uk".to_string()));
/// ```
pub fn registrable_domain(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
        Host::Domain(host) => {
            let host = host.trim_end_matches('.').to_lowercase();
            let domain = psl::domain_str(&host).map(str::to_string);
            Some(domain.unwrap_or(host))
        }
    }
}
