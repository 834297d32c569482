//! HTML parser for extracting links, scripts and form properties
//!
//! This module handles parsing rendered HTML to extract:
//! - Links to follow (anchors and form actions)
//! - Scripts to archive (inline bodies and external sources)
//! - `document.<form>.<field>` names exposed by named forms

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A `<script>` element, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRef {
    Inline(String),
    External(Url),
}

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// All links found on the page (absolute URLs, not yet filtered)
    pub links: Vec<Url>,

    pub scripts: Vec<ScriptRef>,

    /// Named-form properties reachable from `document`
    pub document_props: Vec<String>,
}

/// Parses HTML content and extracts links, scripts and form properties
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">`
/// - `<form action="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
///
/// Relative links resolve against `<base href>` when present, otherwise
/// against `base_url`.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The URL the document was loaded from
///
/// # Example
///
/// ```
/// use clientside_crawler::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let base = document_base(&document, base_url);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, &base),
        scripts: extract_scripts(&document, &base),
        document_props: extract_document_props(&document),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Honors the first `<base href>` element
fn document_base(document: &Html, base_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| base_url.join(href.trim()).ok())
        .unwrap_or_else(|| base_url.clone())
}

/// Extracts anchors and form actions, in document order
fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href], form[action]") {
        for element in document.select(&selector) {
            let attr = match element.value().name() {
                "a" => {
                    // Skip if it has the download attribute
                    if element.value().attr("download").is_some() {
                        continue;
                    }
                    "href"
                }
                _ => "action",
            };

            if let Some(target) = element.value().attr(attr) {
                if let Some(absolute_url) = resolve_link(target, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Extracts `<script>` elements that hold JavaScript
fn extract_scripts(document: &Html, base_url: &Url) -> Vec<ScriptRef> {
    let mut scripts = Vec::new();

    let Ok(selector) = Selector::parse("script") else {
        return scripts;
    };

    for element in document.select(&selector) {
        if !is_javascript(&element) {
            continue;
        }

        if let Some(src) = element.value().attr("src") {
            if let Some(url) = resolve_link(src, base_url) {
                scripts.push(ScriptRef::External(url));
            }
            continue;
        }

        let body = strip_html_comment(&element.text().collect::<String>());
        if !body.trim().is_empty() {
            scripts.push(ScriptRef::Inline(body));
        }
    }

    scripts
}

/// Scripts without a type, or with a JavaScript/module type
fn is_javascript(element: &ElementRef) -> bool {
    match element.value().attr("type") {
        None => true,
        Some(t) => {
            let t = t.trim().to_ascii_lowercase();
            t.is_empty() || t.contains("javascript") || t.contains("ecmascript") || t == "module"
        }
    }
}

/// Removes a legacy `<!-- ... -->` wrapper around inline script bodies
fn strip_html_comment(body: &str) -> String {
    let trimmed = body.trim();
    let inner = trimmed.strip_prefix("<!--").unwrap_or(trimmed);
    let inner = inner
        .trim_end()
        .strip_suffix("-->")
        .map(|s| s.trim_end().trim_end_matches("//"))
        .unwrap_or(inner);
    inner.trim().to_string()
}

/// Lists `document.<form>` and `document.<form>.<field>` for named forms
///
/// Hidden inputs, textareas and buttons are the fields a DOM-clobbering or
/// open-redirect gadget can read through `document`.
fn extract_document_props(document: &Html) -> Vec<String> {
    let mut props = Vec::new();

    let (Ok(forms), Ok(fields)) = (
        Selector::parse("form[name]"),
        Selector::parse("input[type=hidden][name], textarea[name], button[name]"),
    ) else {
        return props;
    };

    for form in document.select(&forms) {
        let Some(form_name) = form.value().attr("name").map(str::trim) else {
            continue;
        };
        if form_name.is_empty() {
            continue;
        }

        props.push(format!("document.{}", form_name));
        for field in form.select(&fields) {
            if let Some(name) = field.value().attr("name").map(str::trim) {
                if !name.is_empty() {
                    props.push(format!("document.{}.{}", form_name, name));
                }
            }
        }
    }

    props
}

/// Resolves a link to an absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    // Skip empty hrefs
    if href.is_empty() {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    // Skip fragment-only links (same page anchors)
    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => Some(absolute_url),
        _ => None,
    }
}
