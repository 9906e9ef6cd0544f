//! HTML parser for extracting stored content and child links
//!
//! This module handles parsing fetched pages to extract:
//! - The markup stored for the page (`<head>` followed by `<body>`)
//! - Site-internal links to follow
//! - The page title

use crate::url::{is_site_link, normalize_link_path};
use scraper::{Html, Selector};
use std::collections::HashSet;

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// The `<head>` and `<body>` markup, as stored for the page
    pub content: String,

    /// Site-relative paths of linked pages, in document order, deduplicated
    pub links: Vec<String>,
}

/// Parses HTML content and extracts stored content and links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` values starting with `/`
///
/// **Exclude:**
/// - Protocol-relative links (`//host/...`)
/// - Absolute, relative and fragment-only links
///
/// The href `/` yields the root path `""`.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
///
/// # Returns
///
/// * `Ok(ParsedPage)` - Successfully parsed page
/// * `Err(String)` - The page has an empty body
///
/// # Example
///
/// ```
/// use lemma_search::crawler::parse_html;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let parsed = parse_html(html).unwrap();
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["/page".to_string()]);
/// ```
pub fn parse_html(html: &str) -> Result<ParsedPage, String> {
    let document = Html::parse_document(html);

    let body = select_first_html(&document, "body", false).unwrap_or_default();
    if body.trim().is_empty() {
        return Err("Page body is empty".to_string());
    }

    let head = select_first_html(&document, "head", true).unwrap_or_default();
    let body = select_first_html(&document, "body", true).unwrap_or_default();

    Ok(ParsedPage {
        title: extract_title(&document),
        content: format!("{}{}", head, body),
        links: extract_links(&document),
    })
}

/// Returns the outer (or inner) HTML of the first element matching `selector`
fn select_first_html(document: &Html, selector: &str, outer: bool) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next().map(|element| {
        if outer {
            element.html()
        } else {
            element.inner_html()
        }
    })
}

/// Extracts the page title from the HTML document
pub fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all site-internal links from the HTML document
fn extract_links(document: &Html) -> Vec<String> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if !is_site_link(href) {
                continue;
            }

            let path = normalize_link_path(href);
            if seen.insert(path.clone()) {
                links.push(path);
            }
        }
    }

    links
}
