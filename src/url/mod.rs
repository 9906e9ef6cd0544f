//! URL handling for configured sites
//!
//! Pages are stored under a path relative to their site's base URL. The root
//! page of a site has the empty path `""`; every other path starts with `/`.

use crate::{UrlError, UrlResult};
use url::Url;

/// Parses and normalizes a URL, returning it without a trailing slash
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an HTTP or HTTPS scheme and a host
/// 3. Lowercase the host (done by the parser)
/// 4. Remove the fragment
/// 5. Remove trailing slashes
///
/// # Examples
///
/// ```
/// use lemma_search::url::normalize_site_url;
///
/// let url = normalize_site_url("https://Example.RU/").unwrap();
/// assert_eq!(url, "https://example.ru");
/// ```
pub fn normalize_site_url(url_str: &str) -> UrlResult<String> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost(url_str.to_string()));
    }

    url.set_fragment(None);
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Computes the path of a page relative to a site's base URL
///
/// # Arguments
///
/// * `site_url` - The site's base URL
/// * `page_url` - The absolute URL of a page
///
/// # Returns
///
/// * `Some(path)` - The site-relative path (`""` for the root page)
/// * `None` - The page does not belong to the site
pub fn site_relative_path(site_url: &str, page_url: &str) -> Option<String> {
    let site = normalize_site_url(site_url).ok()?;
    let mut page = Url::parse(page_url.trim()).ok()?;
    page.set_fragment(None);

    let rest = page.as_str().strip_prefix(site.as_str())?;
    if rest.is_empty() {
        return Some(String::new());
    }
    if !rest.starts_with('/') && !rest.starts_with('?') {
        // "https://example.ru" must not own "https://example.ruby.ru"
        return None;
    }

    Some(normalize_link_path(rest))
}

/// Returns true if an href points inside the current site
///
/// Only site-absolute paths qualify; protocol-relative (`//host/...`) and
/// fully qualified links are ignored.
pub fn is_site_link(href: &str) -> bool {
    href.starts_with('/') && !href.starts_with("//")
}

/// Normalizes a site-absolute href into a stored page path
///
/// The fragment is dropped and the bare root `/` becomes `""`.
pub fn normalize_link_path(href: &str) -> String {
    let path = match href.find('#') {
        Some(index) => &href[..index],
        None => href,
    };

    if path == "/" {
        String::new()
    } else {
        path.to_string()
    }
}

/// Builds the absolute URL of a page from its site URL and path
pub fn page_url(site_url: &str, path: &str) -> String {
    format!("{}{}", site_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_site_url() {
        assert_eq!(
            normalize_site_url("https://example.ru/").unwrap(),
            "https://example.ru"
        );
        assert_eq!(
            normalize_site_url("http://EXAMPLE.ru/blog/#top").unwrap(),
            "http://example.ru/blog"
        );
    }

    #[test]
    fn test_normalize_rejects_bad_urls() {
        assert!(matches!(
            normalize_site_url("ftp://example.ru"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(
            normalize_site_url("not a url"),
            Err(UrlError::Parse(_))
        ));
    }

    #[test]
    fn test_site_relative_path() {
        let site = "https://example.ru";
        assert_eq!(site_relative_path(site, "https://example.ru"), Some(String::new()));
        assert_eq!(site_relative_path(site, "https://example.ru/"), Some(String::new()));
        assert_eq!(
            site_relative_path(site, "https://example.ru/news/1"),
            Some("/news/1".to_string())
        );
        assert_eq!(
            site_relative_path(site, "https://EXAMPLE.ru/news#comments"),
            Some("/news".to_string())
        );
        assert_eq!(
            site_relative_path(site, "https://example.ru/news/"),
            Some("/news/".to_string())
        );
    }

    #[test]
    fn test_site_relative_path_rejects_foreign_pages() {
        let site = "https://example.ru";
        assert_eq!(site_relative_path(site, "https://other.ru/news"), None);
        assert_eq!(site_relative_path(site, "https://example.ruby.ru/"), None);
        assert_eq!(site_relative_path(site, "http://example.ru/news"), None);
    }

    #[test]
    fn test_is_site_link() {
        assert!(is_site_link("/news"));
        assert!(is_site_link("/"));
        assert!(!is_site_link("//cdn.example.ru/app.js"));
        assert!(!is_site_link("https://example.ru/news"));
        assert!(!is_site_link("news"));
        assert!(!is_site_link("#top"));
    }

    #[test]
    fn test_normalize_link_path() {
        assert_eq!(normalize_link_path("/"), "");
        assert_eq!(normalize_link_path("/news"), "/news");
        assert_eq!(normalize_link_path("/news#top"), "/news");
        assert_eq!(normalize_link_path("/#top"), "");
    }

    #[test]
    fn test_page_url() {
        assert_eq!(page_url("https://example.ru", ""), "https://example.ru");
        assert_eq!(page_url("https://example.ru/", "/news"), "https://example.ru/news");
    }
}
