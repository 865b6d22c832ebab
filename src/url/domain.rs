use url::Url;

/// Extracts the lowercase host from a URL
///
/// Returns `None` for URLs without a host (`mailto:`, `data:` and friends).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitegauge::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM:8443/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
}

/// Classifies a resolved link relative to the page it was found on
///
/// A link is internal when it has no host or its host equals the base host.
/// Ports are not part of the comparison.
pub fn is_internal_link(link: &Url, base: &Url) -> bool {
    match extract_host(link) {
        None => true,
        Some(host) => extract_host(base).as_deref() == Some(host.as_str()),
    }
}
