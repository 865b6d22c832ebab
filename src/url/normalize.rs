use crate::UrlError;
use url::Url;

/// Scheme applied when the operator omits one
const DEFAULT_SCHEME_PREFIX: &str = "https://";

/// Normalizes a page URL into its identity string
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace
/// 2. Prepend `https://` when no `http://` or `https://` prefix is present;
///    an explicit `http://` is kept as-is
/// 3. Parse; reject anything that is not an absolute http(s) URL with a host
/// 4. Lowercase the host (done by the parser) and drop the fragment
/// 5. Strip trailing slashes from the path; the root renders without one
///
/// # Examples
///
/// ```
/// use sitegauge::url::normalize_page_url;
///
/// assert_eq!(normalize_page_url("example.com").unwrap(), "https://example.com");
/// assert_eq!(normalize_page_url("https://example.com/").unwrap(), "https://example.com");
/// assert_eq!(normalize_page_url("http://example.com/").unwrap(), "http://example.com");
/// ```
pub fn normalize_page_url(raw: &str) -> Result<String, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Parse("empty URL".to_string()));
    }

    let candidate = if has_http_scheme(trimmed) {
        trimmed.to_string()
    } else if let Some(scheme) = explicit_scheme(trimmed) {
        return Err(UrlError::InvalidScheme(scheme.to_string()));
    } else {
        format!("{}{}", DEFAULT_SCHEME_PREFIX, trimmed)
    };

    let mut url = Url::parse(&candidate).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(UrlError::MissingHost),
    }

    url.set_fragment(None);

    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);

    let mut normalized = url.to_string();
    if url.query().is_none() {
        // The parser always renders the root path as "/"
        while normalized.ends_with('/') {
            normalized.pop();
        }
    }

    Ok(normalized)
}

/// Returns true if the string already starts with an http(s) scheme
fn has_http_scheme(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Returns the scheme of a `scheme://...` string, if it has one
fn explicit_scheme(s: &str) -> Option<&str> {
    let (scheme, _) = s.split_once("://")?;
    let is_scheme = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    is_scheme.then_some(scheme)
}
