//! HTML parser for structural page analysis
//!
//! This module parses static markup (no script execution) to extract:
//! - the page title
//! - heading counts for h1 through h6
//! - whether the page carries a login form
//! - the distinct outbound link targets, classified internal or external

use crate::storage::HeadingCounts;
use crate::url::is_internal_link;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Phrases that mark a form as a login form
const LOGIN_KEYWORDS: [&str; 3] = ["login", "sign in", "log in"];

/// Everything extracted from one HTML document
#[derive(Debug, Clone, Default)]
pub struct DocumentAnalysis {
    pub title: Option<String>,
    pub headings: HeadingCounts,
    pub has_login_form: bool,
    pub links: LinkInventory,
}

/// Distinct link targets found on a page
#[derive(Debug, Clone, Default)]
pub struct LinkInventory {
    pub internal: u32,
    pub external: u32,
    /// Every distinct absolute http(s) target, in document order
    pub targets: Vec<Url>,
}

/// Parses an HTML document and extracts its structural metrics
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The final response URL, used to resolve relative links and
///   to decide which links are internal
///
/// # Example
///
/// ```
/// use sitegauge::crawler::analyze_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><h1>A</h1><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let analysis = analyze_html(html, &base_url);
/// assert_eq!(analysis.title, Some("Test".to_string()));
/// assert_eq!(analysis.headings.h1, 1);
/// assert_eq!(analysis.links.internal, 1);
/// ```
pub fn analyze_html(html: &str, base_url: &Url) -> DocumentAnalysis {
    let document = Html::parse_document(html);

    DocumentAnalysis {
        title: extract_title(&document),
        headings: count_headings(&document),
        has_login_form: detect_login_form(&document),
        links: collect_links(&document, base_url),
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Extracts the trimmed text of the first <title>
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = selector("title")?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn count_headings(document: &Html) -> HeadingCounts {
    let count = |tag: &str| -> u32 {
        selector(tag)
            .map(|s| document.select(&s).count() as u32)
            .unwrap_or(0)
    };

    HeadingCounts {
        h1: count("h1"),
        h2: count("h2"),
        h3: count("h3"),
        h4: count("h4"),
        h5: count("h5"),
        h6: count("h6"),
    }
}

/// A login form needs a password input somewhere on the page and a form
/// whose text mentions logging in
fn detect_login_form(document: &Html) -> bool {
    let (Some(inputs), Some(forms)) = (selector("input[type]"), selector("form")) else {
        return false;
    };

    let has_password_field = document.select(&inputs).any(|input| {
        input
            .value()
            .attr("type")
            .map(|t| t.trim().eq_ignore_ascii_case("password"))
            .unwrap_or(false)
    });

    has_password_field && document.select(&forms).any(mentions_login)
}

fn mentions_login(form: ElementRef<'_>) -> bool {
    let text = form
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    LOGIN_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

fn collect_links(document: &Html, base_url: &Url) -> LinkInventory {
    let mut inventory = LinkInventory::default();
    let Some(anchors) = selector("a[href]") else {
        return inventory;
    };

    let mut seen = HashSet::new();
    for element in document.select(&anchors) {
        let Some(target) = element.value().attr("href").and_then(|h| resolve_link(h, base_url))
        else {
            continue;
        };

        if !seen.insert(target.as_str().to_string()) {
            continue;
        }

        if is_internal_link(&target, base_url) {
            inventory.internal += 1;
        } else {
            inventory.external += 1;
        }
        inventory.targets.push(target);
    }

    inventory
}

/// Resolves an href against the base URL
///
/// Returns None for empty hrefs, unparseable ones and anything that does not
/// resolve to http or https (`javascript:`, `mailto:`, `tel:`, `data:`).
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let resolved = base_url.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}
