//! Plain-text reports for a single page

use crate::crawler::PageAnalysis;
use crate::storage::{BrokenLink, HeadingCounts, PageRecord, StoredCrawlResult};
use std::fmt::Write;

/// Formats a page and its stored result
pub fn render_page_report(page: &PageRecord, result: Option<&StoredCrawlResult>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Page {}: {}", page.id, page.url);
    let _ = writeln!(out, "  Status: {}", page.status);
    if let Some(title) = &page.title {
        let _ = writeln!(out, "  Title: {}", title);
    }
    if let Some(error) = &page.error_message {
        let _ = writeln!(out, "  Error: {}", error);
    }
    let _ = writeln!(out, "  Updated: {}", page.updated_at);
    if page.status.is_active() {
        let _ = writeln!(out, "  Crawl pending or in progress");
    }

    match result {
        None => {
            let _ = writeln!(out, "\n  No crawl result yet");
        }
        Some(stored) => {
            let result = &stored.result;
            let _ = writeln!(out, "\nLast result (updated {}):", stored.updated_at);
            if let Some(error) = &result.error_message {
                let _ = writeln!(out, "  Crawl error: {}", error);
            } else {
                let _ = writeln!(out, "  HTML version: {}", result.html_version);
                write_metrics(
                    &mut out,
                    &result.headings,
                    result.internal_links,
                    result.external_links,
                    result.has_login_form,
                );
            }
            write_broken_links(&mut out, &result.broken_links);
        }
    }

    out
}

/// Formats the analysis of a one-off crawl
pub fn render_analysis(url: &str, analysis: &PageAnalysis) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Analysis of {}", url);
    let _ = writeln!(out, "  HTML version: {}", analysis.html_version);
    let _ = writeln!(
        out,
        "  Title: {}",
        analysis.title.as_deref().unwrap_or("(none)")
    );
    write_metrics(
        &mut out,
        &analysis.headings,
        analysis.internal_links,
        analysis.external_links,
        analysis.has_login_form,
    );
    write_broken_links(&mut out, &analysis.broken_links);

    out
}

fn write_metrics(
    out: &mut String,
    headings: &HeadingCounts,
    internal: u32,
    external: u32,
    has_login_form: bool,
) {
    let levels: Vec<String> = (1..=6)
        .map(|level| format!("h{}={}", level, headings.level(level)))
        .collect();
    let _ = writeln!(out, "  Headings: {}", levels.join(" "));
    let _ = writeln!(out, "  Links: {} internal, {} external", internal, external);
    let _ = writeln!(
        out,
        "  Login form: {}",
        if has_login_form { "yes" } else { "no" }
    );
}

fn write_broken_links(out: &mut String, links: &[BrokenLink]) {
    let _ = writeln!(out, "  Broken links: {}", links.len());
    for link in links {
        match (link.status_code, &link.error_message) {
            (Some(status), _) => {
                let _ = writeln!(out, "    - {} (HTTP {})", link.url, status);
            }
            (None, Some(error)) => {
                let _ = writeln!(out, "    - {} ({})", link.url, error);
            }
            (None, None) => {
                let _ = writeln!(out, "    - {}", link.url);
            }
        }
    }
}

/// Prints a page report to stdout
pub fn print_page_report(page: &PageRecord, result: Option<&StoredCrawlResult>) {
    print!("{}", render_page_report(page, result));
}

/// Prints a one-off analysis to stdout
pub fn print_analysis(url: &str, analysis: &PageAnalysis) {
    print!("{}", render_analysis(url, analysis));
}
