use crate::common::{external_base, html, pipeline, CancelFromCheck};
use sitegauge::crawler::{CrawlFailure, NeverCancelled, PageCrawler, HTML_VERSION};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_link_classification() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><head><title>Links</title></head><body>
                <a href="/about">About</a>
                <a href="{uri}/contact">Contact</a>
                <a href="{ext}/partner">Partner</a>
                <a href="javascript:void(0)">Menu</a>
            </body></html>"#,
            uri = uri,
            ext = external_base(&uri)
        )))
        .mount(&server)
        .await;

    for link in ["/about", "/contact", "/partner"] {
        Mock::given(method("HEAD"))
            .and(path(link))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
    }

    let analysis = pipeline().crawl(&uri, &NeverCancelled).await.unwrap();

    assert_eq!(analysis.html_version, HTML_VERSION);
    assert_eq!(analysis.title.as_deref(), Some("Links"));
    assert_eq!(analysis.internal_links, 2);
    assert_eq!(analysis.external_links, 1);
    assert!(analysis.broken_links.is_empty());
}

#[tokio::test]
async fn test_login_form_detection() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(html(
            r#"<html><body>
                <form method="post">
                    <input type="text" name="user">
                    <input type="password" name="pass">
                    <button type="submit">Log In</button>
                </form>
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    let url = format!("{}/login", server.uri());
    let analysis = pipeline().crawl(&url, &NeverCancelled).await.unwrap();

    assert!(analysis.has_login_form);
    assert_eq!(analysis.internal_links + analysis.external_links, 0);
}

#[tokio::test]
async fn test_broken_links_are_deduplicated() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<a href="/missing">one</a><a href="/missing">two</a><a href="{}/missing">three</a>"#,
            uri
        )))
        .mount(&server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let analysis = pipeline().crawl(&uri, &NeverCancelled).await.unwrap();

    assert_eq!(analysis.internal_links, 1);
    assert_eq!(analysis.broken_links.len(), 1);
    assert_eq!(analysis.broken_links[0].status_code, Some(404));
    assert_eq!(analysis.broken_links[0].url, format!("{}/missing", uri));
}

#[tokio::test]
async fn test_redirect_chain_is_not_broken() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/loop">Loop</a>"#))
        .mount(&server)
        .await;

    Mock::given(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let analysis = pipeline().crawl(&uri, &NeverCancelled).await.unwrap();

    assert_eq!(analysis.internal_links, 1);
    assert!(analysis.broken_links.is_empty());
}

#[tokio::test]
async fn test_http_error_status_fails_crawl() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let failure = pipeline()
        .crawl(&server.uri(), &NeverCancelled)
        .await
        .unwrap_err();

    assert!(matches!(failure, CrawlFailure::HttpStatus(500)));
}

#[tokio::test]
async fn test_non_html_content_type_is_still_analyzed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<title>Plain</title><h1>One</h1>", "text/plain"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(&server)
        .await;

    let plain = format!("{}/plain", server.uri());
    let analysis = pipeline().crawl(&plain, &NeverCancelled).await.unwrap();
    assert_eq!(analysis.title.as_deref(), Some("Plain"));
    assert_eq!(analysis.headings.h1, 1);

    let data = format!("{}/data", server.uri());
    let analysis = pipeline().crawl(&data, &NeverCancelled).await.unwrap();
    assert_eq!(analysis.title, None);
    assert_eq!(analysis.headings.total(), 0);
    assert_eq!(analysis.internal_links + analysis.external_links, 0);
}

#[tokio::test]
async fn test_cancelled_before_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html("<h1>never fetched</h1>"))
        .expect(0)
        .mount(&server)
        .await;

    let failure = pipeline()
        .crawl(&server.uri(), &CancelFromCheck::new(0))
        .await
        .unwrap_err();

    assert!(failure.is_cancelled());
}

#[tokio::test]
async fn test_cancelled_after_fetch_skips_link_checks() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/next">Next</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/next"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let failure = pipeline()
        .crawl(&server.uri(), &CancelFromCheck::new(1))
        .await
        .unwrap_err();

    assert!(failure.is_cancelled());
}
