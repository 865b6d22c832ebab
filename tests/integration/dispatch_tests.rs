use crate::common::{external_base, html, TestEnv};
use sitegauge::crawler::{spawn_workers, JobOutcome, SkipReason};
use sitegauge::queue::JobQueue;
use sitegauge::state::PageStatus;
use sitegauge::storage::{PageRepository, ResultRepository};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn wait_for_status(env: &TestEnv, page_id: i64, status: PageStatus) -> bool {
    for _ in 0..200 {
        let page = env.storage.get(page_id).unwrap().unwrap();
        if page.status == status {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_end_to_end_crawl() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><head><title>Gauge Test</title></head><body>
                <h1>One</h1><h1>Two</h1><h1>Three</h1>
                <h2>Sub</h2>
                <a href="/about">About</a>
                <a href="{}/gone">Gone</a>
            </body></html>"#,
            external_base(&uri)
        )))
        .mount(&server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let env = TestEnv::new();
    let added = env.service.add_url(&format!("{}/", uri)).await.unwrap();
    assert_eq!(added.page.url, uri);

    let outcome = env
        .dispatcher
        .dispatch_next(Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(outcome, Some(JobOutcome::Done));

    let page = env.storage.get(added.page.id).unwrap().unwrap();
    assert_eq!(page.status, PageStatus::Done);
    assert_eq!(page.title.as_deref(), Some("Gauge Test"));
    assert_eq!(page.error_message, None);

    let stored = env.storage.get_by_page(page.id).unwrap().unwrap();
    assert_eq!(stored.result.headings.h1, 3);
    assert_eq!(stored.result.headings.h2, 1);
    assert_eq!(stored.result.internal_links, 1);
    assert_eq!(stored.result.external_links, 1);
    assert_eq!(stored.result.broken_links.len(), 1);
    assert!(stored.result.broken_links[0].url.ends_with("/gone"));
}

#[tokio::test]
async fn test_failed_fetch_records_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let env = TestEnv::new();
    let added = env.service.add_url(&server.uri()).await.unwrap();

    let outcome = env
        .dispatcher
        .dispatch_next(Duration::from_secs(1))
        .await
        .unwrap();
    assert!(matches!(outcome, Some(JobOutcome::Failed(_))));

    let page = env.storage.get(added.page.id).unwrap().unwrap();
    assert_eq!(page.status, PageStatus::Error);
    assert!(page.error_message.as_deref().unwrap().contains("503"));

    let stored = env.storage.get_by_page(page.id).unwrap().unwrap();
    assert!(stored.result.error_message.is_some());
    assert!(stored.result.broken_links.is_empty());
}

#[tokio::test]
async fn test_stop_before_dequeue() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html("<h1>unused</h1>"))
        .expect(0)
        .mount(&server)
        .await;

    let env = TestEnv::new();
    let added = env.service.add_url(&server.uri()).await.unwrap();
    env.service.stop(&[added.page.id]).await.unwrap();

    let outcome = env
        .dispatcher
        .dispatch_next(Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(outcome, Some(JobOutcome::Skipped(SkipReason::Cancelled)));

    let page = env.storage.get(added.page.id).unwrap().unwrap();
    assert_eq!(page.status, PageStatus::Stopped);
    assert!(env.storage.get_by_page(page.id).unwrap().is_none());
}

#[tokio::test]
async fn test_stop_during_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<h1>slow</h1>").set_delay(Duration::from_millis(600)))
        .mount(&server)
        .await;

    let env = TestEnv::new();
    let added = env
        .service
        .add_url(&format!("{}/slow", server.uri()))
        .await
        .unwrap();
    let page_id = added.page.id;

    let dispatcher = env.dispatcher.clone();
    let crawl = tokio::spawn(async move { dispatcher.dispatch_next(Duration::from_secs(1)).await });

    assert!(wait_for_status(&env, page_id, PageStatus::Running).await);
    env.service.stop(&[page_id]).await.unwrap();

    let outcome = crawl.await.unwrap().unwrap();
    assert_eq!(outcome, Some(JobOutcome::Stopped));

    let page = env.storage.get(page_id).unwrap().unwrap();
    assert_eq!(page.status, PageStatus::Stopped);
    assert_eq!(page.error_message, None);

    let stored = env.storage.get_by_page(page_id).unwrap().unwrap();
    assert_eq!(stored.result.error_message.as_deref(), Some("crawl stopped"));
    assert!(stored.result.broken_links.is_empty());
}

#[tokio::test]
async fn test_add_and_recrawl_are_idempotent() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/old-gone">old</a>"#))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/new-gone">new</a>"#))
        .mount(&server)
        .await;

    for gone in ["/old-gone", "/new-gone"] {
        Mock::given(method("HEAD"))
            .and(path(gone))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;
    }

    let env = TestEnv::new();
    let first = env.service.add_url(&uri).await.unwrap();
    let second = env.service.add_url(&format!("{}/", uri)).await.unwrap();
    assert_eq!(first.page.id, second.page.id);
    assert_eq!(env.storage.count_total_pages().unwrap(), 1);

    let wait = Duration::from_secs(1);
    assert_eq!(
        env.dispatcher.dispatch_next(wait).await.unwrap(),
        Some(JobOutcome::Done)
    );
    let before = env.storage.get_by_page(first.page.id).unwrap().unwrap();
    assert!(before.result.broken_links[0].url.ends_with("/old-gone"));

    env.service.recrawl(&[first.page.id]).await.unwrap();
    assert_eq!(
        env.dispatcher.dispatch_next(wait).await.unwrap(),
        Some(JobOutcome::Done)
    );

    let after = env.storage.get_by_page(first.page.id).unwrap().unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.result.broken_links.len(), 1);
    assert!(after.result.broken_links[0].url.ends_with("/new-gone"));
    assert_eq!(env.storage.count_broken_links().unwrap(), 1);
    assert_eq!(env.storage.count_total_pages().unwrap(), 1);
}

#[tokio::test]
async fn test_workers_recover_interrupted_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<title>Recovered</title>"))
        .mount(&server)
        .await;

    let env = TestEnv::new();
    let page = env.storage.create(&server.uri()).unwrap();
    env.storage
        .update_status(page.id, PageStatus::Running, None)
        .unwrap();
    assert_eq!(env.queue.pending_jobs().await.unwrap(), 0);

    let workers = spawn_workers(env.dispatcher.clone(), 2).await.unwrap();
    assert_eq!(workers.worker_count(), 2);

    assert!(wait_for_status(&env, page.id, PageStatus::Done).await);
    assert!(workers.shutdown(Duration::from_secs(2)).await);

    let page = env.storage.get(page.id).unwrap().unwrap();
    assert_eq!(page.title.as_deref(), Some("Recovered"));
}
