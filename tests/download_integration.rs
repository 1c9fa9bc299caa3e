//! Integration tests for the download manager.
//!
//! These tests verify fetch outcomes and store contents against mock servers.

mod support;

use std::sync::Arc;
use std::time::Duration;

use harvester_core::download::{DownloadManager, HttpClient, NoopProgress, RateLimiter, RetryPolicy};
use harvester_core::store::DocumentStore;
use harvester_core::target::{DownloadOutcome, DownloadTarget};
use support::socket_guard::start_mock_server_or_skip;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(5), Duration::from_millis(20), 2.0)
}

async fn manager(temp: &TempDir) -> DownloadManager {
    let store = DocumentStore::open(temp.path().join("labels"))
        .await
        .expect("store should open");
    DownloadManager::new(
        HttpClient::new().expect("client should build"),
        store,
        fast_retry(),
        Arc::new(RateLimiter::disabled()),
    )
}

fn target(server: &MockServer, file: &str) -> DownloadTarget {
    let url = Url::parse(&format!("{}/files/{file}", server.uri())).expect("valid url");
    DownloadTarget::from_document_url(url).expect("url has a file name")
}

#[tokio::test]
async fn test_fetch_preserves_content_under_derived_name() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let content = b"%PDF-1.7\nlabel body\n%%EOF".to_vec();
    Mock::given(method("GET"))
        .and(path("/files/ABC123.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().expect("failed to create temp dir");
    let manager = manager(&temp).await;
    let outcome = manager.fetch(&target(&server, "ABC123.pdf"), &NoopProgress).await;

    let DownloadOutcome::Success { path, bytes, fetched } = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert!(fetched);
    assert_eq!(bytes, content.len() as u64);
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("ABC123.pdf"));
    assert_eq!(std::fs::read(&path).expect("file readable"), content);
}

#[tokio::test]
async fn test_second_fetch_makes_no_request() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/files/ABC123.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().expect("failed to create temp dir");
    let manager = manager(&temp).await;
    let target = target(&server, "ABC123.pdf");

    assert!(manager.fetch(&target, &NoopProgress).await.is_success());
    let second = manager.fetch(&target, &NoopProgress).await;
    assert!(second.was_already_present());
}

#[tokio::test]
async fn test_not_found_is_not_a_failure_and_leaves_no_file() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/files/GONE.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().expect("failed to create temp dir");
    let manager = manager(&temp).await;
    let outcome = manager.fetch(&target(&server, "GONE.pdf"), &NoopProgress).await;

    assert!(matches!(outcome, DownloadOutcome::NotFound { .. }));
    let store = manager.store();
    assert!(!store.contains("GONE.pdf").await.expect("lookup"));
    let leftovers = std::fs::read_dir(store.root()).expect("read store").count();
    assert_eq!(leftovers, 0, "no temp or final file should remain");
}

#[tokio::test]
async fn test_forbidden_fails_without_retry() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/files/LOCKED.pdf"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().expect("failed to create temp dir");
    let manager = manager(&temp).await;
    let outcome = manager.fetch(&target(&server, "LOCKED.pdf"), &NoopProgress).await;

    let DownloadOutcome::Failed { error, attempts } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(attempts, 1);
    assert_eq!(error.status(), Some(403));
}

#[tokio::test]
async fn test_rate_limited_then_success_honours_retry_after() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/files/BUSY.pdf"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/BUSY.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
        .mount(&server)
        .await;

    let temp = TempDir::new().expect("failed to create temp dir");
    let manager = manager(&temp).await;
    let outcome = manager.fetch(&target(&server, "BUSY.pdf"), &NoopProgress).await;
    assert!(outcome.is_success(), "expected success, got {outcome:?}");
}

#[tokio::test]
async fn test_store_never_holds_truncated_file_after_failure() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/files/SLOW.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![1_u8; 1024])
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let temp = TempDir::new().expect("failed to create temp dir");
    let store = DocumentStore::open(temp.path()).await.expect("store");
    let manager = DownloadManager::new(
        HttpClient::with_timeouts(1, 1, None).expect("client"),
        store.clone(),
        RetryPolicy::no_retry(),
        Arc::new(RateLimiter::disabled()),
    );
    let outcome = manager.fetch(&target(&server, "SLOW.pdf"), &NoopProgress).await;

    assert!(matches!(outcome, DownloadOutcome::Failed { .. }));
    assert!(!store.contains("SLOW.pdf").await.expect("lookup"));
}
