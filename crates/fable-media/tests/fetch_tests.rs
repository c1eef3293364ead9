//! Integration tests for the secure fetcher against a local HTTP fixture.

use fable_media::{DownloadError, FetchLimits, SecureFetcher, TempResourceScope};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LIMITS: FetchLimits = FetchLimits { max_bytes: 1024 };

async fn fixture_server(body: Vec<u8>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/song.mp3"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(body),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_fetch_under_ceiling_succeeds() {
    let server = fixture_server(vec![7u8; 512]).await;
    let fetcher = SecureFetcher::allowing_loopback().unwrap();
    let scope = TempResourceScope::create("fetch-ok").unwrap();
    let dest = scope.file_path("song.mp3");

    let outcome = fetcher
        .fetch(&format!("{}/song.mp3", server.uri()), &dest, LIMITS)
        .await
        .unwrap();

    assert_eq!(outcome.bytes_written, 512);
    assert_eq!(outcome.content_type.as_deref(), Some("audio/mpeg"));
    assert_eq!(std::fs::read(&dest).unwrap().len(), 512);
}

#[tokio::test]
async fn test_fetch_over_ceiling_fails_and_deletes_partial() {
    let server = fixture_server(vec![7u8; 4096]).await;
    let fetcher = SecureFetcher::allowing_loopback().unwrap();
    let scope = TempResourceScope::create("fetch-big").unwrap();
    let dest = scope.file_path("song.mp3");

    let err = fetcher
        .fetch(&format!("{}/song.mp3", server.uri()), &dest, LIMITS)
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::TooLarge { limit: 1024 }));
    assert!(!dest.exists(), "partial file must be deleted");
}

#[tokio::test]
async fn test_upstream_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.mp3"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fetcher = SecureFetcher::allowing_loopback().unwrap();
    let scope = TempResourceScope::create("fetch-503").unwrap();

    let err = fetcher
        .fetch(
            &format!("{}/gone.mp3", server.uri()),
            scope.file_path("x"),
            LIMITS,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::UpstreamStatus(503)));
}

#[tokio::test]
async fn test_redirect_to_private_address_is_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/moved.mp3"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "http://192.168.1.1/evil.mp3"),
        )
        .mount(&server)
        .await;

    let fetcher = SecureFetcher::allowing_loopback().unwrap();
    let scope = TempResourceScope::create("fetch-redir").unwrap();
    let dest = scope.file_path("x");

    let err = fetcher
        .fetch(&format!("{}/moved.mp3", server.uri()), &dest, LIMITS)
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::BlockedHost(_)));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_single_valid_redirect_is_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/moved.mp3"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/song.mp3"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/song.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 16]))
        .mount(&server)
        .await;

    let fetcher = SecureFetcher::allowing_loopback().unwrap();
    let scope = TempResourceScope::create("fetch-redir-ok").unwrap();
    let dest = scope.file_path("song.mp3");

    let outcome = fetcher
        .fetch(&format!("{}/moved.mp3", server.uri()), &dest, LIMITS)
        .await
        .unwrap();

    assert_eq!(outcome.bytes_written, 16);
}

#[tokio::test]
async fn test_redirect_chain_is_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.mp3"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/b.mp3"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.mp3"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/c.mp3"))
        .mount(&server)
        .await;

    let fetcher = SecureFetcher::allowing_loopback().unwrap();
    let scope = TempResourceScope::create("fetch-chain").unwrap();

    let err = fetcher
        .fetch(
            &format!("{}/a.mp3", server.uri()),
            scope.file_path("x"),
            LIMITS,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::UpstreamStatus(302)));
}

#[tokio::test]
async fn test_strict_fetcher_blocks_loopback_fixture() {
    let server = fixture_server(vec![1u8; 4]).await;
    let fetcher = SecureFetcher::new().unwrap();
    let scope = TempResourceScope::create("fetch-strict").unwrap();

    let err = fetcher
        .fetch(
            &format!("{}/song.mp3", server.uri()),
            scope.file_path("x"),
            LIMITS,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::BlockedHost(_)));
}
