#![allow(clippy::unwrap_used, reason = "tests can use unwrap()")]

use super::*;
use std::io::Write as _;
use std::path::Path;

const DATE: &str = "2024-05-01";

fn target(base_url: &str, dir: &Path, identifier: &str) -> DownloadTarget {
    DownloadTarget::new(base_url, dir, DATE, identifier)
}

#[test]
fn test_client_creation() {
    let client = FeedClient::new("key", None).unwrap();
    assert_eq!(client.authorization, "Basic key:key");
    assert_eq!(client.timeout, None);

    let client = FeedClient::new("key", Some(Duration::from_secs(3))).unwrap();
    assert_eq!(client.timeout, Some(Duration::from_secs(3)));
}

#[test]
fn test_auth_header_is_sensitive() {
    let client = FeedClient::new("key", None).unwrap();
    let header = client.auth_header("http://h/").unwrap();
    assert!(header.is_sensitive());
    assert_eq!(header.to_str().unwrap(), "Basic key:key");
}

#[test]
fn test_fetch_error_stages() {
    let err = FetchError::Request {
        url: "u".to_owned(),
        reason: "r".to_owned(),
    };
    assert_eq!(err.stage(), Stage::Request);
    assert_eq!(FetchError::Status(StatusCode::NOT_FOUND).stage(), Stage::Status);
    assert_eq!(
        FetchError::Status(StatusCode::NOT_FOUND).to_string(),
        "404 Not Found"
    );

    let err = FetchError::CreateFile {
        path: PathBuf::from("/x/y.gz"),
        source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
    };
    assert_eq!(err.stage(), Stage::CreateFile);
    assert!(err.to_string().contains("/x/y.gz"));

    let err = FetchError::Copy {
        path: PathBuf::from("/x/y.gz"),
        source: io::Error::other("disk full"),
    };
    assert_eq!(err.stage(), Stage::Copy);
    assert!(err.to_string().contains("disk full"));
}

#[tokio::test]
async fn test_download_writes_body_with_literal_auth_header() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    let body: Vec<u8> = (0..=255_u8).cycle().take(64 * 1024).collect();
    let mock = server
        .mock("GET", "/feeds/tidf.2024-05-01.daily.deny-ips.v4.gz")
        .match_header("authorization", "Basic s3cret:s3cret")
        .with_status(200)
        .with_body(&body)
        .expect(1)
        .create_async()
        .await;

    let client = FeedClient::new("s3cret", None).unwrap();
    let base = format!("{}/feeds/", server.url());
    let target = target(&base, dir.path(), "deny-ips.v4");

    let written = client.download(&target).await.unwrap();

    mock.assert_async().await;
    assert_eq!(written, body.len() as u64);
    assert_eq!(std::fs::read(&target.local_path).unwrap(), body);
}

#[tokio::test]
async fn test_download_truncates_existing_file() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    let _mock = server
        .mock("GET", "/tidf.2024-05-01.daily.hosts.gz")
        .with_status(200)
        .with_body("new")
        .create_async()
        .await;

    let client = FeedClient::new("k", None).unwrap();
    let target = target(&format!("{}/", server.url()), dir.path(), "hosts");
    std::fs::write(&target.local_path, "much older and longer content").unwrap();

    client.download(&target).await.unwrap();
    assert_eq!(std::fs::read_to_string(&target.local_path).unwrap(), "new");
}

#[tokio::test]
async fn test_non_success_status_creates_no_file() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    for (identifier, status) in [("missing", 404), ("denied", 401), ("limited", 429), ("broken", 500)] {
        let mock = server
            .mock("GET", format!("/tidf.2024-05-01.daily.{identifier}.gz").as_str())
            .with_status(status)
            .with_body("error page")
            .expect(1)
            .create_async()
            .await;

        let client = FeedClient::new("k", None).unwrap();
        let target = target(&format!("{}/", server.url()), dir.path(), identifier);

        let err = client.download(&target).await.unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.stage(), Stage::Status);
        assert!(matches!(err, FetchError::Status(s) if s.as_u16() == status as u16));
        assert!(!target.local_path.exists());
    }
}

#[tokio::test]
async fn test_transport_error() {
    // Port 1 is reserved and nothing listens on it
    let dir = tempfile::tempdir().unwrap();
    let client = FeedClient::new("k", Some(Duration::from_secs(5))).unwrap();
    let target = target("http://127.0.0.1:1/", dir.path(), "hosts");

    let err = client.download(&target).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Transport);
    assert!(!target.local_path.exists());
}

#[tokio::test]
async fn test_invalid_url_is_request_error() {
    let dir = tempfile::tempdir().unwrap();
    let client = FeedClient::new("k", None).unwrap();
    let target = target("not a url/", dir.path(), "hosts");

    let err = client.download(&target).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Request);
    assert!(err.to_string().contains("not a url/"));
}

#[tokio::test]
async fn test_non_http_scheme_is_request_error() {
    let dir = tempfile::tempdir().unwrap();
    let client = FeedClient::new("k", None).unwrap();
    let target = target("ftp://example.invalid/", dir.path(), "hosts");

    let err = client.download(&target).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Request);
    assert!(err.to_string().contains("unsupported scheme 'ftp'"));
    assert!(!target.local_path.exists());
}

#[tokio::test]
async fn test_body_failure_is_copy_error_and_keeps_partial_file() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    let _mock = server
        .mock("GET", "/tidf.2024-05-01.daily.hosts.gz")
        .with_status(200)
        .with_chunked_body(|w| {
            w.write_all(b"partial")?;
            Err(io::Error::other("connection dropped"))
        })
        .create_async()
        .await;

    let client = FeedClient::new("k", None).unwrap();
    let target = target(&format!("{}/", server.url()), dir.path(), "hosts");

    let err = client.download(&target).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Copy);
    assert!(target.local_path.exists());
    assert_eq!(std::fs::read(&target.local_path).unwrap(), b"partial");
}

#[tokio::test]
async fn test_invalid_credential_is_request_error() {
    let dir = tempfile::tempdir().unwrap();
    let client = FeedClient::new("bad\nkey", None).unwrap();
    let target = target("http://127.0.0.1:1/", dir.path(), "hosts");

    let err = client.download(&target).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Request);
    assert!(!err.to_string().contains("bad\nkey"));
}

#[tokio::test]
async fn test_create_file_error() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    let _mock = server
        .mock("GET", "/tidf.2024-05-01.daily.hosts.gz")
        .with_status(200)
        .with_body("data")
        .create_async()
        .await;

    let client = FeedClient::new("k", None).unwrap();
    let missing_dir = dir.path().join("does-not-exist");
    let target = target(&format!("{}/", server.url()), &missing_dir, "hosts");

    let err = client.download(&target).await.unwrap_err();

    assert_eq!(err.stage(), Stage::CreateFile);
    assert!(!missing_dir.exists());
}
