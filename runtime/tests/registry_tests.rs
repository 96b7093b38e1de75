//! Registry client tests against a mock registry.

use burrow_core::config::RegistryConfig;
use burrow_core::error::BurrowError;
use burrow_runtime::{ImageReference, RegistryClient};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const ACCEPT: &str =
    "application/vnd.docker.distribution.manifest.v2+json, application/vnd.oci.image.manifest.v1+json";

fn client_for(server: &MockServer) -> RegistryClient {
    RegistryClient::new(RegistryConfig {
        auth_url: format!("{}/token", server.uri()),
        registry_url: server.uri(),
        ..Default::default()
    })
    .unwrap()
}

fn alpine() -> ImageReference {
    ImageReference::parse("library/alpine").unwrap()
}

fn accepts_manifests(req: &Request) -> bool {
    req.headers
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == ACCEPT)
}

fn image_manifest(layers: &[&str]) -> String {
    json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "config": {
            "mediaType": "application/vnd.docker.container.image.v1+json",
            "size": 1469,
            "digest": "sha256:config"
        },
        "layers": layers.iter().map(|d| json!({
            "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
            "size": 100,
            "digest": d
        })).collect::<Vec<_>>()
    })
    .to_string()
}

#[tokio::test]
async fn test_fetch_auth_token_extracts_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/token"))
        .and(query_param("service", "registry.docker.io"))
        .and(query_param("scope", "repository:library/alpine:pull"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"token":"abc123"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let token = client_for(&server).fetch_auth_token(&alpine()).await.unwrap();
    assert_eq!(token, "abc123");
}

#[tokio::test]
async fn test_fetch_auth_token_missing_field() {
    let server = MockServer::start().await;
    Mock::given(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"details":"nope"}"#))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_auth_token(&alpine()).await.unwrap_err();
    assert!(matches!(err, BurrowError::Auth(_)));
}

#[tokio::test]
async fn test_fetch_auth_token_http_failure() {
    let server = MockServer::start().await;
    Mock::given(path("/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_auth_token(&alpine()).await.unwrap_err();
    assert!(matches!(err, BurrowError::Protocol { status: 401, .. }));
}

#[tokio::test]
async fn test_fetch_manifest_sends_accept_and_bearer() {
    let server = MockServer::start().await;
    let body = image_manifest(&["sha256:aaa"]);
    Mock::given(method("GET"))
        .and(path("/v2/library/alpine/manifests/latest"))
        .and(header("authorization", "Bearer abc123"))
        .and(accepts_manifests)
        .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server)
        .fetch_manifest(&alpine(), Some("abc123"))
        .await
        .unwrap();
    assert_eq!(text, body);
}

#[tokio::test]
async fn test_fetch_manifest_list_selects_first_entry() {
    let server = MockServer::start().await;
    let list = json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.list.v2+json",
        "manifests": [
            {"digest": "sha256:first", "mediaType": "m", "platform": {"architecture": "s390x", "os": "linux"}},
            {"digest": "sha256:second", "mediaType": "m", "platform": {"architecture": "amd64", "os": "linux"}}
        ]
    });
    let resolved = image_manifest(&["sha256:aaa"]);

    Mock::given(path("/v2/library/alpine/manifests/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list.to_string()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/v2/library/alpine/manifests/sha256:first"))
        .and(header("authorization", "Bearer t"))
        .respond_with(ResponseTemplate::new(200).set_body_string(resolved.clone()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/v2/library/alpine/manifests/sha256:second"))
        .respond_with(ResponseTemplate::new(200).set_body_string(resolved.clone()))
        .expect(0)
        .mount(&server)
        .await;

    let text = client_for(&server)
        .fetch_manifest(&alpine(), Some("t"))
        .await
        .unwrap();
    assert_eq!(text, resolved);
}

#[tokio::test]
async fn test_fetch_manifest_empty_list_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(path("/v2/library/alpine/manifests/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"manifests":[]}"#))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch_manifest(&alpine(), Some("t"))
        .await
        .unwrap_err();
    assert!(matches!(err, BurrowError::Parse(_)));
}

#[tokio::test]
async fn test_fetch_manifest_not_found() {
    let server = MockServer::start().await;
    Mock::given(path("/v2/library/alpine/manifests/latest"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch_manifest(&alpine(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, BurrowError::Protocol { status: 404, .. }));
}

#[tokio::test]
async fn test_fetch_blob_streams_to_indexed_file() {
    let server = MockServer::start().await;
    Mock::given(path("/v2/library/alpine/blobs/sha256:aaa"))
        .and(header("authorization", "Bearer t"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"layer-bytes".to_vec()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&server);
    let url = client.blob_url(&alpine(), "sha256:aaa");

    let first = client
        .fetch_blob(&url, Some("t"), dir.path(), "downloaded_file")
        .await
        .unwrap();
    let second = client
        .fetch_blob(&url, Some("t"), dir.path(), "downloaded_file")
        .await
        .unwrap();

    assert_eq!(first, dir.path().join("downloaded_file_0.tar"));
    assert_eq!(second, dir.path().join("downloaded_file_1.tar"));
    assert_eq!(std::fs::read(&first).unwrap(), b"layer-bytes");
}

#[tokio::test]
async fn test_fetch_blob_follows_one_redirect() {
    let server = MockServer::start().await;
    Mock::given(path("/v2/library/alpine/blobs/sha256:aaa"))
        .respond_with(
            ResponseTemplate::new(307)
                .insert_header("Location", format!("{}/storage/aaa", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/storage/aaa"))
        .and(header("authorization", "Bearer t"))
        .and(accepts_manifests)
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"from-storage".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&server);
    let url = client.blob_url(&alpine(), "sha256:aaa");
    let archive = client
        .fetch_blob(&url, Some("t"), dir.path(), "downloaded_file")
        .await
        .unwrap();

    assert_eq!(std::fs::read(archive).unwrap(), b"from-storage");
}

#[tokio::test]
async fn test_fetch_blob_relative_redirect_keeps_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(path("/v2/library/alpine/blobs/sha256:aaa"))
        .respond_with(ResponseTemplate::new(307).insert_header("Location", "/storage/aaa"))
        .mount(&server)
        .await;
    Mock::given(path("/storage/aaa"))
        .and(header("authorization", "Bearer t"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"protected".to_vec()))
        .mount(&server)
        .await;
    Mock::given(path("/storage/aaa"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&server);
    let url = client.blob_url(&alpine(), "sha256:aaa");
    let archive = client
        .fetch_blob(&url, Some("t"), dir.path(), "downloaded_file")
        .await
        .unwrap();

    assert_eq!(std::fs::read(archive).unwrap(), b"protected");
}

#[tokio::test]
async fn test_fetch_blob_redirect_without_location() {
    let server = MockServer::start().await;
    Mock::given(path("/v2/library/alpine/blobs/sha256:aaa"))
        .respond_with(ResponseTemplate::new(307))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&server);
    let url = client.blob_url(&alpine(), "sha256:aaa");
    let err = client
        .fetch_blob(&url, Some("t"), dir.path(), "downloaded_file")
        .await
        .unwrap_err();

    assert!(matches!(err, BurrowError::Protocol { status: 307, ref url } if url.ends_with("/blobs/sha256:aaa")));
    assert!(!dir.path().join("downloaded_file_0.tar").exists());
}

#[tokio::test]
async fn test_fetch_blob_does_not_follow_second_redirect() {
    let server = MockServer::start().await;
    Mock::given(path("/v2/library/alpine/blobs/sha256:aaa"))
        .respond_with(
            ResponseTemplate::new(307)
                .insert_header("Location", format!("{}/hop1", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(path("/hop1"))
        .respond_with(
            ResponseTemplate::new(307)
                .insert_header("Location", format!("{}/hop2", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/hop2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&server);
    let url = client.blob_url(&alpine(), "sha256:aaa");
    let err = client
        .fetch_blob(&url, Some("t"), dir.path(), "downloaded_file")
        .await
        .unwrap_err();

    assert!(matches!(err, BurrowError::Protocol { status: 307, .. }));
}

#[tokio::test]
async fn test_fetch_blob_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(path("/v2/library/alpine/blobs/sha256:aaa"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&server);
    let url = client.blob_url(&alpine(), "sha256:aaa");
    let err = client
        .fetch_blob(&url, None, dir.path(), "downloaded_file")
        .await
        .unwrap_err();

    assert!(matches!(err, BurrowError::Protocol { status: 500, .. }));
    assert!(!dir.path().join("downloaded_file_0.tar").exists());
}
