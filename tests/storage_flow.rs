//! End-to-end tests for the blob API against mocked Azure endpoints.
//!
//! A mock instance metadata service stands in for the managed identity
//! source at the end of the credential chain, and a mock blob endpoint
//! stands in for the storage account. Stub `az` and `azd` executables are
//! placed first on PATH so the chain falls through to managed identity no
//! matter what is installed on the host.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;

use common::{
    dev_config, isolate_cli_tools, start_mock_imds, start_mock_storage, start_portal, TestPortal,
};

fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("failed to build test client")
}

/// Boot a portal wired to fresh storage and metadata mocks. Returns the
/// portal and the counter of tokens the metadata mock has issued.
async fn storage_portal() -> (TestPortal, Arc<AtomicUsize>) {
    isolate_cli_tools();
    let (imds_addr, issued) = start_mock_imds().await;
    let storage_addr = start_mock_storage().await;

    let mut config = dev_config();
    config.credentials.imds_endpoint = format!("http://{imds_addr}");
    config.storage.endpoint = Some(format!("http://{storage_addr}"));

    (start_portal(config).await, issued)
}

async fn upload(
    client: &reqwest::Client,
    portal: &TestPortal,
    name: &str,
    content_type: &str,
    data: &[u8],
) -> reqwest::Response {
    let part = reqwest::multipart::Part::bytes(data.to_vec())
        .file_name(name.to_string())
        .mime_str(content_type)
        .expect("invalid content type");
    let form = reqwest::multipart::Form::new().part("file", part);
    client
        .post(portal.url("/api/blobs"))
        .multipart(form)
        .send()
        .await
        .expect("upload request failed")
}

#[tokio::test]
async fn test_blob_round_trip() {
    let (portal, issued) = storage_portal().await;
    let client = test_client();
    let content = b"hello blob portal";

    // Upload.
    let response = upload(&client, &portal, "greeting.txt", "text/plain", content).await;
    assert_eq!(response.status(), 201, "upload should succeed");
    let uploaded: serde_json::Value = response.json().await.unwrap();
    assert_eq!(uploaded[0]["name"], "greeting.txt");
    assert_eq!(uploaded[0]["size"], content.len() as u64);

    // The listing reflects it.
    let response = client.get(portal.url("/api/blobs")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let blobs: serde_json::Value = response.json().await.unwrap();
    let blobs = blobs.as_array().expect("listing should be an array");
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0]["name"], "greeting.txt");
    assert_eq!(blobs[0]["size"], content.len() as u64);
    assert_eq!(blobs[0]["content_type"], "text/plain");

    // Download returns the stored bytes and headers.
    let response = client
        .get(portal.url("/api/blobs/greeting.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("text/plain")
    );
    assert_eq!(
        response
            .headers()
            .get("content-disposition")
            .and_then(|v| v.to_str().ok()),
        Some("attachment; filename=\"greeting.txt\"")
    );
    let body = response.bytes().await.unwrap();
    assert_eq!(&body[..], content);

    // Delete, then the blob is gone.
    let response = client
        .delete(portal.url("/api/blobs/greeting.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = client
        .get(portal.url("/api/blobs/greeting.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    let detail = body["error"].as_str().unwrap_or_default();
    assert!(
        detail.contains("BlobNotFound"),
        "development detail should carry the service code, got: {detail}"
    );

    let response = client.get(portal.url("/api/blobs")).send().await.unwrap();
    let blobs: serde_json::Value = response.json().await.unwrap();
    assert_eq!(blobs.as_array().map(Vec::len), Some(0));

    // One token covered the whole session.
    assert_eq!(
        issued.load(Ordering::SeqCst),
        1,
        "a cached token should be reused across operations"
    );

    portal.shutdown.trigger();
}

#[tokio::test]
async fn test_listing_honors_prefix() {
    let (portal, _issued) = storage_portal().await;
    let client = test_client();

    let response = upload(&client, &portal, "notes/a.txt", "text/plain", b"a").await;
    assert_eq!(response.status(), 201);
    let response = upload(&client, &portal, "b.txt", "text/plain", b"b").await;
    assert_eq!(response.status(), 201);

    let response = client
        .get(portal.url("/api/blobs?prefix=notes/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let blobs: serde_json::Value = response.json().await.unwrap();
    let blobs = blobs.as_array().expect("listing should be an array");
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0]["name"], "notes/a.txt");

    portal.shutdown.trigger();
}

#[tokio::test]
async fn test_container_creation_reports_existing() {
    let (portal, _issued) = storage_portal().await;
    let client = test_client();

    let response = client
        .post(portal.url("/api/container"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["container"], "uploads");
    assert_eq!(body["created"], true);

    let response = client
        .post(portal.url("/api/container"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200, "an existing container is not an error");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["created"], false);

    portal.shutdown.trigger();
}

#[tokio::test]
async fn test_upload_without_file_field_is_rejected() {
    let (portal, _issued) = storage_portal().await;
    let client = test_client();

    let form = reqwest::multipart::Form::new().text("note", "no file here");
    let response = client
        .post(portal.url("/api/blobs"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    let detail = body["error"].as_str().unwrap_or_default();
    assert!(
        detail.contains("file"),
        "rejection should name the expected field, got: {detail}"
    );

    portal.shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_requests_share_one_token() {
    let (portal, issued) = storage_portal().await;
    let client = test_client();

    let requests = (0..8).map(|_| client.get(portal.url("/api/blobs")).send());
    let responses = join_all(requests).await;
    for response in responses {
        assert_eq!(response.unwrap().status(), 200);
    }
    assert_eq!(
        issued.load(Ordering::SeqCst),
        1,
        "concurrent first requests must not stampede the credential chain"
    );

    portal.shutdown.trigger();
}
