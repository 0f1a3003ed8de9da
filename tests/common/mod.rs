//! Shared helpers for integration tests.
//!
//! Provides a mock instance metadata service that issues bearer tokens, a
//! mock blob storage endpoint backed by an in-memory map, stub CLI tools
//! that keep the credential chain off the host's real ones, and a helper
//! that boots the portal on an ephemeral port with a programmable
//! configuration.

use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use tokio::net::TcpListener;

use blob_portal::config::{AppConfig, Environment};
use blob_portal::http::HttpServer;
use blob_portal::lifecycle::Shutdown;

/// Bearer token issued by the mock metadata service and required by the
/// mock storage endpoint.
pub const TEST_TOKEN: &str = "integration-test-token";

/// A portal instance running against ephemeral ports.
pub struct TestPortal {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestPortal {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Boots the portal with the given configuration on an ephemeral port and
/// returns its address together with the shutdown handle. Dropping the
/// handle without triggering it also stops the server.
pub async fn start_portal(config: AppConfig) -> TestPortal {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind portal listener");
    let addr = listener.local_addr().expect("listener has no local addr");

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let client = reqwest::Client::new();
    let server = HttpServer::new(Arc::new(config), client);
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });

    TestPortal { addr, shutdown }
}

/// Base configuration for tests: development environment, metrics disabled,
/// and an instance metadata endpoint pointing at a closed local port so the
/// credential chain fails fast unless a mock is wired in.
pub fn dev_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.environment = Environment::Development;
    config.observability.metrics_enabled = false;
    config.credentials.imds_endpoint = "http://127.0.0.1:1".to_string();
    config.credentials.imds_timeout_secs = 1;
    config
}

#[allow(dead_code)]
pub fn prod_config() -> AppConfig {
    let mut config = dev_config();
    config.environment = Environment::Production;
    config
}

/// Places stub `az` and `azd` executables first on PATH so both CLI
/// credential sources answer "not logged in" no matter what the host has
/// installed. The credential chain then always falls through to the mock
/// metadata service.
#[allow(dead_code)]
pub fn isolate_cli_tools() {
    static INIT: Once = Once::new();
    INIT.call_once(install_stub_tools);
}

#[cfg(unix)]
#[allow(dead_code)]
fn install_stub_tools() {
    use std::os::unix::fs::PermissionsExt;
    use std::sync::OnceLock;

    // Keeps the directory alive for the rest of the test process.
    static STUB_DIR: OnceLock<tempfile::TempDir> = OnceLock::new();

    let dir = tempfile::tempdir().expect("failed to create stub tool dir");
    for (tool, message) in [
        ("az", "ERROR: Please run 'az login' to setup account."),
        ("azd", "Error: not logged in, run azd auth login to log in."),
    ] {
        let path = dir.path().join(tool);
        let script = format!("#!/bin/sh\necho \"{message}\" >&2\nexit 1\n");
        std::fs::write(&path, script).expect("failed to write stub tool");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to mark stub tool executable");
    }

    let path = match std::env::var("PATH") {
        Ok(current) => format!("{}:{current}", dir.path().display()),
        Err(_) => dir.path().display().to_string(),
    };
    std::env::set_var("PATH", path);
    let _ = STUB_DIR.set(dir);
}

#[cfg(not(unix))]
#[allow(dead_code)]
fn install_stub_tools() {}

#[derive(Clone)]
struct ImdsState {
    issued: Arc<AtomicUsize>,
}

/// Starts a mock instance metadata service that answers the managed identity
/// token route. Returns its address and a counter of issued tokens.
#[allow(dead_code)]
pub async fn start_mock_imds() -> (SocketAddr, Arc<AtomicUsize>) {
    let issued = Arc::new(AtomicUsize::new(0));
    let state = ImdsState {
        issued: issued.clone(),
    };
    let app = Router::new()
        .route("/metadata/identity/oauth2/token", get(imds_token))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock metadata listener");
    let addr = listener.local_addr().expect("listener has no local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, issued)
}

async fn imds_token(
    State(state): State<ImdsState>,
    headers: HeaderMap,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    let metadata = headers
        .get("Metadata")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if metadata != "true" {
        return (StatusCode::BAD_REQUEST, "missing Metadata header").into_response();
    }
    let resource = match params.get("resource") {
        Some(resource) => resource.clone(),
        None => return (StatusCode::BAD_REQUEST, "missing resource").into_response(),
    };

    state.issued.fetch_add(1, Ordering::SeqCst);
    let expires_on = Utc::now().timestamp() + 3600;
    Json(json!({
        "access_token": TEST_TOKEN,
        "expires_on": expires_on.to_string(),
        "resource": resource,
        "token_type": "Bearer",
    }))
    .into_response()
}

#[derive(Default)]
struct StorageState {
    containers: HashSet<String>,
    blobs: BTreeMap<String, StoredBlob>,
}

struct StoredBlob {
    data: Bytes,
    content_type: String,
}

#[derive(Clone, Default)]
struct MockStorage {
    state: Arc<Mutex<StorageState>>,
}

/// Starts a mock blob storage endpoint that implements the container and
/// blob routes used by the portal. Every request must carry the bearer
/// token issued by the mock metadata service.
#[allow(dead_code)]
pub async fn start_mock_storage() -> SocketAddr {
    let app = Router::new()
        .route("/{container}", get(list_blobs).put(create_container))
        .route(
            "/{container}/{*name}",
            get(get_blob).put(put_blob).delete(delete_blob),
        )
        .with_state(MockStorage::default());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock storage listener");
    let addr = listener.local_addr().expect("listener has no local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    addr
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bearer {TEST_TOKEN}"))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [("x-ms-error-code", "NoAuthenticationInformation")],
        "authentication required",
    )
        .into_response()
}

fn blob_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [("x-ms-error-code", "BlobNotFound")],
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <Error><Code>BlobNotFound</Code>\
         <Message>The specified blob does not exist.</Message></Error>",
    )
        .into_response()
}

async fn create_container(
    State(storage): State<MockStorage>,
    Path(container): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if params.get("restype").map(String::as_str) != Some("container") {
        return (StatusCode::BAD_REQUEST, "missing restype=container").into_response();
    }

    let mut state = storage.state.lock().unwrap();
    if state.containers.insert(container) {
        StatusCode::CREATED.into_response()
    } else {
        (
            StatusCode::CONFLICT,
            [("x-ms-error-code", "ContainerAlreadyExists")],
            "container exists",
        )
            .into_response()
    }
}

async fn list_blobs(
    State(storage): State<MockStorage>,
    Path(container): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if params.get("comp").map(String::as_str) != Some("list") {
        return (StatusCode::BAD_REQUEST, "missing comp=list").into_response();
    }
    let prefix = params.get("prefix").cloned().unwrap_or_default();

    let state = storage.state.lock().unwrap();
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <EnumerationResults><Blobs>",
    );
    let scope = format!("{container}/");
    for (key, blob) in &state.blobs {
        let name = match key.strip_prefix(&scope) {
            Some(name) => name,
            None => continue,
        };
        if !name.starts_with(&prefix) {
            continue;
        }
        xml.push_str(&format!(
            "<Blob><Name>{name}</Name><Properties>\
             <Last-Modified>{}</Last-Modified>\
             <Etag>0x8D0000000000000</Etag>\
             <Content-Length>{}</Content-Length>\
             <Content-Type>{}</Content-Type>\
             </Properties></Blob>",
            Utc::now().to_rfc2822(),
            blob.data.len(),
            blob.content_type,
        ));
    }
    xml.push_str("</Blobs><NextMarker /></EnumerationResults>");

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        xml,
    )
        .into_response()
}

async fn put_blob(
    State(storage): State<MockStorage>,
    Path((container, name)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if headers.get("x-ms-blob-type").map(|v| v.as_bytes()) != Some(b"BlockBlob") {
        return (StatusCode::BAD_REQUEST, "missing x-ms-blob-type").into_response();
    }
    let content_type = headers
        .get("x-ms-blob-content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let mut state = storage.state.lock().unwrap();
    state.blobs.insert(
        format!("{container}/{name}"),
        StoredBlob {
            data: body,
            content_type,
        },
    );
    StatusCode::CREATED.into_response()
}

async fn get_blob(
    State(storage): State<MockStorage>,
    Path((container, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }

    let state = storage.state.lock().unwrap();
    match state.blobs.get(&format!("{container}/{name}")) {
        Some(blob) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, blob.content_type.clone())],
            blob.data.clone(),
        )
            .into_response(),
        None => blob_not_found(),
    }
}

async fn delete_blob(
    State(storage): State<MockStorage>,
    Path((container, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }

    let mut state = storage.state.lock().unwrap();
    match state.blobs.remove(&format!("{container}/{name}")) {
        Some(_) => StatusCode::ACCEPTED.into_response(),
        None => blob_not_found(),
    }
}
