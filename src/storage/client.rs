//! Blob service REST client with timeout and token handling.
//!
//! # Responsibilities
//! - Build container and blob URLs from the configured endpoint
//! - Attach bearer tokens, refreshing them near expiry
//! - Upload, download, list and delete blobs over the service's REST API
//! - Map service error responses into typed errors

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use reqwest::{header, StatusCode};
use tokio::sync::Mutex;
use url::Url;

use crate::config::schema::StorageConfig;
use crate::identity::{AccessToken, TokenCredential, STORAGE_SCOPE};
use crate::observability::metrics;
use crate::storage::types::{BlobItem, StorageError, StorageResult};
use crate::storage::xml::parse_list_response;

/// Tokens are refreshed this long before their expiry instant.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// REST client for one container of a blob service account.
pub struct BlobServiceClient {
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    endpoint: Url,
    container_url: Url,
    container: String,
    api_version: String,
    timeout: Duration,
    token_cache: Mutex<Option<AccessToken>>,
}

impl BlobServiceClient {
    /// Build a client from configuration.
    ///
    /// Fails when no endpoint is configured or the endpoint is not an
    /// http(s) URL. Credentials are not touched here; the first request
    /// acquires the first token.
    pub fn from_config(
        config: &StorageConfig,
        credential: Arc<dyn TokenCredential>,
        http: reqwest::Client,
    ) -> StorageResult<Self> {
        let raw = config
            .endpoint
            .as_deref()
            .ok_or(StorageError::EndpointNotConfigured)?;
        let endpoint = Url::parse(raw)?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.host_str().is_none() {
            return Err(StorageError::UnsupportedEndpoint(raw.to_string()));
        }

        // Emulator endpoints carry an account path segment; keep it and
        // append the container after it.
        let mut container_url = endpoint.clone();
        container_url
            .path_segments_mut()
            .map_err(|_| StorageError::UnsupportedEndpoint(raw.to_string()))?
            .pop_if_empty()
            .push(&config.container);

        tracing::info!(
            endpoint = %endpoint,
            container = %config.container,
            "Blob service client initialized"
        );

        Ok(Self {
            http,
            credential,
            endpoint,
            container_url,
            container: config.container.clone(),
            api_version: config.api_version.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            token_cache: Mutex::new(None),
        })
    }

    /// Upload a blob, replacing any existing blob with the same name.
    pub async fn upload(&self, name: &str, content_type: &str, body: Bytes) -> StorageResult<()> {
        let url = self.blob_url(name)?;
        let size = body.len();
        let request = self
            .http
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-blob-content-type", content_type)
            .header(header::CONTENT_TYPE, content_type)
            .body(body);

        self.send("upload", request, StatusCode::CREATED).await?;
        tracing::info!(blob = %name, size, "Uploaded blob");
        Ok(())
    }

    /// Download a blob as a streamable response.
    pub async fn download(&self, name: &str) -> StorageResult<BlobDownload> {
        let url = self.blob_url(name)?;
        let response = self.send("download", self.http.get(url), StatusCode::OK).await?;
        Ok(BlobDownload { response })
    }

    /// Delete a blob.
    pub async fn delete(&self, name: &str) -> StorageResult<()> {
        let url = self.blob_url(name)?;
        self.send("delete", self.http.delete(url), StatusCode::ACCEPTED)
            .await?;
        tracing::info!(blob = %name, "Deleted blob");
        Ok(())
    }

    /// List the container's blobs, following continuation markers until
    /// the listing is complete.
    pub async fn list(&self, prefix: Option<&str>) -> StorageResult<Vec<BlobItem>> {
        let mut blobs = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let url = self.list_url(prefix, marker.as_deref());
            let response = self.send("list", self.http.get(url), StatusCode::OK).await?;
            let body = response.text().await?;
            let page = parse_list_response(&body)?;
            blobs.extend(page.blobs);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        tracing::debug!(container = %self.container, count = blobs.len(), "Listed blobs");
        Ok(blobs)
    }

    /// Create the configured container. Returns `true` when it was
    /// created and `false` when it already existed.
    pub async fn create_container(&self) -> StorageResult<bool> {
        let mut url = self.container_url.clone();
        url.set_query(Some("restype=container"));

        // A conflict means the container already exists, so classify it
        // before the operation outcome is recorded.
        let outcome = match self
            .dispatch(self.http.put(url), StatusCode::CREATED)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_conflict() => Ok(false),
            Err(e) => Err(e),
        };
        metrics::record_storage_operation("create_container", outcome.is_ok());

        if let Ok(true) = outcome {
            tracing::info!(container = %self.container, "Created container");
        }
        outcome
    }

    /// The configured service endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The configured container name.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Dispatch the request and record the outcome of the operation.
    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
        expected: StatusCode,
    ) -> StorageResult<reqwest::Response> {
        let result = self.dispatch(request, expected).await;
        metrics::record_storage_operation(operation, result.is_ok());
        result
    }

    /// Attach auth and version headers, send, and map unexpected
    /// statuses into service errors.
    async fn dispatch(
        &self,
        request: reqwest::RequestBuilder,
        expected: StatusCode,
    ) -> StorageResult<reqwest::Response> {
        let token = self.bearer_token().await?;
        let response = request
            .bearer_auth(token)
            .header("x-ms-version", &self.api_version)
            .timeout(self.timeout)
            .send()
            .await?;

        if response.status() == expected {
            Ok(response)
        } else {
            Err(Self::service_error(response).await)
        }
    }

    /// Return the cached token, acquiring a fresh one when absent or
    /// near expiry. The lock is held across acquisition so concurrent
    /// requests don't stampede the credential chain.
    async fn bearer_token(&self) -> StorageResult<String> {
        let mut cache = self.token_cache.lock().await;
        if let Some(token) = cache.as_ref() {
            if !token.expires_within(REFRESH_MARGIN) {
                return Ok(token.token.clone());
            }
        }

        let fresh = self.credential.get_token(STORAGE_SCOPE).await?;
        let value = fresh.token.clone();
        *cache = Some(fresh);
        Ok(value)
    }

    fn blob_url(&self, name: &str) -> StorageResult<Url> {
        check_blob_name(name)?;
        let mut url = self.container_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::UnsupportedEndpoint(self.container_url.to_string()))?
            .extend(name.split('/'));
        Ok(url)
    }

    fn list_url(&self, prefix: Option<&str>, marker: Option<&str>) -> Url {
        let mut url = self.container_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("restype", "container")
                .append_pair("comp", "list");
            if let Some(prefix) = prefix {
                query.append_pair("prefix", prefix);
            }
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
        }
        url
    }

    async fn service_error(response: reqwest::Response) -> StorageError {
        let status = response.status().as_u16();
        let code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        StorageError::Service {
            status,
            code,
            message: truncate_body(&body),
        }
    }
}

impl std::fmt::Debug for BlobServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobServiceClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("container", &self.container)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// A blob download in progress. Headers are available immediately; the
/// body is consumed as a stream or collected into memory.
pub struct BlobDownload {
    response: reqwest::Response,
}

impl BlobDownload {
    pub fn content_type(&self) -> Option<&str> {
        self.response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    pub fn etag(&self) -> Option<&str> {
        self.response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
    }

    /// Consume the download as a byte stream.
    pub fn into_stream(self) -> impl Stream<Item = reqwest::Result<Bytes>> {
        self.response.bytes_stream()
    }

    /// Collect the whole body into memory.
    pub async fn into_bytes(self) -> reqwest::Result<Bytes> {
        self.response.bytes().await
    }
}

/// Blob naming rules enforced before a URL is built: 1-1024 characters,
/// no control characters, path segments must be real names.
fn check_blob_name(name: &str) -> StorageResult<()> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.chars().count() > 1024 {
        Some("must be at most 1024 characters")
    } else if name.ends_with('/') || name.ends_with('.') {
        Some("must not end with '/' or '.'")
    } else if name
        .split('/')
        .any(|part| part.is_empty() || part == "." || part == "..")
    {
        Some("path segments must not be empty or dots")
    } else if name.chars().any(char::is_control) {
        Some("control characters are not allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StorageError::InvalidBlobName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    let mut message: String = trimmed.chars().take(300).collect();
    if message.len() < trimmed.len() {
        message.push('…');
    }
    message
}
