//! Page and blob API handlers.
//!
//! # Responsibilities
//! - Serve the portal pages (index, error, health)
//! - Expose the blob API: list, upload, download, delete, container
//! - Translate between HTTP shapes and storage client calls
//!
//! # Design Decisions
//! - Handlers stay thin: validation and service semantics live in the
//!   storage client, status mapping lives in the error type
//! - Downloads stream straight through; bodies are never buffered

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::storage::BlobItem;
use crate::web::page;

pub async fn index() -> Html<&'static str> {
    Html(page::INDEX_HTML)
}

pub async fn error_page() -> Html<&'static str> {
    Html(page::ERROR_HTML)
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    name: &'static str,
    version: &'static str,
    environment: String,
}

/// Liveness endpoint. Deliberately ignores storage: a portal without a
/// reachable blob service is still up.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.to_string(),
    })
}

#[derive(Deserialize)]
pub struct ListParams {
    pub prefix: Option<String>,
}

pub async fn list_blobs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<BlobItem>>, ApiError> {
    let client = state.blob_client().await?;
    let blobs = client.list(params.prefix.as_deref()).await?;
    Ok(Json(blobs))
}

#[derive(Serialize)]
pub struct UploadedBlob {
    pub name: String,
    pub size: u64,
    pub content_type: String,
}

/// Accept one or more files from a multipart form and store each under
/// its original filename.
pub async fn upload_blob(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<UploadedBlob>>), ApiError> {
    let client = state.blob_client().await?;
    let mut uploaded = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(ApiError::MissingFile),
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await?;
        let size = data.len() as u64;

        client.upload(&name, &content_type, data).await?;
        uploaded.push(UploadedBlob {
            name,
            size,
            content_type,
        });
    }

    if uploaded.is_empty() {
        return Err(ApiError::MissingFile);
    }
    Ok((StatusCode::CREATED, Json(uploaded)))
}

pub async fn download_blob(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let client = state.blob_client().await?;
    let download = client.download(&name).await?;

    let mut headers = HeaderMap::new();
    let content_type = download
        .content_type()
        .unwrap_or("application/octet-stream");
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Some(length) = download.content_length() {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    headers.insert(header::CONTENT_DISPOSITION, attachment_header(&name));

    Ok((headers, Body::from_stream(download.into_stream())).into_response())
}

pub async fn delete_blob(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let client = state.blob_client().await?;
    client.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct ContainerResponse {
    pub container: String,
    pub created: bool,
}

/// Create the configured container if it does not exist yet.
pub async fn create_container(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ContainerResponse>), ApiError> {
    let client = state.blob_client().await?;
    let created = client.create_container().await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(ContainerResponse {
            container: client.container().to_string(),
            created,
        }),
    ))
}

/// Content-Disposition for a download, keeping only characters that are
/// safe inside a quoted filename.
fn attachment_header(name: &str) -> HeaderValue {
    let file = name.rsplit('/').next().unwrap_or(name);
    let safe: String = file
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\')
        .collect();

    let value = if safe.is_empty() {
        "attachment".to_string()
    } else {
        format!("attachment; filename=\"{safe}\"")
    };
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
