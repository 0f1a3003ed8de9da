//! Error surface of the HTTP layer.
//!
//! # Responsibilities
//! - Map storage and upload errors onto HTTP statuses
//! - Render error detail for responses and logs
//! - Replace server-error bodies with a generic page outside development
//!
//! # Design Decisions
//! - Handlers always render full detail; the environment-aware rewrite
//!   happens once, in middleware, so no handler can leak by accident
//! - Client errors (4xx) keep their detail in every environment

use axum::extract::multipart::MultipartError;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::http::server::AppState;
use crate::storage::StorageError;
use crate::web::page;

/// What production callers see in place of server-error detail.
pub const GENERIC_ERROR: &str = "An error occurred while processing your request.";

/// Errors a handler can surface to a client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid multipart request: {0}")]
    Multipart(#[from] MultipartError),

    #[error("multipart form must include at least one 'file' field with a filename")]
    MissingFile,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Storage(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::InvalidBlobName { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Multipart(_) | ApiError::MissingFile => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = error_detail(&self);

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %detail, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %detail, "Request rejected");
        }

        (status, Json(ErrorBody { error: detail })).into_response()
    }
}

/// Render an error with its full source chain.
fn error_detail(err: &dyn std::error::Error) -> String {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

/// Replace server-error bodies outside development.
///
/// Development keeps whatever the handler rendered. Everywhere else a
/// 5xx body is swapped for the generic message, as JSON under `/api`
/// and as the error page otherwise.
pub async fn error_page_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let wants_json = request.uri().path().starts_with("/api");
    let response = next.run(request).await;

    if !response.status().is_server_error() || state.config.environment.is_development() {
        return response;
    }

    let status = response.status();
    if wants_json {
        (
            status,
            Json(ErrorBody {
                error: GENERIC_ERROR.to_string(),
            }),
        )
            .into_response()
    } else {
        (status, Html(page::ERROR_HTML)).into_response()
    }
}
