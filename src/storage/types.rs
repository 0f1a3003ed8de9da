//! Storage-specific types and error definitions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::identity::CredentialError;

/// Errors that can occur during blob operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No endpoint is configured. Raised at first use, not at startup:
    /// a portal without storage still serves its pages.
    #[error("storage endpoint not configured: set AZURE_STORAGE_ENDPOINT to the blob service URL")]
    EndpointNotConfigured,

    /// The configured endpoint is not a parseable URL.
    #[error("invalid storage endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// The configured endpoint parsed but is not an http(s) URL.
    #[error("unsupported storage endpoint '{0}': expected an http(s) URL")]
    UnsupportedEndpoint(String),

    /// The blob name violates the service's naming rules.
    #[error("invalid blob name '{name}': {reason}")]
    InvalidBlobName { name: String, reason: &'static str },

    /// Token acquisition failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The request never produced a service response.
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A listing response could not be parsed.
    #[error("failed to parse listing response: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The service answered with an error status.
    #[error("storage service replied {status}{}: {message}", error_code(.code))]
    Service {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

fn error_code(code: &Option<String>) -> String {
    match code {
        Some(code) => format!(" ({code})"),
        None => String::new(),
    }
}

impl StorageError {
    /// Whether the service reported the blob or container as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Service { status: 404, .. })
    }

    /// Whether the service reported a conflict, e.g. a container that
    /// already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Service { status: 409, .. })
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A blob as reported by a container listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlobItem {
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}
