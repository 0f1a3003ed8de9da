//! Token source backed by the instance metadata service (IMDS).
//!
//! # Responsibilities
//! - Request managed identity tokens from the metadata endpoint
//! - Treat "no metadata service here" and "no identity assigned" as
//!   unavailable so the chain can continue
//! - Tolerate the string-typed numbers IMDS puts in its JSON

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::identity::credential::{
    scope_to_resource, AccessToken, CredentialError, CredentialResult, TokenCredential,
};

const SOURCE_NAME: &str = "managed-identity";
const API_VERSION: &str = "2018-02-01";
const TOKEN_PATH: &str = "/metadata/identity/oauth2/token";

/// Acquires tokens from the platform's managed identity endpoint.
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl ManagedIdentityCredential {
    pub fn new(http: reqwest::Client, endpoint: String, timeout: Duration) -> Self {
        Self {
            http,
            endpoint,
            timeout,
        }
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn get_token(&self, scope: &str) -> CredentialResult<AccessToken> {
        let resource = scope_to_resource(scope);
        let url = format!("{}{}", self.endpoint.trim_end_matches('/'), TOKEN_PATH);

        let response = self
            .http
            .get(&url)
            .query(&[("api-version", API_VERSION), ("resource", resource)])
            .header("Metadata", "true")
            .timeout(self.timeout)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            // A host without IMDS refuses or blackholes the connection.
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Err(CredentialError::Unavailable {
                    source_name: SOURCE_NAME,
                    message: format!("no metadata service at {}: {e}", self.endpoint),
                });
            }
            Err(e) => {
                return Err(CredentialError::Failed {
                    source_name: SOURCE_NAME,
                    message: format!("metadata request failed: {e}"),
                });
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST {
            // IMDS answers 400 when the VM has no identity assigned.
            return Err(CredentialError::Unavailable {
                source_name: SOURCE_NAME,
                message: "metadata service replied 400, no identity is assigned".to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Failed {
                source_name: SOURCE_NAME,
                message: format!("metadata service replied {status}: {body}"),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CredentialError::Failed {
                source_name: SOURCE_NAME,
                message: format!("failed to read metadata response: {e}"),
            })?;

        parse_token(&body).map_err(|message| CredentialError::Failed {
            source_name: SOURCE_NAME,
            message,
        })
    }
}

/// IMDS serializes numbers as JSON strings; other managed identity hosts
/// use plain numbers. Accept both.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericString {
    Number(i64),
    Text(String),
}

impl NumericString {
    fn as_i64(&self) -> Result<i64, String> {
        match self {
            NumericString::Number(n) => Ok(*n),
            NumericString::Text(s) => s
                .parse()
                .map_err(|e| format!("expected a number, got '{s}': {e}")),
        }
    }
}

#[derive(Deserialize)]
struct ImdsTokenResponse {
    access_token: String,
    expires_on: NumericString,
}

pub(crate) fn parse_token(json: &str) -> Result<AccessToken, String> {
    let response: ImdsTokenResponse =
        serde_json::from_str(json).map_err(|e| format!("unexpected metadata response: {e}"))?;

    let secs = response.expires_on.as_i64()?;
    let expires_on = DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| format!("expires_on {secs} is out of range"))?;

    Ok(AccessToken {
        token: response.access_token,
        expires_on,
    })
}
