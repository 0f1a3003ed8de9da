//! Token source backed by the Azure CLI (`az`).
//!
//! # Responsibilities
//! - Invoke `az account get-access-token` for the requested scope
//! - Distinguish "az missing / not logged in" from real failures
//! - Parse both expiry formats the CLI has shipped over time

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::identity::credential::{
    run_tool, scope_to_resource, summarize_stderr, tool_missing, AccessToken, CredentialError,
    CredentialResult, TokenCredential,
};

const SOURCE_NAME: &str = "azure-cli";

/// Acquires tokens from the locally installed Azure CLI.
pub struct AzureCliCredential {
    timeout: Duration,
}

impl AzureCliCredential {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn get_token(&self, scope: &str) -> CredentialResult<AccessToken> {
        let resource = scope_to_resource(scope);
        let command = format!("az account get-access-token --output json --resource \"{resource}\"");
        let output = run_tool(SOURCE_NAME, &command, self.timeout).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if tool_missing("az", &output.status, &stderr) {
                return Err(CredentialError::Unavailable {
                    source_name: SOURCE_NAME,
                    message: "az is not installed or not on PATH".to_string(),
                });
            }
            if stderr.contains("az login") || stderr.contains("az account set") {
                return Err(CredentialError::Unavailable {
                    source_name: SOURCE_NAME,
                    message: "not logged in, run `az login`".to_string(),
                });
            }
            return Err(CredentialError::Failed {
                source_name: SOURCE_NAME,
                message: summarize_stderr(&stderr),
            });
        }

        parse_token(&String::from_utf8_lossy(&output.stdout)).map_err(|message| {
            CredentialError::Failed {
                source_name: SOURCE_NAME,
                message,
            }
        })
    }
}

#[derive(Deserialize)]
struct CliTokenResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// Local wall-clock expiry, present in every az version.
    #[serde(rename = "expiresOn")]
    expires_on_local: Option<String>,
    /// Unix-epoch expiry, added in az 2.54.
    #[serde(rename = "expires_on")]
    expires_on_unix: Option<i64>,
}

/// Parse the CLI's JSON output into a token.
///
/// Newer az versions emit `expires_on` as Unix seconds; older ones only
/// emit `expiresOn` as a local wall-clock timestamp without an offset.
pub(crate) fn parse_token(json: &str) -> Result<AccessToken, String> {
    let response: CliTokenResponse =
        serde_json::from_str(json).map_err(|e| format!("unexpected az output: {e}"))?;

    let expires_on = if let Some(secs) = response.expires_on_unix {
        DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| format!("expires_on {secs} is out of range"))?
    } else if let Some(local) = response.expires_on_local.as_deref() {
        parse_local_expiry(local)?
    } else {
        return Err("az output carries no expiry".to_string());
    };

    Ok(AccessToken {
        token: response.access_token,
        expires_on,
    })
}

fn parse_local_expiry(value: &str) -> Result<DateTime<Utc>, String> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| format!("cannot parse expiresOn '{value}': {e}"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("expiresOn '{value}' does not exist in the local timezone"))
}
