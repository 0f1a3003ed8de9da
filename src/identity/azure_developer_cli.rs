//! Token source backed by the Azure Developer CLI (`azd`).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::identity::credential::{
    run_tool, summarize_stderr, tool_missing, AccessToken, CredentialError, CredentialResult,
    TokenCredential,
};

const SOURCE_NAME: &str = "azure-developer-cli";

/// Acquires tokens from the locally installed Azure Developer CLI.
///
/// Unlike `az`, `azd` takes the full scope rather than a resource URI,
/// and its output is a fixed two-field JSON document.
pub struct AzureDeveloperCliCredential {
    timeout: Duration,
}

impl AzureDeveloperCliCredential {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl TokenCredential for AzureDeveloperCliCredential {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn get_token(&self, scope: &str) -> CredentialResult<AccessToken> {
        let command = format!("azd auth token --output json --scope \"{scope}\"");
        let output = run_tool(SOURCE_NAME, &command, self.timeout).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if tool_missing("azd", &output.status, &stderr) {
                return Err(CredentialError::Unavailable {
                    source_name: SOURCE_NAME,
                    message: "azd is not installed or not on PATH".to_string(),
                });
            }
            if stderr.contains("azd auth login") || stderr.contains("not logged in") {
                return Err(CredentialError::Unavailable {
                    source_name: SOURCE_NAME,
                    message: "not logged in, run `azd auth login`".to_string(),
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
struct DeveloperCliTokenResponse {
    token: String,
    #[serde(rename = "expiresOn")]
    expires_on: String,
}

pub(crate) fn parse_token(json: &str) -> Result<AccessToken, String> {
    let response: DeveloperCliTokenResponse =
        serde_json::from_str(json).map_err(|e| format!("unexpected azd output: {e}"))?;

    let expires_on = DateTime::parse_from_rfc3339(&response.expires_on)
        .map_err(|e| format!("cannot parse expiresOn '{}': {e}", response.expires_on))?
        .with_timezone(&Utc);

    Ok(AccessToken {
        token: response.token,
        expires_on,
    })
}
