//! Shared credential types and the token source trait.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::process::Command;

/// OAuth scope for the blob service.
pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

/// Convert an OAuth scope into the legacy resource URI expected by the
/// Azure CLI and the instance metadata service.
pub fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// A bearer token together with its expiry instant.
#[derive(Clone)]
pub struct AccessToken {
    /// The raw token value, sent as `Authorization: Bearer <token>`.
    pub token: String,
    /// Instant after which the token must not be used.
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    /// Whether the token expires within the given margin from now.
    pub fn expires_within(&self, margin: Duration) -> bool {
        (self.expires_on - Utc::now()).num_seconds() <= margin.as_secs() as i64
    }
}

// Tokens grant storage access; keep them out of logs and panic output.
impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Errors that can occur while acquiring a token.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The source cannot provide tokens on this host (tool missing, not
    /// logged in, no metadata service). The chain moves on to the next.
    #[error("{source_name} credential unavailable: {message}")]
    Unavailable {
        source_name: &'static str,
        message: String,
    },

    /// The source was reachable but token acquisition failed. The chain
    /// stops here instead of moving on.
    #[error("{source_name} credential error: {message}")]
    Failed {
        source_name: &'static str,
        message: String,
    },

    /// Every source in the chain declined to provide a token.
    #[error("no credential source could provide a token: {0}")]
    ChainExhausted(String),
}

impl CredentialError {
    /// Whether the next source in a chain should be tried.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CredentialError::Unavailable { .. })
    }
}

/// Result type for credential operations.
pub type CredentialResult<T> = Result<T, CredentialError>;

/// A source of bearer tokens for a given scope.
///
/// Implementations must be safe to call concurrently; callers cache the
/// resulting token and only come back near expiry.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Request an access token for the given scope.
    async fn get_token(&self, scope: &str) -> CredentialResult<AccessToken>;
}

/// Run a developer tool through the platform shell and capture its output.
///
/// The command line goes through `cmd /C` on Windows and `/bin/sh -c`
/// elsewhere. Non-zero exits are returned to the caller, which knows how
/// to classify the tool's stderr.
pub(crate) async fn run_tool(
    source_name: &'static str,
    command_line: &str,
    timeout: Duration,
) -> CredentialResult<std::process::Output> {
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.args(["/C", command_line]);
        c
    } else {
        let mut c = Command::new("/bin/sh");
        c.args(["-c", command_line]);
        c
    };
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CredentialError::Unavailable {
                source_name,
                message: "platform shell not found".to_string(),
            })
        }
        Ok(Err(e)) => Err(CredentialError::Failed {
            source_name,
            message: format!("failed to run tool: {e}"),
        }),
        Err(_) => Err(CredentialError::Failed {
            source_name,
            message: format!("tool did not respond within {}s", timeout.as_secs()),
        }),
    }
}

/// Whether a shell invocation failed because the tool itself is missing.
///
/// Anchored to the shell's own wording: service errors routinely contain
/// phrases like "was not found in the tenant" and must not be mistaken
/// for a missing binary.
pub(crate) fn tool_missing(tool: &str, status: &std::process::ExitStatus, stderr: &str) -> bool {
    // 127 is the shell's "command not found" exit code; cmd.exe reports
    // the missing tool in text with a generic exit code.
    status.code() == Some(127)
        || stderr.contains(&format!("{tool}: not found"))
        || stderr.contains(&format!("{tool}: command not found"))
        || stderr.contains(&format!("'{tool}' is not recognized"))
}

/// Trim tool stderr down to something that fits in an error message.
pub(crate) fn summarize_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return "(no stderr output)".to_string();
    }
    let mut summary: String = trimmed.chars().take(200).collect();
    if summary.len() < trimmed.len() {
        summary.push('…');
    }
    summary
}
