//! Ordered fallback across credential sources.
//!
//! # Responsibilities
//! - Try each source in a fixed order and return the first token
//! - Continue past sources that are unavailable on this host
//! - Stop on real failures instead of masking them with a fallback
//!
//! # Design Decisions
//! - The order is fixed at construction; there is no reshuffling based
//!   on past outcomes, so behavior stays predictable across restarts
//! - A source that errors after being reached stops the chain: falling
//!   through would hide misconfiguration behind a different identity

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::schema::CredentialsConfig;
use crate::identity::azure_cli::AzureCliCredential;
use crate::identity::azure_developer_cli::AzureDeveloperCliCredential;
use crate::identity::credential::{
    AccessToken, CredentialError, CredentialResult, TokenCredential,
};
use crate::identity::managed_identity::ManagedIdentityCredential;
use crate::observability::metrics;

/// A credential that walks an ordered list of sources.
pub struct ChainedTokenCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
}

impl ChainedTokenCredential {
    /// Create a chain over the given sources, tried in order.
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { sources }
    }

    /// The portal's standard chain: Azure CLI, then Azure Developer CLI,
    /// then managed identity. Workstations resolve on one of the first
    /// two; deployed instances fall through to the metadata service.
    pub fn standard(config: &CredentialsConfig, http: reqwest::Client) -> Self {
        let cli_timeout = Duration::from_secs(config.cli_timeout_secs);
        Self::new(vec![
            Arc::new(AzureCliCredential::new(cli_timeout)),
            Arc::new(AzureDeveloperCliCredential::new(cli_timeout)),
            Arc::new(ManagedIdentityCredential::new(
                http,
                config.imds_endpoint.clone(),
                Duration::from_secs(config.imds_timeout_secs),
            )),
        ])
    }
}

#[async_trait]
impl TokenCredential for ChainedTokenCredential {
    fn name(&self) -> &'static str {
        "chained"
    }

    async fn get_token(&self, scope: &str) -> CredentialResult<AccessToken> {
        let mut attempts = Vec::new();

        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    tracing::info!(source = source.name(), "Acquired access token");
                    metrics::record_token_acquired(source.name());
                    return Ok(token);
                }
                Err(e) if e.is_unavailable() => {
                    tracing::debug!(
                        source = source.name(),
                        reason = %e,
                        "Credential source unavailable, trying next"
                    );
                    attempts.push(e.to_string());
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "Credential source failed");
                    return Err(e);
                }
            }
        }

        Err(CredentialError::ChainExhausted(attempts.join("; ")))
    }
}

impl std::fmt::Debug for ChainedTokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("ChainedTokenCredential")
            .field("sources", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum StubOutcome {
        Token(&'static str),
        Unavailable,
        Failed,
    }

    struct StubCredential {
        name: &'static str,
        outcome: StubOutcome,
        calls: AtomicUsize,
    }

    impl StubCredential {
        fn new(name: &'static str, outcome: StubOutcome) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome,
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenCredential for StubCredential {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn get_token(&self, _scope: &str) -> CredentialResult<AccessToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                StubOutcome::Token(value) => Ok(AccessToken {
                    token: value.to_string(),
                    expires_on: Utc::now() + chrono::Duration::hours(1),
                }),
                StubOutcome::Unavailable => Err(CredentialError::Unavailable {
                    source_name: self.name,
                    message: "not here".to_string(),
                }),
                StubOutcome::Failed => Err(CredentialError::Failed {
                    source_name: self.name,
                    message: "broken".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let first = StubCredential::new("first", StubOutcome::Token("from-first"));
        let second = StubCredential::new("second", StubOutcome::Token("from-second"));
        let chain = ChainedTokenCredential::new(vec![first.clone(), second.clone()]);

        let token = chain.get_token("scope").await.unwrap();
        assert_eq!(token.token, "from-first");
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_falls_through() {
        let first = StubCredential::new("first", StubOutcome::Unavailable);
        let second = StubCredential::new("second", StubOutcome::Token("from-second"));
        let chain = ChainedTokenCredential::new(vec![first.clone(), second.clone()]);

        let token = chain.get_token("scope").await.unwrap();
        assert_eq!(token.token, "from-second");
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_stops_the_chain() {
        let first = StubCredential::new("first", StubOutcome::Failed);
        let second = StubCredential::new("second", StubOutcome::Token("from-second"));
        let chain = ChainedTokenCredential::new(vec![first.clone(), second.clone()]);

        let err = chain.get_token("scope").await.unwrap_err();
        assert!(matches!(err, CredentialError::Failed { .. }));
        assert_eq!(second.call_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_chain_aggregates_reasons() {
        let first = StubCredential::new("first", StubOutcome::Unavailable);
        let second = StubCredential::new("second", StubOutcome::Unavailable);
        let chain = ChainedTokenCredential::new(vec![first.clone(), second.clone()]);

        let err = chain.get_token("scope").await.unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, CredentialError::ChainExhausted(_)));
        assert!(message.contains("first"));
        assert!(message.contains("second"));
    }
}
