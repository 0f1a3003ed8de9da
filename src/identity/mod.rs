//! Credential acquisition subsystem.
//!
//! # Data Flow
//! ```text
//! blob client needs a token
//!     → chain.rs walks the sources in order:
//!         azure_cli.rs (az account get-access-token)
//!         azure_developer_cli.rs (azd auth token)
//!         managed_identity.rs (instance metadata service)
//!     → first token wins, unavailable sources are skipped
//!     → AccessToken cached by the caller until near expiry
//! ```
//!
//! # Design Decisions
//! - Sources distinguish "unavailable on this host" from real failures;
//!   only the former lets the chain continue
//! - Nothing here talks to the blob service; scopes come from the caller

pub mod azure_cli;
pub mod azure_developer_cli;
pub mod chain;
pub mod credential;
pub mod managed_identity;

pub use chain::ChainedTokenCredential;
pub use credential::{
    AccessToken, CredentialError, CredentialResult, STORAGE_SCOPE, TokenCredential,
};
