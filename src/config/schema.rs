//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the portal.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so a missing file still yields a bootable
//! configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the blob portal.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Runtime environment (controls error detail and HSTS).
    pub environment: Environment,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Storage account settings.
    pub storage: StorageConfig,

    /// Credential chain settings.
    pub credentials: CredentialsConfig,

    /// Request limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Runtime environment of the host.
///
/// Anything that is not `Development` behaves as production: generic error
/// pages and the HSTS response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    /// Parse an environment name, case-insensitively. Unknown names fall
    /// back to `Production`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            _ => Environment::Production,
        }
    }

    pub fn is_development(self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration. When present the portal serves HTTPS on
    /// `bind_address`.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,

    /// Optional plain-HTTP address that redirects to the HTTPS listener.
    #[serde(default)]
    pub redirect_bind: Option<String>,
}

/// Storage account settings.
///
/// The endpoint is deliberately optional and unvalidated here: it is
/// resolved by the blob client at first use, so a missing endpoint never
/// prevents the host from starting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Blob service endpoint URL. Overridden by `AZURE_STORAGE_ENDPOINT`.
    pub endpoint: Option<String>,

    /// Container all portal operations target.
    pub container: String,

    /// `x-ms-version` sent with every storage request.
    pub api_version: String,

    /// Timeout for individual storage requests in seconds.
    pub request_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            container: "uploads".to_string(),
            api_version: "2021-12-02".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Credential chain settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Base URL of the instance metadata service.
    pub imds_endpoint: String,

    /// Timeout for the IMDS token request in seconds. Kept short: when the
    /// host is not on Azure the link-local address may hang instead of
    /// refusing the connection.
    pub imds_timeout_secs: u64,

    /// Timeout for `az` / `azd` invocations in seconds.
    pub cli_timeout_secs: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            imds_endpoint: "http://169.254.169.254".to_string(),
            imds_timeout_secs: 3,
            cli_timeout_secs: 10,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes (bounds uploads).
    pub max_body_bytes: usize,

    /// Total request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 32 * 1024 * 1024,
            request_timeout_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
