//! Configuration loading from disk and the process environment.

use std::path::Path;

use thiserror::Error;

use crate::config::schema::{AppConfig, Environment};
use crate::config::validation::{validate_config, ValidationError};

/// Environment key holding the blob service endpoint URL.
pub const ENDPOINT_ENV: &str = "AZURE_STORAGE_ENDPOINT";

/// Environment key selecting the runtime environment.
pub const ENVIRONMENT_ENV: &str = "APP_ENVIRONMENT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from a TOML file, overlay environment variables, and
/// validate the result.
///
/// A missing file is not an error: every field has a default, so the portal
/// boots on defaults plus whatever the environment provides. The storage
/// endpoint is intentionally left unvalidated; the blob client resolves it
/// at first use.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)?
    } else {
        tracing::info!(path = %path.display(), "No config file found, using defaults");
        AppConfig::default()
    };

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay the process environment onto a loaded configuration.
///
/// `AZURE_STORAGE_ENDPOINT` and `APP_ENVIRONMENT` take precedence over
/// whatever the file set.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
        if !endpoint.trim().is_empty() {
            config.storage.endpoint = Some(endpoint);
        }
    }

    if let Ok(environment) = std::env::var(ENVIRONMENT_ENV) {
        config.environment = Environment::from_name(&environment);
    }
}
