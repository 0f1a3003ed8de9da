//! Semantic validation of loaded configuration.
//!
//! Checks run once at startup, after file and environment merging. The
//! storage endpoint is exempt: it may legitimately be absent at boot and
//! is resolved by the blob client on first use.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),

    #[error("invalid redirect address '{0}'")]
    InvalidRedirectAddress(String),

    #[error("invalid container name '{0}': {1}")]
    InvalidContainerName(String, &'static str),

    #[error("limits.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("limits.request_timeout_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("storage.request_timeout_secs must be greater than zero")]
    ZeroStorageTimeout,
}

/// Validate a merged configuration, collecting every problem rather than
/// stopping at the first.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        if let Some(redirect) = &tls.redirect_bind {
            if redirect.parse::<SocketAddr>().is_err() {
                errors.push(ValidationError::InvalidRedirectAddress(redirect.clone()));
            }
        }
    }

    if let Err(reason) = check_container_name(&config.storage.container) {
        errors.push(ValidationError::InvalidContainerName(
            config.storage.container.clone(),
            reason,
        ));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if config.limits.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.storage.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroStorageTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Container naming rules enforced by the blob service: 3-63 characters,
/// lowercase letters, digits and single hyphens, starting and ending with
/// a letter or digit.
fn check_container_name(name: &str) -> Result<(), &'static str> {
    if name.len() < 3 || name.len() > 63 {
        return Err("must be 3-63 characters");
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("only lowercase letters, digits and hyphens are allowed");
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err("must start and end with a letter or digit");
    }

    if name.contains("--") {
        return Err("consecutive hyphens are not allowed");
    }

    Ok(())
}
