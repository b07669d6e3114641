//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check addresses parse as socket addresses
//! - Check the tunnel prefix is a mountable path
//! - Check the front identifier is a legal header value
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::RelayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("tunnel.path_prefix {0:?} must start and end with '/' and contain no wildcards")]
    PathPrefix(String),

    #[error("tunnel.front_id {0:?} is not a valid header value")]
    FrontId(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let prefix = &config.tunnel.path_prefix;
    if prefix == "/"
        || !prefix.starts_with('/')
        || !prefix.ends_with('/')
        || prefix.contains(['{', '}', '*'])
    {
        errors.push(ValidationError::PathPrefix(prefix.clone()));
    }

    if config.tunnel.front_id.is_empty() || HeaderValue::from_str(&config.tunnel.front_id).is_err() {
        errors.push(ValidationError::FrontId(config.tunnel.front_id.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
