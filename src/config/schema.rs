//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.
//!
//! The destination allowlist and the outbound pool limits are compiled in
//! and have no entry here.

use serde::{Deserialize, Serialize};

use crate::net::TlsPolicy;
use crate::security::headers::DEFAULT_FRONT_ID;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Tunnel endpoint settings.
    pub tunnel: TunnelConfig,

    /// Static file fallback.
    pub static_files: StaticFilesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080"). The `PORT` environment
    /// variable replaces the port.
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Tunnel endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Path prefix the tunnel endpoint is mounted at. Must start and end
    /// with `/`.
    pub path_prefix: String,

    /// Value of the `X-Front` header on forwarded requests.
    pub front_id: String,

    /// Certificate policy for outbound connections.
    pub transport: TlsPolicy,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            path_prefix: "/2/".to_string(),
            front_id: DEFAULT_FRONT_ID.to_string(),
            transport: TlsPolicy::Relaxed,
        }
    }
}

/// Static file fallback for every path outside the tunnel prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Directory files are served from. Directories resolve to `index.html`.
    pub root: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: "html".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG`
    /// is unset.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
