//! Destination allowlist.
//!
//! The relay only ever talks to a fixed set of backends. This check runs
//! before any outbound connection is attempted; without it the relay would
//! be an open proxy.

use crate::http::request::ReconstructedRequest;
use crate::tunnel::TunnelError;

/// Destinations the relay forwards to. Changing this requires a rebuild.
pub const ALLOWED_HOSTS: [&str; 3] = ["center.xx-net.net", "dns.xx-net.net", "scan1.xx-net.net"];

/// Exact-match host allowlist.
///
/// No case folding, no port stripping, no wildcards.
#[derive(Debug, Clone)]
pub struct DestinationGuard {
    hosts: Vec<String>,
}

impl DestinationGuard {
    /// Guard over an explicit host set.
    ///
    /// Production code uses [`DestinationGuard::default`]; this exists so
    /// tests can point the relay at a local backend.
    pub fn with_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, host: &str) -> bool {
        self.hosts.iter().any(|allowed| allowed == host)
    }

    pub fn check(&self, request: &ReconstructedRequest) -> Result<(), TunnelError> {
        if self.is_allowed(&request.host) {
            Ok(())
        } else {
            Err(TunnelError::ForbiddenHost(request.host.clone()))
        }
    }
}

impl Default for DestinationGuard {
    fn default() -> Self {
        Self::with_hosts(ALLOWED_HOSTS)
    }
}
