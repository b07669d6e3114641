//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Reconstructed inner request:
//!     → access_control.rs (destination allowlist, before any network I/O)
//!     → headers.rs (X-Forwarded-For, XX-Forwarded-For, X-Front)
//!     → Pass to forwarder
//! ```
//!
//! # Design Decisions
//! - Fail closed: a host outside the allowlist is never dialed
//! - No trust in client input: forwarding headers are always overwritten

pub mod access_control;
pub mod headers;

pub use access_control::{DestinationGuard, ALLOWED_HOSTS};
