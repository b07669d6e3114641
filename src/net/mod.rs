//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     listener.rs (bind; failure is fatal)
//!     → Hand off to HTTP layer
//!
//! Outbound:
//!     http::forward
//!     → transport.rs (pooled client, handshake deadline)
//!     → tls.rs (strict or relaxed certificate policy)
//!     → Backend
//! ```
//!
//! # Design Decisions
//! - Outbound pools are created once and injected, never global
//! - Both TLS policies exist side by side; configuration picks one

pub mod listener;
pub mod tls;
pub mod transport;

pub use tls::TlsPolicy;
pub use transport::{PooledClient, TransportPools};
