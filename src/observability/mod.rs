//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Tunnel handler produces:
//!     → logging.rs (structured log events, request-id spans)
//!     → metrics.rs (outcome counters, latency histogram)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Nothing observability-related ever reaches the outer response body
//! - Request ID flows through the per-request trace span

pub mod logging;
pub mod metrics;
