//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Outer request on the tunnel prefix
//!     → server.rs (Axum setup, request ID, tunnel handler)
//!     → tunnel::envelope (decode framing)
//!     → request.rs (rebuild the inner request)
//!     → security::access_control (allowlist)
//!     → forward.rs (pooled round trip to the backend)
//!     → response.rs (raw backend response inside an outer 200)
//!     → Send to client
//!
//! Any other path
//!     → static files (directory → index.html, 404 on miss)
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use forward::Forwarder;
pub use request::{HeaderList, ReconstructedRequest, X_REQUEST_ID};
pub use server::HttpServer;
