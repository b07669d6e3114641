//! Fronting relay library.
//!
//! Receives envelopes carrying complete HTTP requests, forwards them to an
//! allowlisted backend and returns the backend's raw response inside a
//! plain `200 OK`.

pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;
pub mod tunnel;

pub use config::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
