//! Tunnel protocol subsystem.
//!
//! # Data Flow
//! ```text
//! Outer request body (byte stream)
//!     → envelope.rs (u16 header length, header block, u32 body length, body)
//!     → http::request (rebuild the inner request from the header block)
//!     → security::access_control (destination allowlist)
//!     → http::forward (pooled outbound round trip)
//!     → http::response (raw status line + headers + body, inside a 200)
//! ```
//!
//! # Design Decisions
//! - Every stage short-circuits into a [`TunnelError`], which is rendered
//!   in-band; the outer exchange never fails at the transport level
//! - No size caps on the declared lengths; buffers are sized from the wire
//! - A body that ends early is accepted as-is

pub mod envelope;
pub mod error;

pub use envelope::{decode, encode, Envelope};
pub use error::{DecodeStage, TunnelError};
