//! Forwarding metadata headers.
//!
//! # Responsibilities
//! - Record the outer caller's address on the forwarded request
//! - Tag forwarded requests with the front identifier
//!
//! # Design Decisions
//! - The caller address goes out under two names, for backends that read
//!   either convention
//! - Values are overwritten, never appended: whatever the tunneled request
//!   claimed is discarded

use std::net::SocketAddr;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const XX_FORWARDED_FOR: HeaderName = HeaderName::from_static("xx-forwarded-for");
pub const X_FRONT: HeaderName = HeaderName::from_static("x-front");

/// Default value of the `X-Front` header.
pub const DEFAULT_FRONT_ID: &str = "heroku";

/// Sets the caller address and front identifier on an outbound request.
pub fn apply_forwarding_headers(headers: &mut HeaderMap, peer: SocketAddr, front_id: &HeaderValue) {
    // SocketAddr renders as a valid header value.
    if let Ok(addr) = HeaderValue::from_str(&peer.to_string()) {
        headers.insert(X_FORWARDED_FOR, addr.clone());
        headers.insert(XX_FORWARDED_FOR, addr);
    }
    headers.insert(X_FRONT, front_id.clone());
}
