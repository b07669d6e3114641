//! In-band response serialization.
//!
//! # Responsibilities
//! - Wrap every tunnel outcome in an outer `200 OK`
//! - Render the backend's status line and headers as raw HTTP text
//! - Stream the backend body after the head without buffering it
//! - Render relay failures as a small `text/plain` pseudo-response
//!
//! # Design Decisions
//! - `Transfer-Encoding` is never emitted: the body is already de-chunked
//! - `Content-Length` is rewritten from the body's known length when that
//!   length is positive
//! - A backend body that fails mid-copy ends the outer body early; the
//!   outer status has already been sent

use axum::body::{Body, HttpBody};
use axum::http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::response::Parts;
use axum::http::{HeaderMap, StatusCode, Version};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::{future, stream, StreamExt};

use crate::tunnel::TunnelError;

/// Wire tag for a protocol version.
pub fn protocol_tag(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// Canonical MIME form of a header name: `content-type` → `Content-Type`.
///
/// Names containing characters outside the token set are returned as-is.
pub fn canonical_header_name(name: &str) -> String {
    let is_token = |b: u8| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b);
    if !name.bytes().all(is_token) {
        return name.to_owned();
    }

    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() };
            upper = c == '-';
            out
        })
        .collect()
}

/// Status line, headers and terminating blank line of a backend response.
///
/// `known_length` is the body length when the backend declared one.
///
/// Headers come out in `HeaderMap` order: all values of a repeated name are
/// written together, in the order they were received.
pub fn serialize_head(parts: &Parts, known_length: Option<u64>) -> Vec<u8> {
    let reason = parts
        .extensions
        .get::<hyper::ext::ReasonPhrase>()
        .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned())
        .or_else(|| parts.status.canonical_reason().map(str::to_owned))
        .unwrap_or_default();

    let mut head = format!("{} {}", protocol_tag(parts.version), parts.status.as_u16());
    if !reason.is_empty() {
        head.push(' ');
        head.push_str(&reason);
    }
    head.push_str("\r\n");

    let mut out = head.into_bytes();
    write_headers(&mut out, &parts.headers, known_length.filter(|len| *len > 0));
    out.extend_from_slice(b"\r\n");
    out
}

fn write_headers(out: &mut Vec<u8>, headers: &HeaderMap, content_length: Option<u64>) {
    let mut length_written = false;

    for (name, value) in headers {
        if name == TRANSFER_ENCODING {
            continue;
        }
        if name == CONTENT_LENGTH {
            if let Some(len) = content_length {
                if !length_written {
                    out.extend_from_slice(format!("Content-Length: {}\r\n", len).as_bytes());
                    length_written = true;
                }
                continue;
            }
        }
        out.extend_from_slice(canonical_header_name(name.as_str()).as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    if let (Some(len), false) = (content_length, length_written) {
        out.extend_from_slice(format!("Content-Length: {}\r\n", len).as_bytes());
    }
}

/// Wraps a backend response for the outer exchange.
pub fn tunneled<B>(response: axum::http::Response<B>) -> Response
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    let (parts, body) = response.into_parts();
    let head = serialize_head(&parts, body.size_hint().exact());

    let payload = Body::new(body)
        .into_data_stream()
        .take_while(|chunk| {
            if let Err(e) = chunk {
                tracing::debug!(error = %e, "Backend body ended with error");
            }
            future::ready(chunk.is_ok())
        });

    let stream = stream::once(future::ready(Ok::<_, axum::Error>(Bytes::from(head)))).chain(payload);
    (StatusCode::OK, Body::from_stream(stream)).into_response()
}

/// Renders a relay failure as an in-band pseudo-response.
pub fn in_band_error(err: &TunnelError) -> Response {
    let message = err.to_string();
    let body = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: text/plain\r\n\r\n{}",
        err.status().as_u16(),
        message.len(),
        message
    );
    (StatusCode::OK, body).into_response()
}
