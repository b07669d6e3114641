//! Outbound forwarding of reconstructed requests.
//!
//! # Responsibilities
//! - Turn a [`ReconstructedRequest`] into a wire request for the backend
//! - Install the envelope body and its exact `Content-Length`
//! - Attach forwarding metadata headers
//! - Issue the round trip on the pooled transport
//!
//! # Design Decisions
//! - Exactly one attempt; any transport failure is a 502 in-band
//! - `Host` comes from the resolved host, not from header lines
//! - `Transfer-Encoding` lines are never copied; the body always goes out
//!   with its exact `Content-Length`
//! - The request URI must be absolute; origin-form targets fail as upstream
//!   errors

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::header::{HOST, TRANSFER_ENCODING};
use axum::http::{HeaderName, HeaderValue, Method, Request, Response, Uri};
use bytes::Bytes;
use hyper::body::Incoming;

use crate::http::request::ReconstructedRequest;
use crate::net::PooledClient;
use crate::security::headers::apply_forwarding_headers;
use crate::tunnel::TunnelError;

/// Issues tunneled requests against their real destination.
#[derive(Clone)]
pub struct Forwarder {
    client: PooledClient,
    front_id: HeaderValue,
}

impl Forwarder {
    pub fn new(client: PooledClient, front_id: HeaderValue) -> Self {
        Self { client, front_id }
    }

    /// Sends `request` with `body` and returns the backend's response head
    /// and streaming body.
    pub async fn forward(
        &self,
        request: ReconstructedRequest,
        body: Bytes,
        peer: SocketAddr,
    ) -> Result<Response<Incoming>, TunnelError> {
        let outbound = self.prepare(request, body, peer)?;

        tracing::debug!(
            method = %outbound.method(),
            uri = %outbound.uri(),
            "Forwarding tunneled request"
        );

        self.client
            .request(outbound)
            .await
            .map_err(|e| TunnelError::upstream(&e))
    }

    /// Builds the outbound request without sending it.
    pub fn prepare(
        &self,
        mut request: ReconstructedRequest,
        body: Bytes,
        peer: SocketAddr,
    ) -> Result<Request<Body>, TunnelError> {
        request.replace_body(body);

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TunnelError::Upstream(format!("invalid method {:?}", request.method)))?;
        let uri = absolute_target(&request.target)?;

        let mut outbound = Request::builder()
            .method(method)
            .uri(uri)
            .version(request.version)
            .body(Body::from(request.body.clone()))
            .map_err(|e| TunnelError::Upstream(e.to_string()))?;

        let headers = outbound.headers_mut();
        for (key, value) in request.headers.iter() {
            if key.eq_ignore_ascii_case(HOST.as_str())
                || key.eq_ignore_ascii_case(TRANSFER_ENCODING.as_str())
            {
                continue;
            }
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                TunnelError::Upstream(format!("invalid header field name {:?}", key))
            })?;
            let value = HeaderValue::from_bytes(value).map_err(|_| {
                TunnelError::Upstream(format!("invalid header field value for {:?}", key))
            })?;
            headers.append(name, value);
        }

        if !request.host.is_empty() {
            let host = HeaderValue::from_str(&request.host)
                .map_err(|_| TunnelError::Upstream(format!("invalid host {:?}", request.host)))?;
            headers.insert(HOST, host);
        }
        apply_forwarding_headers(headers, peer, &self.front_id);

        Ok(outbound)
    }
}

/// The outbound URI. Only absolute targets can be dialed.
fn absolute_target(target: &Uri) -> Result<Uri, TunnelError> {
    if target.scheme().is_some() && target.authority().is_some() {
        return Ok(target.clone());
    }
    Err(TunnelError::Upstream(format!(
        "unsupported protocol scheme \"{}\"",
        target.scheme_str().unwrap_or_default()
    )))
}
