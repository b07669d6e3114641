//! Pooled outbound transport.
//!
//! # Responsibilities
//! - Own the two outbound connection pools (strict and relaxed TLS)
//! - Cap connect + TLS handshake time
//! - Bound idle keep-alive connections per destination
//!
//! # Design Decisions
//! - Built once at startup and shared by every request; the pools are
//!   internally synchronized, handlers never lock anything
//! - HTTP/1.1 only, title-cased header names on the wire
//! - No transparent compression: nothing adds `Accept-Encoding` and bodies
//!   pass through untouched
//! - No retries at this layer or any other

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::Uri;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::Service;

use crate::net::tls::{self, TlsPolicy};

/// Upper bound on establishing a connection, TLS handshake included.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle pooled connections kept per destination host.
pub const MAX_IDLE_PER_HOST: usize = 4;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pooled client used for tunneled requests.
pub type PooledClient = Client<HandshakeTimeout<HttpsConnector<HttpConnector>>, Body>;

/// Error raised when connecting to a backend outlives [`HANDSHAKE_TIMEOUT`].
#[derive(Debug, thiserror::Error)]
#[error("TLS handshake timeout after {0:?}")]
pub struct HandshakeTimedOut(pub Duration);

/// The process-wide outbound pools, one per TLS policy.
#[derive(Clone)]
pub struct TransportPools {
    strict: PooledClient,
    relaxed: PooledClient,
}

impl TransportPools {
    pub fn new() -> Result<Self, rustls::Error> {
        Ok(Self {
            strict: build_client(TlsPolicy::Strict)?,
            relaxed: build_client(TlsPolicy::Relaxed)?,
        })
    }

    pub fn client(&self, policy: TlsPolicy) -> &PooledClient {
        match policy {
            TlsPolicy::Strict => &self.strict,
            TlsPolicy::Relaxed => &self.relaxed,
        }
    }
}

fn build_client(policy: TlsPolicy) -> Result<PooledClient, rustls::Error> {
    let connector = HttpsConnectorBuilder::new()
        .with_tls_config(tls::client_config(policy)?)
        .https_or_http()
        .enable_http1()
        .build();

    tracing::debug!(
        ?policy,
        max_idle_per_host = MAX_IDLE_PER_HOST,
        handshake_timeout = ?HANDSHAKE_TIMEOUT,
        "Outbound pool initialized"
    );

    Ok(Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
        .http1_title_case_headers(true)
        .build(HandshakeTimeout::new(connector, HANDSHAKE_TIMEOUT)))
}

/// Connector wrapper that fails connection setup after a deadline.
#[derive(Debug, Clone)]
pub struct HandshakeTimeout<C> {
    inner: C,
    timeout: Duration,
}

impl<C> HandshakeTimeout<C> {
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl<C> Service<Uri> for HandshakeTimeout<C>
where
    C: Service<Uri>,
    C::Response: Send + 'static,
    C::Future: Send + 'static,
    C::Error: Into<BoxError>,
{
    type Response = C::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<C::Response, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let timeout = self.timeout;
        let connecting = self.inner.call(uri);
        Box::pin(async move {
            match tokio::time::timeout(timeout, connecting).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(HandshakeTimedOut(timeout).into()),
            }
        })
    }
}
