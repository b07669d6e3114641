//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the tunnel endpoint and static fallback
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener
//! - Run each tunnel request through decode → reconstruct → guard →
//!   forward → serialize
//!
//! # Design Decisions
//! - The tunnel handler never fails at the HTTP level: every outcome is
//!   a 200 whose body carries the real result
//! - Shared state is read-only apart from the pooled clients, which
//!   synchronize internally

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderName, HeaderValue, Request},
    response::Response,
    routing::any,
    Router,
};
use hyper::body::Incoming;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::{
    request_id::SetRequestIdLayer,
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::RelayConfig;
use crate::http::forward::Forwarder;
use crate::http::request::{request_id, MakeRequestUuid, ReconstructedRequest, X_REQUEST_ID};
use crate::http::response;
use crate::lifecycle::ShutdownSignal;
use crate::net::TransportPools;
use crate::observability::metrics;
use crate::security::DestinationGuard;
use crate::tunnel::{self, TunnelError};

/// Error raised while assembling the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to build outbound TLS configuration: {0}")]
    Tls(#[from] rustls::Error),

    #[error("tunnel.front_id is not a valid header value")]
    FrontId(#[from] axum::http::header::InvalidHeaderValue),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<DestinationGuard>,
    pub forwarder: Forwarder,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a server forwarding to the compiled-in destinations.
    pub fn new(config: RelayConfig) -> Result<Self, ServerError> {
        Self::with_guard(config, DestinationGuard::default())
    }

    /// Create a server with an explicit destination guard.
    pub fn with_guard(config: RelayConfig, guard: DestinationGuard) -> Result<Self, ServerError> {
        let pools = TransportPools::new()?;
        let front_id = HeaderValue::from_str(&config.tunnel.front_id)?;
        let client = pools.client(config.tunnel.transport).clone();

        tracing::info!(
            transport = ?config.tunnel.transport,
            path_prefix = %config.tunnel.path_prefix,
            "Tunnel configured"
        );

        let state = AppState {
            guard: Arc::new(guard),
            forwarder: Forwarder::new(client, front_id),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let prefix = config.tunnel.path_prefix.as_str();
        Router::new()
            .route(prefix, any(tunnel_handler))
            .route(&format!("{prefix}{{*rest}}"), any(tunnel_handler))
            .fallback_service(ServeDir::new(&config.static_files.root))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(
                HeaderName::from_static(X_REQUEST_ID),
                MakeRequestUuid,
            ))
    }

    /// The router, for driving the server without a socket.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.recv())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Tunnel endpoint.
async fn tunnel_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(&request).to_owned();

    match relay(&state, request.into_body(), peer).await {
        Ok(backend) => {
            tracing::debug!(
                request_id = %request_id,
                status = %backend.status(),
                "Tunneled request completed"
            );
            metrics::record_tunnel("forwarded", start);
            response::tunneled(backend)
        }
        Err(err) => {
            tracing::debug!(
                request_id = %request_id,
                peer = %peer,
                error = %err,
                "Tunneled request failed"
            );
            metrics::record_tunnel(err.outcome(), start);
            response::in_band_error(&err)
        }
    }
}

async fn relay(
    state: &AppState,
    body: Body,
    peer: SocketAddr,
) -> Result<axum::http::Response<Incoming>, TunnelError> {
    let envelope = tunnel::decode(body.into_data_stream()).await?;
    let request = ReconstructedRequest::parse(&envelope.header)?;
    state.guard.check(&request)?;
    state.forwarder.forward(request, envelope.body, peer).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::StatusCode;
    use std::io::Write;
    use tower::ServiceExt;

    fn app(config: RelayConfig) -> Router {
        HttpServer::new(config)
            .unwrap()
            .into_router()
            .layer(MockConnectInfo(SocketAddr::from(([203, 0, 113, 1], 50000))))
    }

    async fn call(app: Router, uri: &str, body: Vec<u8>) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn forbidden_host_is_rejected_in_band() {
        let header = b"GET http://evil.example.com/path HTTP/1.1\r\nHost: evil.example.com\r\n";
        let wire = tunnel::encode(header, b"hello").unwrap();

        let (status, body) = call(app(RelayConfig::default()), "/2/", wire.to_vec()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("HTTP/1.1 400\r\n"), "{body}");
        assert!(body.ends_with("fetch Host:evil.example.com deny."));
    }

    #[tokio::test]
    async fn truncated_envelope_is_rejected_in_band() {
        let mut wire = vec![0x00, 50];
        wire.extend_from_slice(&[b'G'; 10]);

        let (status, body) = call(app(RelayConfig::default()), "/2/anything", wire).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("HTTP/1.1 400\r\n"));
        assert!(body.contains("\r\n\r\nfetch header:"));
    }

    #[tokio::test]
    async fn bad_request_line_is_rejected_in_band() {
        let wire = tunnel::encode(b"GET /only-two-tokens\r\n", b"").unwrap();
        let (status, body) = call(app(RelayConfig::default()), "/2/", wire.to_vec()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("HTTP/1.1 400\r\n"));
        assert!(body.contains("invalid request line"));
    }

    #[tokio::test]
    async fn empty_host_is_rejected_in_band() {
        let wire = tunnel::encode(b"GET /x HTTP/1.1\r\n", b"").unwrap();
        let (_, body) = call(app(RelayConfig::default()), "/2/", wire.to_vec()).await;
        assert!(body.ends_with("fetch Host: deny."));
    }

    #[tokio::test]
    async fn other_paths_serve_static_files() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("docs")).unwrap();
        std::fs::File::create(root.path().join("index.html"))
            .unwrap()
            .write_all(b"<h1>front</h1>")
            .unwrap();
        std::fs::File::create(root.path().join("docs").join("index.html"))
            .unwrap()
            .write_all(b"docs")
            .unwrap();

        let mut config = RelayConfig::default();
        config.static_files.root = root.path().to_string_lossy().into_owned();

        let request = Request::get("/").body(Body::empty()).unwrap();
        let response = app(config.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>front</h1>");

        let request = Request::get("/docs/").body(Body::empty()).unwrap();
        let response = app(config.clone()).oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"docs");

        let request = Request::get("/missing.txt").body(Body::empty()).unwrap();
        let response = app(config).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn custom_prefix_moves_the_tunnel() {
        let mut config = RelayConfig::default();
        config.tunnel.path_prefix = "/t/".into();

        let wire = tunnel::encode(b"GET http://evil.example.com/ HTTP/1.1\r\n", b"").unwrap();
        let (_, body) = call(app(config), "/t/x", wire.to_vec()).await;
        assert!(body.starts_with("HTTP/1.1 400\r\n"));
    }
}
