//! Shared utilities for the relay integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use front_relay::config::RelayConfig;
use front_relay::http::HttpServer;
use front_relay::lifecycle::Shutdown;
use front_relay::security::DestinationGuard;

const CERT_PEM: &[u8] = include_bytes!("../fixtures/self-signed.crt");
const KEY_PEM: &[u8] = include_bytes!("../fixtures/self-signed.key");

/// A request as the backend saw it. Header values are the raw wire bytes.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
}

impl Recorded {
    /// Raw values of header `name` in arrival order, case-insensitive.
    pub fn header_bytes(&self, name: &str) -> Vec<Vec<u8>> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.header_bytes(name)
            .into_iter()
            .map(|v| String::from_utf8_lossy(&v).into_owned())
            .collect()
    }
}

/// Backend that answers every connection with a fixed raw response and
/// records what it was sent.
pub struct MockBackend {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockBackend {
    /// Plain HTTP backend.
    pub async fn start(response: &'static [u8]) -> Self {
        Self::spawn(response, None).await
    }

    /// HTTPS backend presenting the self-signed fixture certificate.
    pub async fn start_tls(response: &'static [u8]) -> Self {
        Self::spawn(response, Some(tls_acceptor())).await
    }

    async fn spawn(response: &'static [u8], tls: Option<TlsAcceptor>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let counter = connections.clone();
        let log = requests.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let log = log.clone();
                let tls = tls.clone();
                tokio::spawn(async move {
                    match tls {
                        Some(acceptor) => {
                            if let Ok(stream) = acceptor.accept(socket).await {
                                serve_once(stream, response, log).await;
                            }
                        }
                        None => serve_once(socket, response, log).await,
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            requests,
        }
    }

    /// `host:port` as the relay's allowlist must name it.
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn tls_acceptor() -> TlsAcceptor {
    let certs = rustls_pemfile::certs(&mut &CERT_PEM[..])
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut &KEY_PEM[..]).unwrap().unwrap();

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

async fn serve_once<S>(mut socket: S, response: &[u8], log: Arc<Mutex<Vec<Recorded>>>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let (mut recorded, head_len) = loop {
        let mut slots = [httparse::EMPTY_HEADER; 64];
        let mut request = httparse::Request::new(&mut slots);
        match request.parse(&buf) {
            Ok(httparse::Status::Complete(len)) => {
                let recorded = Recorded {
                    method: request.method.unwrap_or_default().to_owned(),
                    path: request.path.unwrap_or_default().to_owned(),
                    headers: request
                        .headers
                        .iter()
                        .map(|h| (h.name.to_owned(), h.value.to_vec()))
                        .collect(),
                    body: Vec::new(),
                };
                break (recorded, len);
            }
            Ok(httparse::Status::Partial) => {}
            Err(_) => return,
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let length: usize = recorded
        .header_values("content-length")
        .first()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut body = buf[head_len..].to_vec();
    while body.len() < length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
        }
    }
    recorded.body = body;
    log.lock().unwrap().push(recorded);

    let _ = socket.write_all(response).await;
    let _ = socket.shutdown().await;
}

/// Starts a relay with `config` on an ephemeral port, allowing only `hosts`.
///
/// Returns the tunnel endpoint and the shutdown handle keeping it alive.
pub async fn start_relay_with<I, S>(config: RelayConfig, hosts: I) -> (String, Shutdown)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let server = HttpServer::with_guard(config, DestinationGuard::with_hosts(hosts)).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });

    (format!("http://{}/2/", addr), shutdown)
}

/// [`start_relay_with`] using the default configuration.
pub async fn start_relay<I, S>(hosts: I) -> (String, Shutdown)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    start_relay_with(RelayConfig::default(), hosts).await
}

/// A port nothing listens on.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
