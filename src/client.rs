//! Client side of the tunnel protocol.
//!
//! Builds header blocks, wraps them in envelopes, posts them to a relay and
//! parses the in-band response out of the outer body. Used by `relay-cli`.

use bytes::Bytes;
use thiserror::Error;

use crate::tunnel::envelope::{self, EncodeError};

/// Header lines accepted on an in-band response.
const MAX_HEADERS: usize = 128;

/// Error type for tunnel client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("relay answered with outer status {0}")]
    OuterStatus(u16),

    #[error("malformed in-band response: {0}")]
    Head(#[from] httparse::Error),

    #[error("in-band response head is incomplete")]
    Incomplete,
}

/// The real outcome carried inside an outer response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InBandResponse {
    pub protocol: String,
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl InBandResponse {
    /// Splits a raw `status line / headers / blank line / body` message.
    pub fn parse(raw: &[u8]) -> Result<Self, ClientError> {
        let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut head = httparse::Response::new(&mut slots);
        let head_len = match head.parse(raw)? {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => return Err(ClientError::Incomplete),
        };

        let headers = head
            .headers
            .iter()
            .map(|h| (h.name.to_owned(), String::from_utf8_lossy(h.value).into_owned()))
            .collect();

        Ok(Self {
            protocol: format!("HTTP/1.{}", head.version.unwrap_or(1)),
            status: head.code.unwrap_or_default(),
            reason: head.reason.unwrap_or_default().to_owned(),
            headers,
            body: Bytes::copy_from_slice(&raw[head_len..]),
        })
    }

    /// First value of header `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Renders a request line and header lines as an envelope header block.
pub fn header_block<'a, I>(method: &str, url: &str, headers: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut block = format!("{} {} HTTP/1.1\r\n", method, url);
    for (key, value) in headers {
        block.push_str(key);
        block.push_str(": ");
        block.push_str(value);
        block.push_str("\r\n");
    }
    block
}

/// Posts envelopes to a relay's tunnel endpoint.
#[derive(Debug, Clone)]
pub struct TunnelClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TunnelClient {
    /// `endpoint` is the full tunnel URL, e.g. `http://relay:8080/2/`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub async fn send(&self, header_block: &str, body: &[u8]) -> Result<InBandResponse, ClientError> {
        let wire = envelope::encode(header_block.as_bytes(), body)?;

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(wire)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::OuterStatus(status.as_u16()));
        }

        let raw = response.bytes().await?;
        InBandResponse::parse(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_response() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nX-A: 1\r\nX-A: 2\r\n\r\nhello";
        let parsed = InBandResponse::parse(raw).unwrap();
        assert_eq!(parsed.protocol, "HTTP/1.1");
        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.reason, "OK");
        assert_eq!(parsed.header("content-type"), Some("text/plain"));
        assert_eq!(parsed.headers.len(), 3);
        assert_eq!(&parsed.body[..], b"hello");
    }

    #[test]
    fn parses_relay_error() {
        let raw = b"HTTP/1.1 502\r\nContent-Length: 5\r\nContent-Type: text/plain\r\n\r\noops!";
        let parsed = InBandResponse::parse(raw).unwrap();
        assert_eq!(parsed.status, 502);
        assert_eq!(parsed.reason, "");
        assert_eq!(&parsed.body[..], b"oops!");
    }

    #[test]
    fn rejects_garbage_and_truncated_heads() {
        assert!(matches!(
            InBandResponse::parse(b"no separator"),
            Err(ClientError::Head(_))
        ));
        assert!(matches!(
            InBandResponse::parse(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n"),
            Err(ClientError::Incomplete)
        ));
    }

    #[test]
    fn keeps_body_bytes_after_head() {
        let raw = b"HTTP/1.1 200 OK\r\n\r\n\r\n\r\nbinary\x00\xFF";
        let parsed = InBandResponse::parse(raw).unwrap();
        assert!(parsed.headers.is_empty());
        assert_eq!(&parsed.body[..], b"\r\n\r\nbinary\x00\xFF");
    }

    #[test]
    fn header_block_layout() {
        let block = header_block(
            "POST",
            "http://dns.xx-net.net/q",
            [("Host", "dns.xx-net.net"), ("X-A", "1")],
        );
        assert_eq!(
            block,
            "POST http://dns.xx-net.net/q HTTP/1.1\r\nHost: dns.xx-net.net\r\nX-A: 1\r\n"
        );
    }
}
