//! Inner request reconstruction and request IDs.
//!
//! # Responsibilities
//! - Parse the envelope's header block into a [`ReconstructedRequest`]
//! - Keep header lines in arrival order, duplicates included
//! - Derive the destination host (URI authority, else `Host` header)
//! - Generate a request ID for every outer request
//!
//! # Design Decisions
//! - Parsing is lenient: header lines without a colon are skipped
//! - The protocol tag on the request line is read but not trusted;
//!   the inner request is always HTTP/1.1
//! - Host resolution never fails here; an empty host is rejected later by
//!   the destination allowlist

use axum::http::{HeaderValue, Request, Uri, Version};
use bytes::Bytes;
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::tunnel::TunnelError;

/// Header carrying the per-request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Ordered header multimap.
///
/// Keys keep the spelling they arrived with; lookups are case-insensitive.
/// Values are raw bytes, so obs-text passes through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, Vec<u8>)>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, keeping any existing values for the same key.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.push((key.into(), value.into()));
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_slice())
    }

    /// All values for `key`, in arrival order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_slice())
    }

    /// Replaces every value for `key` with a single entry.
    ///
    /// The new entry takes the position of the first existing one, or goes
    /// to the end when the key was absent.
    pub fn set(&mut self, key: &str, value: impl Into<Vec<u8>>) {
        let value = value.into();
        match self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some(first) => {
                self.entries[first].1 = value;
                let mut index = 0;
                self.entries.retain(|(k, _)| {
                    let keep = index <= first || !k.eq_ignore_ascii_case(key);
                    index += 1;
                    keep
                });
            }
            None => self.entries.push((key.to_owned(), value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The request described inside an envelope.
///
/// Owned by a single tunnel invocation.
#[derive(Debug, Clone)]
pub struct ReconstructedRequest {
    pub method: String,
    pub request_uri: String,
    pub target: Uri,
    pub version: Version,
    pub host: String,
    pub headers: HeaderList,
    pub content_length: i64,
    pub body: Bytes,
}

impl ReconstructedRequest {
    /// Parses a header block: one request line, then `Key: Value` lines.
    ///
    /// Works on raw bytes; only the request line and header names are read
    /// as text.
    pub fn parse(block: &[u8]) -> Result<Self, TunnelError> {
        let mut lines = block
            .split(|b| *b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line));

        let request_line = lines.next().unwrap_or_default();
        let parts: Vec<&[u8]> = request_line.split(|b| *b == b' ').collect();
        let [method, request_uri, _protocol] = parts[..] else {
            return Err(TunnelError::InvalidRequestLine(
                String::from_utf8_lossy(request_line).into_owned(),
            ));
        };

        let target = Uri::try_from(request_uri).map_err(|source| TunnelError::InvalidUri {
            uri: String::from_utf8_lossy(request_uri).into_owned(),
            source,
        })?;

        let mut headers = HeaderList::new();
        for line in lines {
            let Some(colon) = line.iter().position(|b| *b == b':') else {
                continue;
            };
            let key = String::from_utf8_lossy(line[..colon].trim_ascii());
            headers.append(key, line[colon + 1..].trim_ascii());
        }

        let content_length = match headers.get("Content-Length") {
            Some(value) if !value.is_empty() => {
                let value = String::from_utf8_lossy(value);
                value
                    .parse::<i64>()
                    .map_err(|source| TunnelError::InvalidContentLength {
                        value: value.to_string(),
                        source,
                    })?
            }
            _ => 0,
        };

        let host = match authority_host(&target) {
            Some(host) if !host.is_empty() => host.to_owned(),
            _ => String::from_utf8_lossy(headers.get("Host").unwrap_or_default()).into_owned(),
        };

        Ok(Self {
            method: String::from_utf8_lossy(method).into_owned(),
            request_uri: String::from_utf8_lossy(request_uri).into_owned(),
            target,
            version: Version::HTTP_11,
            host,
            headers,
            content_length,
            body: Bytes::new(),
        })
    }

    /// Installs the envelope body and makes `Content-Length` agree with it,
    /// whatever the header block declared.
    pub fn replace_body(&mut self, body: Bytes) {
        self.content_length = body.len() as i64;
        self.headers.set("Content-Length", body.len().to_string());
        self.body = body;
    }
}

/// Host and port of the URI authority, without userinfo.
fn authority_host(uri: &Uri) -> Option<&str> {
    let authority = uri.authority()?.as_str();
    Some(authority.rsplit_once('@').map_or(authority, |(_, host)| host))
}

/// UUID v4 request IDs for the outer request.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Reads the request ID assigned by [`MakeRequestUuid`].
pub fn request_id<B>(request: &Request<B>) -> &str {
    request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
}
