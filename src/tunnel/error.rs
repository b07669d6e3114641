//! Relay error taxonomy.
//!
//! Every failure on the tunnel path ends up here and is rendered in-band by
//! [`crate::http::response::in_band_error`]. The `Display` text of each
//! variant is the exact message the far end receives.

use std::fmt;
use std::num::ParseIntError;

use axum::http::StatusCode;
use thiserror::Error;

/// Which part of the envelope was being read when decoding failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    /// The 2-byte header length prefix.
    HeaderLength,
    /// The header block itself.
    Header,
    /// The 4-byte body length prefix.
    BodyLength,
    /// The body; only a stream failure lands here, never an early end.
    Body,
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DecodeStage::HeaderLength => "header len",
            DecodeStage::Header => "header",
            DecodeStage::BodyLength => "body len",
            DecodeStage::Body => "body",
        })
    }
}

/// Low-level failure while pulling bytes off the inbound body.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("unexpected EOF: wanted {wanted} bytes, got {got}")]
    UnexpectedEof { wanted: usize, got: usize },

    #[error("{0}")]
    Stream(String),
}

/// A failure anywhere between reading the envelope and receiving the
/// backend's response head.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("fetch {stage}:{source}")]
    Decode {
        stage: DecodeStage,
        #[source]
        source: ReadError,
    },

    #[error("fetch header:invalid request line: {0:?}")]
    InvalidRequestLine(String),

    #[error("fetch header:invalid request URI {uri:?}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    #[error("fetch header:invalid Content-Length {value:?}: {source}")]
    InvalidContentLength {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("fetch Host:{0} deny.")]
    ForbiddenHost(String),

    #[error("fetch remote:{0}")]
    Upstream(String),
}

impl TunnelError {
    pub(crate) fn decode(stage: DecodeStage, source: ReadError) -> Self {
        TunnelError::Decode { stage, source }
    }

    /// Status carried in the in-band status line.
    pub fn status(&self) -> StatusCode {
        match self {
            TunnelError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Metrics label for the stage that failed.
    pub fn outcome(&self) -> &'static str {
        match self {
            TunnelError::Decode { .. } => "decode",
            TunnelError::InvalidRequestLine(_)
            | TunnelError::InvalidUri { .. }
            | TunnelError::InvalidContentLength { .. } => "request",
            TunnelError::ForbiddenHost(_) => "forbidden",
            TunnelError::Upstream(_) => "upstream",
        }
    }

    /// Builds an upstream error from a transport failure, flattening the
    /// source chain so the message names the root cause.
    pub fn upstream(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.ends_with(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        TunnelError::Upstream(message)
    }
}
