//! Envelope framing.
//!
//! ```text
//! +----------------+-----------------+----------------+---------------+
//! | u16 BE hdr len | header block    | u32 BE body len| body          |
//! +----------------+-----------------+----------------+---------------+
//! ```
//!
//! No version tag, no checksum. The header block is the inner request's
//! request line and header lines; the body is the inner request body.

use std::fmt::Display;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use thiserror::Error;

use crate::tunnel::error::{DecodeStage, ReadError, TunnelError};

/// One decoded envelope. Lives for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub header: Bytes,
    pub body: Bytes,
}

/// Error returned by [`encode`] when a block does not fit its length prefix.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("header block is {0} bytes, limit is 65535")]
    HeaderTooLarge(usize),

    #[error("body is {0} bytes, limit is 4294967295")]
    BodyTooLarge(usize),
}

/// Reads an envelope off a chunked byte stream.
///
/// The header length, header block and body length must be complete. The body
/// is a capped read: a stream that ends before `body_len` bytes yields the
/// shorter body without error. Bytes after the body are ignored.
pub async fn decode<S, E>(stream: S) -> Result<Envelope, TunnelError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut reader = FrameReader::new(stream);

    let header_len = reader
        .read_exact(2)
        .await
        .map_err(|e| TunnelError::decode(DecodeStage::HeaderLength, e))?
        .get_u16();

    let header = reader
        .read_exact(usize::from(header_len))
        .await
        .map_err(|e| TunnelError::decode(DecodeStage::Header, e))?;

    let body_len = reader
        .read_exact(4)
        .await
        .map_err(|e| TunnelError::decode(DecodeStage::BodyLength, e))?
        .get_u32();

    let body = reader
        .read_up_to(body_len as usize)
        .await
        .map_err(|e| TunnelError::decode(DecodeStage::Body, e))?;

    if body.len() < body_len as usize {
        tracing::debug!(declared = body_len, received = body.len(), "Envelope body ended early");
    }

    Ok(Envelope { header, body })
}

/// Frames a header block and body into envelope wire form.
pub fn encode(header: &[u8], body: &[u8]) -> Result<Bytes, EncodeError> {
    let header_len =
        u16::try_from(header.len()).map_err(|_| EncodeError::HeaderTooLarge(header.len()))?;
    let body_len = u32::try_from(body.len()).map_err(|_| EncodeError::BodyTooLarge(body.len()))?;

    let mut out = BytesMut::with_capacity(2 + header.len() + 4 + body.len());
    out.put_u16(header_len);
    out.put_slice(header);
    out.put_u32(body_len);
    out.put_slice(body);
    Ok(out.freeze())
}

/// Pull-based reader over a stream of body chunks.
struct FrameReader<S> {
    stream: S,
    buffered: BytesMut,
    finished: bool,
}

impl<S, E> FrameReader<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    fn new(stream: S) -> Self {
        Self {
            stream,
            buffered: BytesMut::new(),
            finished: false,
        }
    }

    /// Buffers the next chunk. Returns `false` once the stream is exhausted.
    async fn fill(&mut self) -> Result<bool, ReadError> {
        if self.finished {
            return Ok(false);
        }
        match self.stream.next().await {
            Some(Ok(chunk)) => {
                self.buffered.extend_from_slice(&chunk);
                Ok(true)
            }
            Some(Err(e)) => Err(ReadError::Stream(e.to_string())),
            None => {
                self.finished = true;
                Ok(false)
            }
        }
    }

    async fn read_exact(&mut self, n: usize) -> Result<Bytes, ReadError> {
        while self.buffered.len() < n {
            if !self.fill().await? {
                return Err(ReadError::UnexpectedEof {
                    wanted: n,
                    got: self.buffered.len(),
                });
            }
        }
        Ok(self.buffered.split_to(n).freeze())
    }

    async fn read_up_to(&mut self, n: usize) -> Result<Bytes, ReadError> {
        while self.buffered.len() < n && self.fill().await? {}
        let take = n.min(self.buffered.len());
        Ok(self.buffered.split_to(take).freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::io;

    fn chunks(parts: Vec<&'static [u8]>) -> impl Stream<Item = Result<Bytes, io::Error>> + Unpin {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p))))
    }

    #[tokio::test]
    async fn round_trip_preserves_blocks() {
        let header = b"GET http://center.xx-net.net/path HTTP/1.1\r\nHost: center.xx-net.net\r\n";
        let body = b"hello";
        let wire = encode(header, body).unwrap();

        // Split the frame at awkward offsets to exercise buffering.
        let (a, rest) = wire.split_at(1);
        let (b, c) = rest.split_at(40);
        let stream = stream::iter(vec![
            Ok::<_, io::Error>(Bytes::copy_from_slice(a)),
            Ok(Bytes::copy_from_slice(b)),
            Ok(Bytes::copy_from_slice(c)),
        ]);

        let envelope = decode(stream).await.unwrap();
        assert_eq!(&envelope.header[..], &header[..]);
        assert_eq!(&envelope.body[..], &body[..]);
    }

    #[tokio::test]
    async fn truncated_header_block_is_a_header_error() {
        let mut wire = vec![0x00, 50];
        wire.extend_from_slice(&[b'x'; 10]);
        let stream = stream::iter(vec![Ok::<_, io::Error>(Bytes::from(wire))]);

        match decode(stream).await {
            Err(TunnelError::Decode { stage, source }) => {
                assert_eq!(stage, DecodeStage::Header);
                assert!(matches!(source, ReadError::UnexpectedEof { wanted: 50, got: 10 }));
            }
            other => panic!("expected header decode error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_prefixes_report_their_stage() {
        let err = decode(chunks(vec![])).await.unwrap_err();
        assert!(matches!(err, TunnelError::Decode { stage: DecodeStage::HeaderLength, .. }));

        let err = decode(chunks(vec![b"\x00"])).await.unwrap_err();
        assert!(matches!(err, TunnelError::Decode { stage: DecodeStage::HeaderLength, .. }));

        let err = decode(chunks(vec![b"\x00\x02ab\x00\x00"])).await.unwrap_err();
        assert!(matches!(err, TunnelError::Decode { stage: DecodeStage::BodyLength, .. }));
    }

    #[tokio::test]
    async fn short_body_is_accepted() {
        let stream = chunks(vec![b"\x00\x02ab", b"\x00\x00\x00\x0a", b"abc"]);
        let envelope = decode(stream).await.unwrap();
        assert_eq!(&envelope.header[..], b"ab");
        assert_eq!(&envelope.body[..], b"abc");
    }

    #[tokio::test]
    async fn trailing_bytes_after_body_are_ignored() {
        let stream = chunks(vec![b"\x00\x01a\x00\x00\x00\x02xyz"]);
        let envelope = decode(stream).await.unwrap();
        assert_eq!(&envelope.body[..], b"xy");
    }

    #[tokio::test]
    async fn stream_failure_in_body_is_a_body_error() {
        let stream = stream::iter(vec![
            Ok(Bytes::from_static(b"\x00\x01a\x00\x00\x00\x08abc")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
        ]);
        let err = decode(stream).await.unwrap_err();
        assert!(matches!(err, TunnelError::Decode { stage: DecodeStage::Body, .. }));
        assert_eq!(err.to_string(), "fetch body:connection reset");
    }

    #[test]
    fn encode_rejects_oversized_header() {
        let header = vec![b'h'; 70_000];
        assert!(matches!(encode(&header, b""), Err(EncodeError::HeaderTooLarge(70_000))));
    }
}
