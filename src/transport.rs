//! Transport trait for byte-chunk sources.

use bytes::Bytes;

use crate::Result;

/// Response metadata produced by a successful [`Transport::open`].
#[derive(Debug, Clone)]
pub struct Handshake {
    /// The raw `Content-Type` header value, boundary parameter included.
    pub content_type: String,
}

/// Trait for MJPEG byte sources.
///
/// Transports abstract over where the multipart body comes from (live HTTP,
/// recorded dumps) and surface only connection-level concerns. They never
/// parse the body: the demuxer owns byte interpretation, so every back-end
/// shares one parser. The session's driver owns the transport, awaits it
/// under its timeouts, and aborts it by dropping it on cancellation.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Establish the connection and return the response metadata.
    ///
    /// Connection-level failures (DNS, refused, TLS) are `Connection`
    /// errors; an unusable response (bad status, missing content type) is a
    /// `Protocol` error.
    async fn open(&mut self) -> Result<Handshake>;

    /// Get the next chunk of body bytes.
    ///
    /// Returns:
    /// - `Ok(Some(chunk))` - more body bytes, in arrival order
    /// - `Ok(None)` - clean end of stream
    /// - `Err(e)` - transport failure
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}
