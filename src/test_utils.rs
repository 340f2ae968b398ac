//! Test utilities: multipart stream builders, synthetic JPEGs, and a
//! scripted in-memory transport for session-level tests.

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::time::Duration;

use crate::transport::{Handshake, Transport};
use crate::{MjpegError, Result};

/// Boundary token used by the fixtures.
pub const TEST_BOUNDARY: &str = "camwire_test";

/// One complete multipart part: boundary line, headers, payload, CRLF.
pub fn part(boundary: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 96);
    out.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            payload.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(payload);
    out.extend_from_slice(b"\r\n");
    out
}

/// A full multipart body carrying the given payloads, optionally closed
/// with the terminal boundary.
pub fn multipart_stream(boundary: &str, payloads: &[&[u8]], terminal: bool) -> Vec<u8> {
    let mut out = Vec::new();
    for payload in payloads {
        out.extend_from_slice(&part(boundary, payload));
    }
    if terminal {
        out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    }
    out
}

/// Minimal but structurally valid baseline JPEG with the given dimensions.
pub fn fake_jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];

    // APP0 / JFIF
    out.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
    out.extend_from_slice(b"JFIF\0");
    out.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);

    // SOF0: length 17, precision 8, height, width, 3 components
    out.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&[0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01]);

    // SOS with a token amount of entropy data
    out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x0C, 0x03, 0x01, 0x00, 0x02, 0x11, 0x03, 0x11, 0x00, 0x3F, 0x00]);
    out.extend_from_slice(&[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);
    out.extend_from_slice(&[0xFF, 0xD9]);

    out
}

/// What a [`ScriptedTransport`] does once its chunks are exhausted.
pub enum AfterChunks {
    /// Report a clean end of stream.
    Close,
    /// Block forever (until the driver's timeout or a stop).
    Hang,
    /// Fail with the given error.
    Fail(Option<MjpegError>),
}

/// In-memory transport that plays a script, for session-level tests.
pub struct ScriptedTransport {
    content_type: String,
    open_delay: Option<Duration>,
    open_error: Option<MjpegError>,
    chunks: VecDeque<Bytes>,
    after: AfterChunks,
}

impl ScriptedTransport {
    pub fn new(content_type: &str) -> Self {
        Self {
            content_type: content_type.to_string(),
            open_delay: None,
            open_error: None,
            chunks: VecDeque::new(),
            after: AfterChunks::Close,
        }
    }

    /// Transport serving the given body in fixed-size chunks under the
    /// standard test content type.
    pub fn serving(body: &[u8], chunk_bytes: usize) -> Self {
        let content_type = format!("multipart/x-mixed-replace; boundary={TEST_BOUNDARY}");
        Self::new(&content_type).with_body(body, chunk_bytes)
    }

    pub fn with_body(mut self, body: &[u8], chunk_bytes: usize) -> Self {
        self.chunks = body.chunks(chunk_bytes.max(1)).map(Bytes::copy_from_slice).collect();
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn failing_open(mut self, error: MjpegError) -> Self {
        self.open_error = Some(error);
        self
    }

    pub fn then(mut self, after: AfterChunks) -> Self {
        self.after = after;
        self
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn open(&mut self) -> Result<Handshake> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.open_error.take() {
            return Err(error);
        }
        Ok(Handshake { content_type: self.content_type.clone() })
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if let Some(chunk) = self.chunks.pop_front() {
            return Ok(Some(chunk));
        }
        match &mut self.after {
            AfterChunks::Close => Ok(None),
            AfterChunks::Hang => futures::future::pending().await,
            AfterChunks::Fail(error) => Err(error.take().unwrap_or(MjpegError::Aborted)),
        }
    }
}
