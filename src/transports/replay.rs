//! Replay transport for recorded multipart dumps.

use std::path::Path;

use bytes::Bytes;
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::transport::{Handshake, Transport};
use crate::Result;

/// Default chunk size for replayed streams.
const DEFAULT_CHUNK_BYTES: usize = 8 * 1024;

/// Transport replaying a recorded `multipart/x-mixed-replace` body from disk.
///
/// Behaves like the live HTTP transport from the session's point of view,
/// which makes end-to-end testing and development possible without a camera.
/// The dump is served in fixed-size chunks, optionally paced to a chunk
/// rate so timeout behavior can be exercised realistically.
#[derive(Debug)]
pub struct ReplayTransport {
    data: Vec<u8>,
    position: usize,
    chunk_bytes: usize,
    pacing: Option<Interval>,
    content_type: String,
}

impl ReplayTransport {
    /// Open a recorded dump.
    ///
    /// The dump is the raw body only, so the boundary token the recording
    /// was made with must be supplied; it is re-wrapped into the synthetic
    /// `Content-Type` returned by the handshake.
    pub fn open(path: impl AsRef<Path>, boundary_token: &str) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        info!(path = %path.display(), bytes = data.len(), "Opened recorded stream");

        Ok(Self::from_bytes(data, boundary_token))
    }

    /// Build a replay directly from bytes already in memory.
    pub fn from_bytes(data: impl Into<Vec<u8>>, boundary_token: &str) -> Self {
        Self {
            data: data.into(),
            position: 0,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            pacing: None,
            content_type: format!("multipart/x-mixed-replace; boundary={boundary_token}"),
        }
    }

    /// Set the chunk size the body is served in.
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    /// Pace the replay to a fixed number of chunks per second.
    pub fn with_chunks_per_second(mut self, rate: u32) -> Self {
        if rate > 0 {
            let mut pacing = interval(Duration::from_secs_f64(1.0 / rate as f64));
            pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.pacing = Some(pacing);
        }
        self
    }
}

#[async_trait::async_trait]
impl Transport for ReplayTransport {
    async fn open(&mut self) -> Result<Handshake> {
        debug!(content_type = %self.content_type, "Replay handshake");
        Ok(Handshake { content_type: self.content_type.clone() })
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.position >= self.data.len() {
            debug!("Replay exhausted");
            return Ok(None);
        }

        if let Some(pacing) = self.pacing.as_mut() {
            pacing.tick().await;
        }

        let end = (self.position + self.chunk_bytes).min(self.data.len());
        let chunk = Bytes::copy_from_slice(&self.data[self.position..end]);
        trace!(offset = self.position, len = chunk.len(), "Replaying chunk");
        self.position = end;

        Ok(Some(chunk))
    }
}
