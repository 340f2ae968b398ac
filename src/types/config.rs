//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound on the initial connect + response-header wait.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on the wait for the first complete frame after headers.
pub const DEFAULT_FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on silence during playback.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default per-frame size ceiling (2 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 2 * 1024 * 1024;

/// Configuration for a streaming session.
///
/// All timeouts are wall-clock. `target_fps` is advisory: it paces what
/// subscribers see (see [`CameraSession::subscribe`](crate::CameraSession::subscribe)),
/// it does not influence parsing or the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Bounds the initial TCP/TLS connect and response-header wait.
    pub connect_timeout: Duration,

    /// Bounds the wait for the first complete frame after headers arrive.
    pub first_frame_timeout: Duration,

    /// Bounds silence during playback; reset on every received chunk.
    pub stall_timeout: Duration,

    /// Per-frame size ceiling. Larger frames are dropped with a
    /// recoverable `FrameTooLarge` error event.
    pub max_frame_bytes: usize,

    /// Advisory subscriber-side frame rate cap.
    pub target_fps: Option<u32>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            first_frame_timeout: DEFAULT_FIRST_FRAME_TIMEOUT,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            target_fps: None,
        }
    }
}

impl StreamConfig {
    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the first-frame timeout.
    pub fn with_first_frame_timeout(mut self, timeout: Duration) -> Self {
        self.first_frame_timeout = timeout;
        self
    }

    /// Set the stall timeout.
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Set the per-frame size ceiling.
    pub fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = limit;
        self
    }

    /// Set the advisory subscriber-side frame rate cap.
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Pacing interval implied by `target_fps`, if any.
    pub fn pace_interval(&self) -> Option<Duration> {
        self.target_fps.filter(|fps| *fps > 0).map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
    }
}
