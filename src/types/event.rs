//! Stream lifecycle and frame events.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;

use crate::MjpegError;

/// Why a session emitted its terminal [`FrameEvent::StreamEnded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EndReason {
    /// The server sent the closing `--boundary--` marker.
    TerminalBoundary,

    /// The transport reached a clean end of stream.
    TransportClosed,

    /// The caller stopped the session.
    Stopped,

    /// A fatal error ended the session; a `StreamError` event precedes this.
    Faulted,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::TerminalBoundary => f.write_str("terminal boundary"),
            EndReason::TransportClosed => f.write_str("transport closed"),
            EndReason::Stopped => f.write_str("stopped by caller"),
            EndReason::Faulted => f.write_str("fatal error"),
        }
    }
}

/// Event emitted by a streaming session.
///
/// This is the fundamental unit that flows from the demuxer through the
/// broadcast channel to subscribers. Events are immutable once constructed;
/// frame payloads are shared zero-copy via [`Bytes`].
///
/// Ordering guarantees per session:
/// - `StreamStarted` is first, `StreamEnded` is last, each exactly once
/// - `FrameBytes.sequence` starts at 0 and increases by exactly 1
/// - `FrameResolution` appears at most once, directly after the first
///   `FrameBytes`
#[derive(Debug, Clone)]
pub enum FrameEvent {
    /// Response headers were accepted and the boundary token extracted.
    StreamStarted { boundary_token: String, ts: SystemTime },

    /// One complete JPEG frame payload.
    FrameBytes { payload: Bytes, sequence: u64, ts: SystemTime },

    /// Width and height probed from the first frame's SOF marker.
    FrameResolution { width: u32, height: u32, ts: SystemTime },

    /// A failure occurred. Fatal causes are followed by `StreamEnded`;
    /// [`MjpegError::FrameTooLarge`] is recoverable and the stream continues.
    StreamError { cause: Arc<MjpegError>, ts: SystemTime },

    /// Terminal event; nothing follows it.
    StreamEnded { reason: EndReason, ts: SystemTime },
}

impl FrameEvent {
    /// Timestamp the event was constructed at.
    pub fn ts(&self) -> SystemTime {
        match self {
            FrameEvent::StreamStarted { ts, .. }
            | FrameEvent::FrameBytes { ts, .. }
            | FrameEvent::FrameResolution { ts, .. }
            | FrameEvent::StreamError { ts, .. }
            | FrameEvent::StreamEnded { ts, .. } => *ts,
        }
    }

    /// Whether this is a `FrameBytes` event.
    pub fn is_frame(&self) -> bool {
        matches!(self, FrameEvent::FrameBytes { .. })
    }

    /// Whether this is the terminal `StreamEnded` event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FrameEvent::StreamEnded { .. })
    }
}
