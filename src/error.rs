//! Error types for MJPEG stream processing.
//!
//! All failures in this crate funnel through [`MjpegError`]. Inside a running
//! session, errors are additionally surfaced to subscribers as
//! [`FrameEvent::StreamError`](crate::FrameEvent::StreamError) — nothing
//! escapes the event channel as a panic.
//!
//! ## Error Categories
//!
//! - **Connection**: DNS/refused/TLS failures, connect timeouts, mid-stream
//!   read errors from the transport
//! - **Protocol**: wrong content type, missing `boundary` parameter,
//!   non-success HTTP status
//! - **FrameTooLarge**: a single part body exceeded the configured ceiling
//! - **Stall**: the connection stayed open but no bytes arrived in time
//! - **Aborted**: the caller stopped the session
//!
//! ## Fatality
//!
//! Only `FrameTooLarge` is recoverable: the session drops that frame and
//! keeps parsing. Every other category ends the session; retry/backoff
//! policy belongs to the caller.
//!
//! ```rust
//! use camwire::MjpegError;
//!
//! let error = MjpegError::protocol("content type is not multipart/x-mixed-replace");
//! assert!(error.is_fatal());
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type alias for stream operations.
pub type Result<T, E = MjpegError> = std::result::Result<T, E>;

/// Main error type for MJPEG stream operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MjpegError {
    #[error("Failed to connect to stream: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Protocol violation: {reason}")]
    Protocol { reason: String },

    #[error("Frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Stream stalled: no data within {timeout:?}")]
    Stall { timeout: Duration },

    #[error("Stream aborted by caller")]
    Aborted,
}

impl MjpegError {
    /// Returns whether this error ends the session.
    ///
    /// Only [`MjpegError::FrameTooLarge`] is survivable: the offending frame
    /// is dropped and parsing resumes at the next boundary.
    pub fn is_fatal(&self) -> bool {
        match self {
            MjpegError::Connection { .. } => true,
            MjpegError::Protocol { .. } => true,
            MjpegError::FrameTooLarge { .. } => false,
            MjpegError::Stall { .. } => true,
            MjpegError::Aborted => true,
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        MjpegError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with an underlying cause.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        MjpegError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for protocol violations.
    pub fn protocol(reason: impl Into<String>) -> Self {
        MjpegError::Protocol { reason: reason.into() }
    }

    /// Helper constructor for oversized frames.
    pub fn frame_too_large(size: usize, limit: usize) -> Self {
        MjpegError::FrameTooLarge { size, limit }
    }

    /// Helper constructor for stalled streams.
    pub fn stall(timeout: Duration) -> Self {
        MjpegError::Stall { timeout }
    }
}

impl From<std::io::Error> for MjpegError {
    fn from(err: std::io::Error) -> Self {
        MjpegError::Connection { reason: "I/O error".to_string(), source: Some(Box::new(err)) }
    }
}
