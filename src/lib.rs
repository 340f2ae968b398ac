//! Async MJPEG streaming client for Rust.
//!
//! Camwire consumes `multipart/x-mixed-replace` HTTP streams (MJPEG) and
//! emits discrete JPEG frames plus lifecycle events to subscribers.
//!
//! # Features
//!
//! - **Incremental demuxing**: chunk-boundary-agnostic multipart parsing;
//!   frames, headers, and boundary markers may be split arbitrarily
//! - **Lifecycle state machine**: connect/first-frame/stall timeouts with a
//!   clean, typed event stream
//! - **Multi-subscriber**: broadcast fan-out with zero-copy frame payloads
//! - **Shared parser**: one demuxer across live HTTP and recorded replays
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use camwire::{Camwire, FrameEvent};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> camwire::Result<()> {
//!     let session = Camwire::connect("http://camera.local/stream")?;
//!     let mut events = Box::pin(session.subscribe());
//!
//!     while let Some(event) = events.next().await {
//!         match event {
//!             FrameEvent::FrameBytes { payload, sequence, .. } => {
//!                 println!("frame {sequence}: {} bytes", payload.len());
//!             }
//!             FrameEvent::FrameResolution { width, height, .. } => {
//!                 println!("stream is {width}x{height}");
//!             }
//!             FrameEvent::StreamEnded { reason, .. } => {
//!                 println!("stream ended: {reason}");
//!                 break;
//!             }
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Reconnection is deliberately left to the caller: a session that ends
//! stays ended, and whatever retry/backoff policy fits the application can
//! be built by constructing a fresh session.

// Core types and error handling
mod error;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

// Demuxing core
pub mod demux;
pub mod probe;

// Stream-based session architecture
mod driver;
pub mod session;
pub mod stream;
pub mod transport;
pub mod transports;

// Core exports
pub use error::{MjpegError, Result};
pub use types::{EndReason, FrameEvent, StreamConfig};

// Session exports
pub use session::{CameraSession, SessionState};

// Transport exports
pub use transport::{Handshake, Transport};
pub use transports::{HttpTransport, ReplayTransport};

/// Unified entry point for camera stream sessions.
///
/// The factory constructs a transport, wraps it in a started
/// [`CameraSession`], and hands it back. For finer control (custom
/// transports, subscribing before any event can fire) construct
/// [`CameraSession`] directly.
///
/// Sessions spawn their driver task on the ambient Tokio runtime, so these
/// constructors must be called from within one.
///
/// # Examples
///
/// ## Live camera
/// ```rust,no_run
/// use camwire::Camwire;
///
/// # #[tokio::main]
/// # async fn main() -> camwire::Result<()> {
/// let session = Camwire::connect("http://camera.local/stream")?;
/// # Ok(())
/// # }
/// ```
///
/// ## Recorded stream
/// ```rust,no_run
/// use camwire::{Camwire, StreamConfig};
///
/// # #[tokio::main]
/// # async fn main() -> camwire::Result<()> {
/// let session = Camwire::replay("dump.mjpeg", "frame", StreamConfig::default())?;
/// # Ok(())
/// # }
/// ```
pub struct Camwire;

impl Camwire {
    /// Connect to a live MJPEG stream with the default configuration.
    pub fn connect(url: impl Into<String>) -> Result<CameraSession> {
        Self::connect_with(url, StreamConfig::default())
    }

    /// Connect to a live MJPEG stream with an explicit configuration.
    pub fn connect_with(url: impl Into<String>, config: StreamConfig) -> Result<CameraSession> {
        let transport = HttpTransport::new(url)?;
        let session = CameraSession::new(transport, config);
        session.start();
        Ok(session)
    }

    /// Replay a recorded multipart body from disk.
    ///
    /// `boundary_token` is the token the recording was made with.
    pub fn replay(
        path: impl AsRef<std::path::Path>,
        boundary_token: &str,
        config: StreamConfig,
    ) -> Result<CameraSession> {
        let transport = ReplayTransport::open(path, boundary_token)?;
        let session = CameraSession::new(transport, config);
        session.start();
        Ok(session)
    }
}
