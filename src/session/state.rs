//! Session lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a streaming session.
///
/// `Idle → Connecting → WaitingFirstFrame → Playing → {Stopped | Error}`,
/// with `Stopped` reachable from every state via `stop()` or transport end.
/// A session instance never leaves a terminal state; a fresh `start()`
/// means a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Created but not started.
    Idle,

    /// Transport is connecting, bounded by the connect timeout.
    Connecting,

    /// Headers accepted and boundary extracted; waiting for the first
    /// complete frame, bounded by the first-frame timeout.
    WaitingFirstFrame,

    /// Frames are flowing; silence is bounded by the stall timeout.
    Playing,

    /// Ended cleanly: caller stop, transport close, or terminal boundary.
    Stopped,

    /// Ended by a fatal error.
    Error,
}

impl SessionState {
    /// Whether this state is terminal for the session instance.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Error)
    }
}
