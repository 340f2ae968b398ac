//! Streaming session: lifecycle, timeouts, and event fan-out.

mod state;

pub use state::SessionState;

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::driver::Driver;
use crate::stream::PaceExt;
use crate::transport::Transport;
use crate::types::{EndReason, FrameEvent, StreamConfig};

/// Event fan-out capacity; lagging subscribers skip events, they never
/// block the driver.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A single streaming session over one transport.
///
/// The session owns its transport and parser state exclusively; one driver
/// task reads chunks in arrival order and publishes [`FrameEvent`]s to a
/// broadcast channel. Subscribers that attach after an event was emitted do
/// not receive it — there is no replay.
///
/// A session instance streams at most once: after it reaches
/// [`SessionState::Stopped`] or [`SessionState::Error`] it stays there, and
/// reconnecting means constructing a new session. Retry and backoff policy
/// belongs to the caller.
///
/// ```rust,no_run
/// use camwire::{CameraSession, HttpTransport, StreamConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> camwire::Result<()> {
/// let transport = HttpTransport::new("http://camera.local/stream")?;
/// let session = CameraSession::new(transport, StreamConfig::default());
///
/// let mut events = Box::pin(session.subscribe());
/// session.start();
///
/// while let Some(event) = events.next().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct CameraSession {
    /// Taken by the first `start()`; empty means started (or stopped early).
    transport: Mutex<Option<Box<dyn Transport>>>,

    config: StreamConfig,

    events: broadcast::Sender<FrameEvent>,

    state: Arc<watch::Sender<SessionState>>,

    cancel: CancellationToken,
}

impl CameraSession {
    /// Create a session in the `Idle` state.
    pub fn new(transport: impl Transport, config: StreamConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state, _) = watch::channel(SessionState::Idle);

        Self {
            transport: Mutex::new(Some(Box::new(transport))),
            config,
            events,
            state: Arc::new(state),
            cancel: CancellationToken::new(),
        }
    }

    /// Start streaming.
    ///
    /// Spawns the driver task (on the ambient Tokio runtime) that connects,
    /// parses, and publishes events. Idempotent: calling it again, or after
    /// the session ended, is a no-op.
    pub fn start(&self) {
        let taken = self.transport.lock().ok().and_then(|mut slot| slot.take());
        let Some(transport) = taken else {
            debug!("start() ignored: session already started or ended");
            return;
        };

        Driver::spawn(
            transport,
            self.config.clone(),
            self.events.clone(),
            Arc::clone(&self.state),
            self.cancel.clone(),
        );
    }

    /// Stop the session.
    ///
    /// Safe to call from any task, any number of times, in any state. The
    /// transport is aborted and exactly one terminal `StreamEnded` is
    /// emitted per session; after it, no frame or error events follow.
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        debug!("Stopping session");
        self.cancel.cancel();

        // A session stopped before start() has no driver to emit the
        // terminal event, so emit it here. The transport slot makes this
        // single-shot even against a concurrent start().
        let unstarted = self.transport.lock().ok().and_then(|mut slot| slot.take());
        if unstarted.is_some() {
            let _ = self.state.send(SessionState::Stopped);
            let _ = self.events.send(FrameEvent::StreamEnded {
                reason: EndReason::Stopped,
                ts: SystemTime::now(),
            });
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.subscribe().borrow()
    }

    /// Stream of state changes, starting with the current state.
    pub fn state_changes(&self) -> impl Stream<Item = SessionState> + 'static {
        WatchStream::new(self.state.subscribe())
    }

    /// Raw event stream.
    ///
    /// No replay: events emitted before subscribing are missed, and a
    /// subscriber that falls more than the channel capacity behind skips
    /// ahead to the oldest retained event.
    pub fn events(&self) -> impl Stream<Item = FrameEvent> + 'static {
        BroadcastStream::new(self.events.subscribe())
            .filter_map(|result| async move { result.ok() })
    }

    /// Event stream with the advisory `target_fps` pacing applied.
    ///
    /// With no `target_fps` configured this is the raw stream. Pacing only
    /// conflates `FrameBytes`; lifecycle events always come through.
    pub fn subscribe(&self) -> impl Stream<Item = FrameEvent> + 'static {
        match self.config.pace_interval() {
            Some(interval) => self.events().pace(interval).boxed(),
            None => self.events().boxed(),
        }
    }

    /// The configuration this session runs with.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        debug!("Dropping camera session");
        // Cancel the driver on drop for clean shutdown
        self.cancel.cancel();
    }
}
