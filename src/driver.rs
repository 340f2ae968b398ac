//! Driver task: owns the transport and scanner for one session.

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::MjpegError;
use crate::demux::{self, BoundaryScanner};
use crate::session::SessionState;
use crate::transport::Transport;
use crate::types::{EndReason, FrameEvent, StreamConfig};

/// Driver runs the per-session read loop.
///
/// One task owns the transport and the scanner, so bytes are observed in
/// strict arrival order and every timer-versus-data race resolves in a
/// single place. The task emits exactly one terminal `StreamEnded` per
/// session, on whichever path ends it first.
pub(crate) struct Driver;

impl Driver {
    /// Spawn the driver task for a session.
    pub(crate) fn spawn(
        transport: Box<dyn Transport>,
        config: StreamConfig,
        events: broadcast::Sender<FrameEvent>,
        state: Arc<watch::Sender<SessionState>>,
        cancel: CancellationToken,
    ) {
        tokio::spawn(async move {
            Self::run(transport, config, events, state, cancel).await;
        });
    }

    async fn run(
        mut transport: Box<dyn Transport>,
        config: StreamConfig,
        events: broadcast::Sender<FrameEvent>,
        state: Arc<watch::Sender<SessionState>>,
        cancel: CancellationToken,
    ) {
        debug!("Session driver started");
        let _ = state.send(SessionState::Connecting);

        let handshake = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Stopped while connecting");
                return Self::finish(&events, &state, SessionState::Stopped, EndReason::Stopped);
            }
            result = tokio::time::timeout(config.connect_timeout, transport.open()) => {
                match result {
                    Ok(Ok(handshake)) => handshake,
                    Ok(Err(e)) => return Self::fault(&events, &state, e),
                    Err(_) => {
                        return Self::fault(
                            &events,
                            &state,
                            MjpegError::connection_failed(format!(
                                "no response within {:?}",
                                config.connect_timeout
                            )),
                        );
                    }
                }
            }
        };

        let token = match demux::boundary_token(&handshake.content_type) {
            Ok(token) => token,
            Err(e) => return Self::fault(&events, &state, e),
        };

        info!(boundary = %token, "Stream started");
        let mut scanner = BoundaryScanner::new(&token, config.max_frame_bytes);
        Self::send(&events, FrameEvent::StreamStarted {
            boundary_token: token,
            ts: SystemTime::now(),
        });
        let _ = state.send(SessionState::WaitingFirstFrame);

        // The first-frame timer runs from headers until the first frame and
        // is not reset by chunk arrival; the stall timer is per chunk wait.
        let first_frame_deadline = Instant::now() + config.first_frame_timeout;
        let mut playing = false;
        let mut frame_count = 0u64;

        loop {
            let wait = if playing {
                config.stall_timeout
            } else {
                first_frame_deadline.saturating_duration_since(Instant::now())
            };

            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(frames = frame_count, "Stopped during streaming");
                    return Self::finish(&events, &state, SessionState::Stopped, EndReason::Stopped);
                }
                result = tokio::time::timeout(wait, transport.next_chunk()) => result,
            };

            match read {
                Err(_elapsed) => {
                    let timeout =
                        if playing { config.stall_timeout } else { config.first_frame_timeout };
                    warn!(?timeout, playing, "Stream stalled");
                    return Self::fault(&events, &state, MjpegError::stall(timeout));
                }
                Ok(Ok(Some(chunk))) => {
                    trace!(len = chunk.len(), "Chunk received");
                    for event in scanner.push_chunk(&chunk) {
                        if cancel.is_cancelled() {
                            // Stop wins a race against freshly parsed data
                            debug!("Stopped while flushing parsed events");
                            return Self::finish(
                                &events,
                                &state,
                                SessionState::Stopped,
                                EndReason::Stopped,
                            );
                        }

                        match &event {
                            FrameEvent::FrameBytes { sequence, .. } => {
                                frame_count += 1;
                                if !playing {
                                    debug!(sequence, "First frame extracted");
                                    playing = true;
                                    let _ = state.send(SessionState::Playing);
                                }
                            }
                            FrameEvent::StreamEnded { .. } => {
                                // Terminal boundary from the demuxer
                                info!(frames = frame_count, "Server terminated the stream");
                                let _ = state.send(SessionState::Stopped);
                            }
                            _ => {}
                        }

                        let terminal = event.is_terminal();
                        Self::send(&events, event);
                        if terminal {
                            return;
                        }
                    }
                }
                Ok(Ok(None)) => {
                    info!(frames = frame_count, "Transport closed");
                    return Self::finish(
                        &events,
                        &state,
                        SessionState::Stopped,
                        EndReason::TransportClosed,
                    );
                }
                Ok(Err(MjpegError::Aborted)) => {
                    debug!("Transport reported abort");
                    return Self::finish(&events, &state, SessionState::Stopped, EndReason::Stopped);
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Transport failed");
                    return Self::fault(&events, &state, e);
                }
            }
        }
    }

    /// End the session cleanly with its single terminal event.
    fn finish(
        events: &broadcast::Sender<FrameEvent>,
        state: &watch::Sender<SessionState>,
        final_state: SessionState,
        reason: EndReason,
    ) {
        let _ = state.send(final_state);
        Self::send(events, FrameEvent::StreamEnded { reason, ts: SystemTime::now() });
    }

    /// End the session on a fatal error: `StreamError`, then the terminal event.
    fn fault(
        events: &broadcast::Sender<FrameEvent>,
        state: &watch::Sender<SessionState>,
        error: MjpegError,
    ) {
        error!(error = %error, "Session faulted");
        let _ = state.send(SessionState::Error);
        Self::send(events, FrameEvent::StreamError {
            cause: Arc::new(error),
            ts: SystemTime::now(),
        });
        Self::send(events, FrameEvent::StreamEnded {
            reason: EndReason::Faulted,
            ts: SystemTime::now(),
        });
    }

    fn send(events: &broadcast::Sender<FrameEvent>, event: FrameEvent) {
        // Err only means nobody is subscribed right now; there is no replay
        let _ = events.send(event);
    }
}
