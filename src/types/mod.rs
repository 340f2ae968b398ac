//! Core types for MJPEG stream sessions.
//!
//! - [`FrameEvent`] is the unit that flows from the demuxer to subscribers
//! - [`EndReason`] explains the terminal `StreamEnded` event
//! - [`StreamConfig`] carries the session timeouts and limits

mod config;
mod event;

pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_FIRST_FRAME_TIMEOUT, DEFAULT_MAX_FRAME_BYTES,
    DEFAULT_STALL_TIMEOUT, StreamConfig,
};
pub use event::{EndReason, FrameEvent};
