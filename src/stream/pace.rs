//! Advisory frame pacing for event streams.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::time::{Interval, interval};

use crate::types::FrameEvent;

/// Extension trait adding frame pacing to event streams.
pub trait PaceExt: Stream<Item = FrameEvent> {
    /// Cap the frame rate seen by this subscriber.
    ///
    /// Frame events are conflated with latest-wins semantics: when frames
    /// arrive faster than the interval, intermediate ones are dropped and
    /// the newest is delivered on the next tick. Lifecycle events
    /// (started/resolution/error/ended) always pass through immediately; a
    /// conflated frame that precedes one is flushed ahead of it so event
    /// order is preserved.
    fn pace(self, interval: Duration) -> Pace<Self>
    where
        Self: Sized,
    {
        Pace::new(self, interval)
    }
}

impl<S: Stream<Item = FrameEvent>> PaceExt for S {}

pin_project! {
    /// Stream combinator limiting the delivered frame rate.
    pub struct Pace<S> {
        #[pin]
        stream: S,
        interval: Interval,
        pending_frame: Option<FrameEvent>,
        ready: VecDeque<FrameEvent>,
        source_done: bool,
    }
}

impl<S: Stream<Item = FrameEvent>> Pace<S> {
    /// Create a paced stream.
    pub fn new(stream: S, duration: Duration) -> Self {
        let mut interval = interval(duration);
        // Don't burst after a quiet stretch
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        Self { stream, interval, pending_frame: None, ready: VecDeque::new(), source_done: false }
    }
}

impl<S: Stream<Item = FrameEvent>> Stream for Pace<S> {
    type Item = FrameEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(event) = this.ready.pop_front() {
                return Poll::Ready(Some(event));
            }

            // Drain whatever the source has buffered: frames conflate,
            // lifecycle events flush the conflated frame ahead of themselves.
            while !*this.source_done {
                match this.stream.as_mut().poll_next(cx) {
                    Poll::Ready(Some(event)) if event.is_frame() => {
                        *this.pending_frame = Some(event);
                    }
                    Poll::Ready(Some(event)) => {
                        if let Some(frame) = this.pending_frame.take() {
                            this.ready.push_back(frame);
                        }
                        this.ready.push_back(event);
                    }
                    Poll::Ready(None) => {
                        *this.source_done = true;
                    }
                    Poll::Pending => break,
                }
            }

            if !this.ready.is_empty() {
                continue;
            }

            if this.pending_frame.is_some() {
                // A held frame leaves on the next tick, or immediately once
                // the source is finished
                if *this.source_done || this.interval.poll_tick(cx).is_ready() {
                    return Poll::Ready(this.pending_frame.take());
                }
                return Poll::Pending;
            }

            if *this.source_done {
                return Poll::Ready(None);
            }
            return Poll::Pending;
        }
    }
}
