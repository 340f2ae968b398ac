//! Incremental MJPEG multipart demuxer.
//!
//! [`BoundaryScanner`] turns an unbounded sequence of byte chunks from a
//! `multipart/x-mixed-replace` body into ordered [`FrameEvent`]s. Parsing is
//! chunk-boundary-agnostic: a part header, frame body, or even the boundary
//! marker itself may arrive split across any number of chunks, and the
//! scanner simply waits for more data. Incomplete input is never an error.
//!
//! The scanner is owned by exactly one session and observes bytes in strict
//! arrival order; all of its state (buffer, cursor, sequence counter) is
//! private to it.

use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::probe;
use crate::types::{EndReason, FrameEvent};
use crate::{MjpegError, Result};

const CRLF: &[u8] = b"\r\n";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Extract the boundary token from a `Content-Type` header value.
///
/// The content type must contain `multipart/x-mixed-replace` and a
/// `boundary` parameter. The parameter value may be quoted, may carry a
/// redundant leading `--`, and may be followed by further parameters:
///
/// ```rust
/// use camwire::demux::boundary_token;
///
/// let token = boundary_token(r#"multipart/x-mixed-replace; boundary="frame""#).unwrap();
/// assert_eq!(token, "frame");
/// ```
pub fn boundary_token(content_type: &str) -> Result<String> {
    let lower = content_type.to_ascii_lowercase();
    if !lower.contains("multipart/x-mixed-replace") {
        return Err(MjpegError::protocol(format!(
            "expected multipart/x-mixed-replace content type, got {content_type:?}"
        )));
    }

    let start = lower
        .find("boundary=")
        .ok_or_else(|| MjpegError::protocol("content type is missing the boundary parameter"))?
        + "boundary=".len();

    let value = content_type[start..].trim_start();
    let value = match value.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next().unwrap_or(""),
        None => value.split(';').next().unwrap_or(""),
    };
    let token = value.trim();
    let token = token.strip_prefix("--").unwrap_or(token).trim();

    if token.is_empty() {
        return Err(MjpegError::protocol("boundary parameter is empty"));
    }

    Ok(token.to_string())
}

/// Stateful incremental parser for a single multipart session.
///
/// Feed it chunks with [`push_chunk`](Self::push_chunk); it returns the
/// events each chunk completes. Multiple frames buffered in one chunk are
/// all extracted; a frame split across chunks is extracted once its closing
/// boundary arrives.
///
/// Known limitation: the boundary marker is located by plain byte search, so
/// a token that happens to occur inside JPEG entropy data is read as a
/// frame delimiter. Servers choose tokens that make this unlikely.
pub struct BoundaryScanner {
    /// `--token`, as it appears in the body.
    marker: Vec<u8>,

    /// Accumulation buffer; consumed prefix is discarded per extracted frame.
    buffer: Vec<u8>,

    /// Search cursor into `buffer`; already-examined bytes are not rescanned.
    cursor: usize,

    /// Sequence index of the next emitted frame.
    next_sequence: u64,

    /// Per-frame size ceiling.
    max_frame_bytes: usize,

    /// Set once the dimension probe has run (regardless of outcome).
    probed: bool,

    /// Set by the terminal boundary; all further input is ignored.
    finished: bool,
}

impl BoundaryScanner {
    /// Create a scanner for the given boundary token.
    pub fn new(token: &str, max_frame_bytes: usize) -> Self {
        let mut marker = Vec::with_capacity(token.len() + 2);
        marker.extend_from_slice(b"--");
        marker.extend_from_slice(token.as_bytes());

        Self {
            marker,
            buffer: Vec::new(),
            cursor: 0,
            next_sequence: 0,
            max_frame_bytes,
            probed: false,
            finished: false,
        }
    }

    /// Whether the terminal boundary has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Append a chunk and extract every event it completes.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<FrameEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(chunk);

        loop {
            let Some(marker_pos) =
                find(&self.buffer[self.cursor..], &self.marker).map(|rel| self.cursor + rel)
            else {
                // Keep a marker-length tail scannable so a split marker can
                // complete with the next chunk.
                self.cursor = self.buffer.len().saturating_sub(self.marker.len());
                break;
            };

            let mut part_start = marker_pos + self.marker.len();
            if self.buffer[part_start..].starts_with(CRLF) {
                part_start += 2;
            }

            if self.buffer[part_start..].starts_with(b"--") {
                debug!(frames = self.next_sequence, "Terminal boundary reached");
                self.finished = true;
                self.buffer = Vec::new();
                self.cursor = 0;
                events.push(FrameEvent::StreamEnded {
                    reason: EndReason::TerminalBoundary,
                    ts: SystemTime::now(),
                });
                break;
            }

            // Part headers must be fully buffered before the body is searched
            let Some(header_end) =
                find(&self.buffer[part_start..], HEADER_TERMINATOR).map(|rel| part_start + rel)
            else {
                self.cursor = marker_pos;
                break;
            };
            let content_start = header_end + HEADER_TERMINATOR.len();

            // The frame ends where the next boundary begins
            let Some(next_marker) =
                find(&self.buffer[content_start..], &self.marker).map(|rel| content_start + rel)
            else {
                self.cursor = marker_pos;
                break;
            };

            // The CRLF preceding the next marker is framing, not payload
            let frame_end = next_marker.saturating_sub(2).max(content_start);
            let frame = &self.buffer[content_start..frame_end];

            if frame.is_empty() {
                trace!("Skipping zero-length part");
            } else if frame.len() > self.max_frame_bytes {
                warn!(size = frame.len(), limit = self.max_frame_bytes, "Dropping oversized frame");
                events.push(FrameEvent::StreamError {
                    cause: Arc::new(MjpegError::frame_too_large(frame.len(), self.max_frame_bytes)),
                    ts: SystemTime::now(),
                });
            } else {
                let payload = Bytes::copy_from_slice(frame);
                let sequence = self.next_sequence;
                self.next_sequence += 1;
                trace!(sequence, size = payload.len(), "Extracted frame");
                events.push(FrameEvent::FrameBytes {
                    payload: payload.clone(),
                    sequence,
                    ts: SystemTime::now(),
                });

                if !self.probed {
                    self.probed = true;
                    match probe::jpeg_dimensions(&payload) {
                        Some((width, height)) => {
                            debug!(width, height, "Probed stream resolution from first frame");
                            events.push(FrameEvent::FrameResolution {
                                width,
                                height,
                                ts: SystemTime::now(),
                            });
                        }
                        None => debug!("First frame did not yield dimensions"),
                    }
                }
            }

            // Discard the consumed prefix; the next marker heads the new buffer
            self.buffer.drain(..next_marker);
            self.cursor = 0;
        }

        events
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TEST_BOUNDARY, fake_jpeg, multipart_stream, part};

    fn scanner() -> BoundaryScanner {
        BoundaryScanner::new(TEST_BOUNDARY, crate::types::DEFAULT_MAX_FRAME_BYTES)
    }

    fn frames_of(events: &[FrameEvent]) -> Vec<(u64, Vec<u8>)> {
        events
            .iter()
            .filter_map(|event| match event {
                FrameEvent::FrameBytes { payload, sequence, .. } => {
                    Some((*sequence, payload.to_vec()))
                }
                _ => None,
            })
            .collect()
    }

    mod boundary_extraction {
        use super::boundary_token;
        use crate::MjpegError;

        #[test]
        fn plain_token() {
            let token = boundary_token("multipart/x-mixed-replace; boundary=frame").unwrap();
            assert_eq!(token, "frame");
        }

        #[test]
        fn quoted_token() {
            let token = boundary_token(r#"multipart/x-mixed-replace; boundary="frame""#).unwrap();
            assert_eq!(token, "frame");
        }

        #[test]
        fn dashed_token_with_trailing_parameters() {
            let token =
                boundary_token("multipart/x-mixed-replace; boundary=--frame;charset=x").unwrap();
            assert_eq!(token, "frame");
        }

        #[test]
        fn parameter_name_is_case_insensitive() {
            let token = boundary_token("Multipart/X-Mixed-Replace; BOUNDARY=frame").unwrap();
            assert_eq!(token, "frame");
        }

        #[test]
        fn missing_boundary_is_a_protocol_error() {
            let err = boundary_token("multipart/x-mixed-replace").unwrap_err();
            assert!(matches!(err, MjpegError::Protocol { .. }));
        }

        #[test]
        fn empty_boundary_is_a_protocol_error() {
            let err = boundary_token("multipart/x-mixed-replace; boundary=").unwrap_err();
            assert!(matches!(err, MjpegError::Protocol { .. }));
        }

        #[test]
        fn wrong_content_type_is_a_protocol_error() {
            let err = boundary_token("text/html; boundary=frame").unwrap_err();
            assert!(matches!(err, MjpegError::Protocol { .. }));
        }
    }

    #[test]
    fn single_frame_with_resolution() {
        let jpeg = fake_jpeg(640, 480);
        let stream = multipart_stream(TEST_BOUNDARY, &[&jpeg], true);

        let mut scanner = scanner();
        let events = scanner.push_chunk(&stream);

        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            FrameEvent::FrameBytes { payload, sequence: 0, .. } if payload[..] == jpeg[..]
        ));
        assert!(matches!(events[1], FrameEvent::FrameResolution { width: 640, height: 480, .. }));
        assert!(matches!(
            events[2],
            FrameEvent::StreamEnded { reason: EndReason::TerminalBoundary, .. }
        ));
        assert!(scanner.is_finished());
    }

    #[test]
    fn resolution_is_probed_only_once() {
        let stream =
            multipart_stream(TEST_BOUNDARY, &[&fake_jpeg(64, 48), &fake_jpeg(640, 480)], true);

        let events = scanner().push_chunk(&stream);
        let resolutions: Vec<_> = events
            .iter()
            .filter(|event| matches!(event, FrameEvent::FrameResolution { .. }))
            .collect();

        assert_eq!(resolutions.len(), 1);
        assert!(matches!(resolutions[0], FrameEvent::FrameResolution { width: 64, height: 48, .. }));
    }

    #[test]
    fn non_jpeg_payload_yields_no_resolution() {
        let stream = multipart_stream(TEST_BOUNDARY, &[b"not jpeg data"], true);

        let events = scanner().push_chunk(&stream);
        assert!(!events.iter().any(|event| matches!(event, FrameEvent::FrameResolution { .. })));
        assert_eq!(frames_of(&events).len(), 1);
    }

    #[test]
    fn multiple_frames_from_one_chunk() {
        let payloads: Vec<Vec<u8>> = (0u8..5).map(|i| vec![i; 100 + i as usize]).collect();
        let refs: Vec<&[u8]> = payloads.iter().map(Vec::as_slice).collect();
        let stream = multipart_stream(TEST_BOUNDARY, &refs, true);

        let events = scanner().push_chunk(&stream);
        let frames = frames_of(&events);

        assert_eq!(frames.len(), 5);
        for (i, (sequence, payload)) in frames.iter().enumerate() {
            assert_eq!(*sequence, i as u64);
            assert_eq!(payload, &payloads[i]);
        }
    }

    #[test]
    fn one_byte_chunks_yield_identical_frames() {
        let payloads: Vec<Vec<u8>> = vec![fake_jpeg(32, 24), vec![0xAB; 211], vec![7; 1]];
        let refs: Vec<&[u8]> = payloads.iter().map(Vec::as_slice).collect();
        let stream = multipart_stream(TEST_BOUNDARY, &refs, true);

        let mut whole = scanner();
        let expected = frames_of(&whole.push_chunk(&stream));

        let mut trickled = scanner();
        let mut got = Vec::new();
        for byte in &stream {
            got.extend(frames_of(&trickled.push_chunk(std::slice::from_ref(byte))));
        }

        assert_eq!(expected.len(), 3);
        assert_eq!(got, expected);
        assert!(trickled.is_finished());
    }

    #[test]
    fn oversized_frame_is_dropped_without_consuming_a_sequence_index() {
        let small = vec![1u8; 100];
        let huge = vec![2u8; 2_000_001];
        let tail = vec![3u8; 50];
        let stream = multipart_stream(TEST_BOUNDARY, &[&small, &huge, &tail], true);

        let mut scanner = BoundaryScanner::new(TEST_BOUNDARY, 2_000_000);
        let events = scanner.push_chunk(&stream);

        let kinds: Vec<&'static str> = events
            .iter()
            .map(|event| match event {
                FrameEvent::FrameBytes { .. } => "frame",
                FrameEvent::StreamError { .. } => "error",
                FrameEvent::StreamEnded { .. } => "ended",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, ["frame", "error", "frame", "ended"]);

        let frames = frames_of(&events);
        assert_eq!(frames[0], (0, small));
        assert_eq!(frames[1], (1, tail));

        assert!(events.iter().any(|event| matches!(
            event,
            FrameEvent::StreamError { cause, .. }
                if matches!(**cause, MjpegError::FrameTooLarge { size: 2_000_001, limit: 2_000_000 })
        )));
    }

    #[test]
    fn terminal_boundary_stops_parsing_permanently() {
        let mut stream = multipart_stream(TEST_BOUNDARY, &[b"frame one"], true);
        // Anything after the terminal boundary must be ignored
        stream.extend_from_slice(&part(TEST_BOUNDARY, b"late frame"));

        let mut scanner = scanner();
        let events = scanner.push_chunk(&stream);
        assert!(matches!(
            events.last(),
            Some(FrameEvent::StreamEnded { reason: EndReason::TerminalBoundary, .. })
        ));

        assert!(scanner.is_finished());
        assert!(scanner.push_chunk(&part(TEST_BOUNDARY, b"more")).is_empty());
    }

    #[test]
    fn partial_headers_wait_for_more_data() {
        let jpeg = fake_jpeg(16, 16);
        let stream = multipart_stream(TEST_BOUNDARY, &[&jpeg], true);
        let split = stream.len() / 3;

        let mut scanner = scanner();
        assert!(scanner.push_chunk(&stream[..split]).is_empty());
        let events = scanner.push_chunk(&stream[split..]);
        assert_eq!(frames_of(&events), vec![(0, jpeg)]);
    }

    #[test]
    fn zero_length_part_is_skipped_silently() {
        let mut stream = Vec::new();
        stream.extend_from_slice(format!("--{TEST_BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n\r\n").as_bytes());
        stream.extend_from_slice(&part(TEST_BOUNDARY, b"real frame"));
        stream.extend_from_slice(format!("--{TEST_BOUNDARY}--\r\n").as_bytes());

        let events = scanner().push_chunk(&stream);
        let frames = frames_of(&events);

        // The empty part produced no event and no sequence index
        assert_eq!(frames, vec![(0, b"real frame".to_vec())]);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn header_text_is_not_part_of_the_payload() {
        let stream = multipart_stream(TEST_BOUNDARY, &[b"payload"], true);
        let events = scanner().push_chunk(&stream);
        let frames = frames_of(&events);
        assert_eq!(frames[0].1, b"payload".to_vec());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// Splitting a well-formed stream at arbitrary points yields the
            /// same ordered frame payloads as a single unchunked read.
            #[test]
            fn chunking_invariance(
                // 0x2D is '-'; excluding it keeps payloads free of accidental
                // boundary matches, which are a documented limitation
                payloads in prop::collection::vec(
                    prop::collection::vec((0u8..=0xFF).prop_filter("no dash", |b| *b != 0x2D), 0..300),
                    1..6,
                ),
                cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..12),
            ) {
                let refs: Vec<&[u8]> = payloads.iter().map(Vec::as_slice).collect();
                let stream = multipart_stream(TEST_BOUNDARY, &refs, true);

                let mut whole = scanner();
                let expected = frames_of(&whole.push_chunk(&stream));

                let mut offsets: Vec<usize> = cuts.iter().map(|cut| cut.index(stream.len() + 1)).collect();
                offsets.push(0);
                offsets.push(stream.len());
                offsets.sort_unstable();

                let mut chunked = scanner();
                let mut got = Vec::new();
                for pair in offsets.windows(2) {
                    got.extend(frames_of(&chunked.push_chunk(&stream[pair[0]..pair[1]])));
                }

                prop_assert_eq!(got, expected);
                prop_assert!(chunked.is_finished());
            }

            /// Emitted sequence indices start at 0 and increase by exactly 1.
            #[test]
            fn monotonic_sequencing(
                payloads in prop::collection::vec(
                    prop::collection::vec((0u8..=0xFF).prop_filter("no dash", |b| *b != 0x2D), 1..200),
                    1..8,
                ),
            ) {
                let refs: Vec<&[u8]> = payloads.iter().map(Vec::as_slice).collect();
                let stream = multipart_stream(TEST_BOUNDARY, &refs, true);

                let events = scanner().push_chunk(&stream);
                let frames = frames_of(&events);

                prop_assert_eq!(frames.len(), payloads.len());
                for (i, (sequence, _)) in frames.iter().enumerate() {
                    prop_assert_eq!(*sequence, i as u64);
                }
            }
        }
    }
}
