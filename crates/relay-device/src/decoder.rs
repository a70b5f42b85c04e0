//! Line framing.
//!
//! The device emits one reading per `\n`-terminated line. A serial read can
//! return any slice of that stream, so the decoder keeps the partial line
//! between chunks and only hands out complete frames.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_core::{RawChunk, Reading};

use crate::errors::DecodeError;

/// Default maximum frame length in bytes.
pub const DEFAULT_MAX_FRAME_LEN: usize = 4096;

/// Incremental line decoder.
///
/// Sequence numbers start at 1 and increase by one for every emitted
/// reading. Frames that fail to decode do not consume a number.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    next_seq: u64,
    max_frame_len: usize,
    /// Dropping bytes until the next newline after an overlong frame.
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameDecoder {
    /// Create a decoder that rejects frames longer than `max_frame_len` bytes.
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            next_seq: 1,
            max_frame_len: max_frame_len.max(1),
            discarding: false,
        }
    }

    /// Feed one chunk; returns the frames it completed, in order.
    pub fn decode(&mut self, chunk: &RawChunk) -> Vec<Result<Reading, DecodeError>> {
        let mut out = Vec::new();
        let mut rest = chunk.bytes.as_slice();

        while !rest.is_empty() {
            let newline = rest.iter().position(|&b| b == b'\n');
            let (segment, terminated) = match newline {
                Some(i) => (&rest[..i], true),
                None => (rest, false),
            };
            rest = match newline {
                Some(i) => &rest[i + 1..],
                None => &[],
            };

            if self.discarding {
                if terminated {
                    self.discarding = false;
                }
                continue;
            }

            // A single trailing `\r` (CRLF devices) does not count toward the limit.
            let total = self.buf.len() + segment.len();
            let content_len = match segment.last().or(self.buf.last()) {
                Some(&b'\r') => total - 1,
                _ => total,
            };
            if content_len > self.max_frame_len {
                self.buf.clear();
                self.discarding = !terminated;
                out.push(Err(DecodeError::FrameTooLong {
                    limit: self.max_frame_len,
                }));
                continue;
            }

            self.buf.extend_from_slice(segment);
            if terminated {
                let frame = std::mem::take(&mut self.buf);
                if let Some(result) = self.finish_frame(&frame, chunk.arrived_at) {
                    out.push(result);
                }
            }
        }

        out
    }

    fn finish_frame(
        &mut self,
        frame: &[u8],
        arrived_at: DateTime<Utc>,
    ) -> Option<Result<Reading, DecodeError>> {
        let text = match std::str::from_utf8(frame) {
            Ok(text) => text,
            Err(source) => {
                return Some(Err(DecodeError::InvalidUtf8 {
                    len: frame.len(),
                    source,
                }));
            }
        };

        let payload = text.trim();
        if payload.is_empty() {
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        Some(Ok(Reading::new(seq, Arc::<str>::from(payload), arrived_at)))
    }

    /// Drop any partial frame and restart numbering at 1.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
        self.next_seq = 1;
    }

    /// Bytes of the current unterminated frame.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Sequence number the next reading will get.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Configured frame limit.
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}
