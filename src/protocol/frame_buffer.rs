//! Frame buffer for reassembling fixed-size frames from a TCP byte stream.
//!
//! Uses `bytes::BytesMut` so that consumed frames and skipped garbage are
//! removed from the front of the buffer without copying the remainder.
//!
//! Each pass over the buffer does one of:
//! - head is not a sync marker: skip to the next sync marker, or drop
//!   everything if there is none
//! - head is a sync marker but the stop byte is wrong: drop exactly one byte
//! - head is a sync marker and the stop byte is valid: emit 33 bytes
//!
//! # Example
//!
//! ```
//! use sensorbridge::protocol::{FrameBuffer, FRAME_SIZE, SYNC_BYTE};
//! use sensorbridge::stats::BridgeStats;
//!
//! let stats = BridgeStats::new();
//! let mut buffer = FrameBuffer::new();
//!
//! let mut raw = vec![0u8; FRAME_SIZE];
//! raw[0] = SYNC_BYTE;
//! raw[FRAME_SIZE - 1] = 0xC0;
//!
//! let frames = buffer.ingest(&raw, &stats);
//! assert_eq!(frames.len(), 1);
//! ```

use bytes::{Buf, BytesMut};

use super::wire_format::{is_valid_stop_byte, FRAME_SIZE, STOP_BYTE_OFFSET, SYNC_BYTE};
use super::Frame;
use crate::stats::BridgeStats;

/// Outcome of a single reassembly step.
#[derive(Debug)]
enum Step {
    /// A valid frame was split off the head.
    Frame(Frame),
    /// Leading garbage was skipped.
    Skipped(usize),
    /// The head candidate had a bad stop byte; one byte was dropped.
    Rejected,
    /// Fewer than `FRAME_SIZE` bytes remain.
    NeedMore,
}

/// Receive buffer accumulating partial input from the TCP source.
///
/// After every [`ingest`](Self::ingest) the buffer holds either fewer than
/// 33 bytes, or starts with a sync marker and is waiting for more bytes.
pub struct FrameBuffer {
    buffer: BytesMut,
}

impl FrameBuffer {
    /// Create a new frame buffer with default capacity (4KB).
    pub fn new() -> Self {
        Self::with_capacity(4 * 1024)
    }

    /// Create a new frame buffer with a custom initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Append a chunk and extract every complete frame, in arrival order.
    ///
    /// Good/bad frame and skipped-byte counters are updated on `stats`.
    pub fn ingest(&mut self, chunk: &[u8], stats: &BridgeStats) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();

        loop {
            match self.step() {
                Step::Frame(frame) => {
                    stats.record_good_frame();
                    frames.push(frame);
                }
                Step::Skipped(n) => stats.add_skipped_bytes(n),
                Step::Rejected => stats.record_bad_frame(),
                Step::NeedMore => break,
            }
        }

        frames
    }

    fn step(&mut self) -> Step {
        if self.buffer.len() < FRAME_SIZE {
            return Step::NeedMore;
        }

        if self.buffer[0] != SYNC_BYTE {
            let skip = match self.buffer.iter().position(|&b| b == SYNC_BYTE) {
                Some(offset) => offset,
                // No sync marker anywhere: nothing here can start a frame.
                None => self.buffer.len(),
            };
            self.buffer.advance(skip);
            return Step::Skipped(skip);
        }

        if !is_valid_stop_byte(self.buffer[STOP_BYTE_OFFSET]) {
            self.buffer.advance(1);
            return Step::Rejected;
        }

        let bytes = self.buffer.split_to(FRAME_SIZE).freeze();
        Step::Frame(Frame::new_unchecked(bytes))
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop all buffered bytes (peer disconnected).
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
