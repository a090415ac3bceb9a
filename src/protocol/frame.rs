//! Frame struct with typed accessors.
//!
//! A frame is an opaque 33-byte unit; the bridge never interprets the payload.
//! Uses `bytes::Bytes` so frames can be handed to the serial writer without copying.
//!
//! # Example
//!
//! ```
//! use sensorbridge::protocol::{Frame, FRAME_SIZE, SYNC_BYTE};
//!
//! let mut raw = [0u8; FRAME_SIZE];
//! raw[0] = SYNC_BYTE;
//! raw[FRAME_SIZE - 1] = 0xC0;
//!
//! let frame = Frame::from_slice(&raw).unwrap();
//! assert_eq!(frame.stop_byte(), 0xC0);
//! ```

use bytes::Bytes;

use super::wire_format::{validate_frame, FRAME_SIZE, STOP_BYTE_OFFSET};

/// A complete, validated sensor frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Wrap bytes that the reassembler already validated.
    pub(crate) fn new_unchecked(bytes: Bytes) -> Self {
        debug_assert_eq!(bytes.len(), FRAME_SIZE);
        Self { bytes }
    }

    /// Build a frame from a raw slice, validating sync and stop bytes.
    pub fn from_slice(raw: &[u8]) -> Option<Self> {
        validate_frame(raw).then(|| Self {
            bytes: Bytes::copy_from_slice(raw),
        })
    }

    /// The full 33 frame bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap clone of the underlying buffer.
    #[inline]
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    /// The 31 opaque payload bytes between sync and stop byte.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[1..STOP_BYTE_OFFSET]
    }

    /// The trailing stop byte.
    #[inline]
    pub fn stop_byte(&self) -> u8 {
        self.bytes[STOP_BYTE_OFFSET]
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SYNC_BYTE;

    fn raw_frame(fill: u8, stop: u8) -> [u8; FRAME_SIZE] {
        let mut raw = [fill; FRAME_SIZE];
        raw[0] = SYNC_BYTE;
        raw[STOP_BYTE_OFFSET] = stop;
        raw
    }

    #[test]
    fn test_from_slice_valid() {
        let raw = raw_frame(0x11, 0xC5);
        let frame = Frame::from_slice(&raw).unwrap();

        assert_eq!(frame.as_bytes(), &raw[..]);
        assert_eq!(frame.payload().len(), 31);
        assert!(frame.payload().iter().all(|&b| b == 0x11));
        assert_eq!(frame.stop_byte(), 0xC5);
    }

    #[test]
    fn test_from_slice_rejects_bad_stop() {
        assert!(Frame::from_slice(&raw_frame(0, 0xB0)).is_none());
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        let raw = raw_frame(0, 0xC0);
        assert!(Frame::from_slice(&raw[..32]).is_none());
    }
}
