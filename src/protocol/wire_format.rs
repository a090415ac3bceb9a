//! Wire format of the sensor frame stream.
//!
//! Every frame is exactly 33 bytes:
//! ```text
//! ┌──────┬───────────────────────────────┬───────────┐
//! │ Sync │ Payload (opaque)              │ Stop byte │
//! │ 0xA0 │ 31 bytes                      │ 0xCn      │
//! └──────┴───────────────────────────────┴───────────┘
//! ```
//!
//! Only the sync byte and the high nibble of the stop byte are validated.
//! The payload and the low nibble of the stop byte are passed through untouched.

/// Frame size in bytes (fixed, exactly 33).
pub const FRAME_SIZE: usize = 33;

/// Sync marker that starts every frame.
pub const SYNC_BYTE: u8 = 0xA0;

/// Offset of the stop byte inside a frame.
pub const STOP_BYTE_OFFSET: usize = FRAME_SIZE - 1;

/// Required high nibble of the stop byte.
pub const STOP_NIBBLE: u8 = 0xC0;

/// Mask selecting the high nibble of the stop byte.
pub const STOP_NIBBLE_MASK: u8 = 0xF0;

/// Check whether a byte is an acceptable stop byte.
#[inline]
pub fn is_valid_stop_byte(byte: u8) -> bool {
    byte & STOP_NIBBLE_MASK == STOP_NIBBLE
}

/// Check whether a 33-byte candidate has a sync marker and a valid stop byte.
///
/// Returns `false` for slices that are not exactly `FRAME_SIZE` long.
pub fn validate_frame(candidate: &[u8]) -> bool {
    candidate.len() == FRAME_SIZE
        && candidate[0] == SYNC_BYTE
        && is_valid_stop_byte(candidate[STOP_BYTE_OFFSET])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_byte_nibble() {
        for low in 0..=0x0F {
            assert!(is_valid_stop_byte(0xC0 | low));
        }
        assert!(!is_valid_stop_byte(0xB0));
        assert!(!is_valid_stop_byte(0xD0));
        assert!(!is_valid_stop_byte(0x0C));
    }

    #[test]
    fn test_validate_frame() {
        let mut frame = [0u8; FRAME_SIZE];
        frame[0] = SYNC_BYTE;
        frame[STOP_BYTE_OFFSET] = 0xC3;
        assert!(validate_frame(&frame));

        frame[0] = 0xA1;
        assert!(!validate_frame(&frame));

        frame[0] = SYNC_BYTE;
        frame[STOP_BYTE_OFFSET] = 0x00;
        assert!(!validate_frame(&frame));

        assert!(!validate_frame(&frame[..FRAME_SIZE - 1]));
    }
}
