//! Protocol module - sensor frame format and stream reassembly.
//!
//! This module implements the binary side of the bridge:
//! - 33-byte frame layout and stop-byte validation
//! - Frame buffer that resynchronizes on the sync marker
//! - Frame struct with typed accessors

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::Frame;
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    is_valid_stop_byte, validate_frame, FRAME_SIZE, STOP_BYTE_OFFSET, STOP_NIBBLE,
    STOP_NIBBLE_MASK, SYNC_BYTE,
};
