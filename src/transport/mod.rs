//! Transport module - serial port and TCP frame listener.
//!
//! Provides:
//! - [`SerialSink`] - flow-controlled byte sink the frame path writes into
//! - [`SerialLink`] - a real serial port serviced by reader/writer threads
//! - [`FrameListener`] - lazily bound TCP listener feeding the frame pump

mod listener;
mod serial;

pub use listener::FrameListener;
pub use serial::{SerialLink, SerialPortSink, SerialSink, BAUD_RATE, HIGH_WATER_MARK};
