//! # sensorbridge
//!
//! Bridges a network sensor to a serial-attached host.
//!
//! ## Architecture
//!
//! - **Frame path** (TCP ─► serial): the sensor streams fixed 33-byte
//!   frames to a local listener; valid frames are forwarded verbatim to the
//!   serial port, with backpressure from the serial writer pausing the
//!   socket reads.
//! - **Command path** (serial ─► HTTP): bytes from the serial host are
//!   split into command tokens and sent, one at a time, to the sensor's
//!   HTTP control endpoint.
//! - **Lifecycle**: `b` and `s` bytes on the serial line start and stop the
//!   sensor's stream.
//!
//! ## Example
//!
//! ```ignore
//! use clap::Parser;
//! use sensorbridge::{bridge, Config};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> sensorbridge::Result<()> {
//!     let config = Config::parse();
//!     sensorbridge::logging::init(config.verbose);
//!     bridge::run(config).await
//! }
//! ```

pub mod backpressure;
pub mod bridge;
pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod stats;
pub mod transport;

pub use config::Config;
pub use error::{BridgeError, Result};
