//! Error types for sensorbridge.

use thiserror::Error;

/// Main error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// I/O error during socket or file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// HTTP transport failure talking to the remote control endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The frame listener could not bind its address.
    #[error("Failed to bind frame listener on {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying socket error.
        source: std::io::Error,
    },

    /// The remote endpoint answered with a non-success status.
    #[error("Remote call {call} failed with status {status}: {body}")]
    Remote {
        /// Name of the remote call.
        call: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An internal channel was closed unexpectedly.
    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
