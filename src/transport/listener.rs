//! TCP listener for the sensor frame stream.
//!
//! The listener is bound lazily, the first time a start sequence runs.
//! Accepted streams are handed to the frame pump over a channel; the pump
//! keeps only the most recent one.
//!
//! # Example
//!
//! ```ignore
//! use sensorbridge::transport::FrameListener;
//!
//! let (conn_tx, conn_rx) = tokio::sync::mpsc::unbounded_channel();
//! let (fatal_tx, fatal_rx) = tokio::sync::mpsc::unbounded_channel();
//! let listener = FrameListener::new("0.0.0.0", 3000, conn_tx, fatal_tx);
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};

use crate::control::{BoxFuture, ListenerControl};
use crate::error::{BridgeError, Result};

/// Delay after the first failed accept.
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(50);

/// Upper bound on the delay between failed accepts.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before retrying after `failures` consecutive accept errors.
///
/// Doubles per failure from [`ACCEPT_BACKOFF_MIN`], capped at
/// [`ACCEPT_BACKOFF_MAX`].
fn accept_backoff(failures: u32) -> Duration {
    let shift = failures.saturating_sub(1).min(16);
    ACCEPT_BACKOFF_MIN
        .saturating_mul(1 << shift)
        .min(ACCEPT_BACKOFF_MAX)
}

/// Lazily bound listener for the binary frame protocol.
pub struct FrameListener {
    host: String,
    port: u16,
    /// `Some(addr)` once bound; guards against double binds.
    bound: Mutex<Option<SocketAddr>>,
    conn_tx: mpsc::UnboundedSender<TcpStream>,
    fatal_tx: mpsc::UnboundedSender<BridgeError>,
}

impl FrameListener {
    /// Create an unbound listener.
    ///
    /// # Arguments
    /// * `host` - Local bind address (e.g., "0.0.0.0")
    /// * `port` - Local port; 0 picks an ephemeral port
    /// * `conn_tx` - Receives every accepted stream
    /// * `fatal_tx` - Receives the bind error if binding fails
    pub fn new(
        host: impl Into<String>,
        port: u16,
        conn_tx: mpsc::UnboundedSender<TcpStream>,
        fatal_tx: mpsc::UnboundedSender<BridgeError>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            bound: Mutex::new(None),
            conn_tx,
            fatal_tx,
        }
    }

    /// The bound address, if the listener is active.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock().await
    }

    /// Bind and start accepting, unless already active.
    ///
    /// Returns `Ok(true)` on the call that actually bound the socket.
    pub async fn activate(&self) -> Result<bool> {
        let mut bound = self.bound.lock().await;
        if bound.is_some() {
            return Ok(false);
        }

        let addr = format!("{}:{}", self.host, self.port);
        let listener = match TcpListener::bind((self.host.as_str(), self.port)).await {
            Ok(l) => l,
            Err(e) => {
                let _ = self.fatal_tx.send(BridgeError::Bind {
                    addr: addr.clone(),
                    source: std::io::Error::new(e.kind(), e.to_string()),
                });
                return Err(BridgeError::Bind { addr, source: e });
            }
        };

        let local = listener.local_addr()?;
        tracing::info!("Frame listener on {}", local);
        *bound = Some(local);

        tokio::spawn(accept_loop(listener, self.conn_tx.clone()));
        Ok(true)
    }
}

impl ListenerControl for FrameListener {
    fn ensure_active(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(self.activate())
    }
}

/// Accept connections until the frame pump goes away.
///
/// Accept errors such as fd exhaustion tend to repeat, so each one is
/// followed by a growing delay instead of an immediate retry.
async fn accept_loop(listener: TcpListener, conn_tx: mpsc::UnboundedSender<TcpStream>) {
    let mut failures = 0u32;

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                failures = 0;
                tracing::info!("Sensor connected from {}", peer);
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::warn!("Failed to set TCP_NODELAY: {}", e);
                }
                if conn_tx.send(stream).is_err() {
                    return;
                }
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                let delay = accept_backoff(failures);
                tracing::warn!("Accept error, retrying in {:?}: {}", delay, e);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
