//! The running bridge: frame path, command path and process wiring.
//!
//! ```text
//! TCP peer ─► FramePump (FrameBuffer ─► FlowCoordinator) ─► serial writer thread
//! serial reader thread ─► CommandPump ─┬─► dispatch task ─► HTTP endpoint
//!                                      └─► LifecycleController
//! ```
//!
//! The frame pump is the only task that touches the receive buffer, the
//! flow control flag and the current peer. Both pumps run on the same
//! runtime; the serial port itself is serviced by its own threads.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};

use crate::backpressure::{FlowCoordinator, ReadGate};
use crate::command::{spawn_dispatch_task, CommandTokenizer, DispatchHandle};
use crate::config::Config;
use crate::control::{scan_triggers, HttpRemote, LifecycleController, RemoteControl};
use crate::error::{BridgeError, Result};
use crate::protocol::FrameBuffer;
use crate::stats::{self, BridgeStats};
use crate::transport::{FrameListener, SerialLink, SerialSink};

/// Socket read size.
const READ_CHUNK: usize = 4 * 1024;

/// Moves frames from the current TCP peer into the serial sink.
pub struct FramePump<S> {
    buffer: FrameBuffer,
    coordinator: FlowCoordinator,
    gate: ReadGate,
    sink: S,
    drain: Arc<Notify>,
    stats: Arc<BridgeStats>,
    conn_rx: mpsc::UnboundedReceiver<TcpStream>,
}

impl<S: SerialSink> FramePump<S> {
    /// Create a pump fed by the streams arriving on `conn_rx`.
    pub fn new(
        sink: S,
        drain: Arc<Notify>,
        stats: Arc<BridgeStats>,
        conn_rx: mpsc::UnboundedReceiver<TcpStream>,
    ) -> Self {
        Self {
            buffer: FrameBuffer::new(),
            coordinator: FlowCoordinator::new(),
            gate: ReadGate::new(),
            sink,
            drain,
            stats,
            conn_rx,
        }
    }

    /// Run until the listener side goes away.
    ///
    /// A new connection replaces the current peer; the old one is dropped
    /// without draining. The socket is only read while the gate is open.
    pub async fn run(mut self) {
        let mut peer: Option<TcpStream> = None;
        let mut buf = vec![0u8; READ_CHUNK];

        loop {
            tokio::select! {
                conn = self.conn_rx.recv() => match conn {
                    Some(stream) => {
                        if peer.is_some() {
                            tracing::info!("New sensor connection replaces the current one");
                        }
                        peer = Some(stream);
                    }
                    None => return,
                },
                _ = self.drain.notified() => {
                    self.coordinator.on_drain(&self.sink, &mut self.gate);
                }
                read = read_peer(&mut peer, &mut buf), if self.gate.is_open() => match read {
                    Ok(0) => {
                        tracing::info!("Sensor disconnected");
                        peer = None;
                        self.reset();
                    }
                    Ok(n) => self.handle_chunk(&buf[..n]),
                    Err(e) => {
                        tracing::warn!("Sensor connection error: {}", e);
                        peer = None;
                        self.reset();
                    }
                },
            }
        }
    }

    /// Reassemble a chunk and forward every complete frame.
    pub fn handle_chunk(&mut self, chunk: &[u8]) {
        self.stats.add_bytes_received(chunk.len());

        for frame in self.buffer.ingest(chunk, &self.stats) {
            self.coordinator
                .forward(frame.as_bytes(), &mut self.sink, &mut self.gate, &self.stats);
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.coordinator.reset();
        self.gate.reset();
    }
}

async fn read_peer(peer: &mut Option<TcpStream>, buf: &mut [u8]) -> std::io::Result<usize> {
    match peer {
        Some(stream) => stream.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Turns inbound serial bytes into triggers and queued commands.
pub struct CommandPump {
    tokenizer: CommandTokenizer,
    dispatch: DispatchHandle,
    lifecycle: LifecycleController,
}

impl CommandPump {
    /// Create a pump with an empty tokenizer.
    pub fn new(dispatch: DispatchHandle, lifecycle: LifecycleController) -> Self {
        Self {
            tokenizer: CommandTokenizer::new(),
            dispatch,
            lifecycle,
        }
    }

    /// Handle one chunk read from the serial port.
    ///
    /// Every trigger byte schedules its own sequence. Tokens are queued
    /// for dispatch, trigger bytes included.
    pub fn handle_chunk(&mut self, chunk: &[u8]) {
        tracing::trace!(bytes = %chunk.escape_ascii(), "serial rx");

        for trigger in scan_triggers(chunk) {
            tracing::info!(?trigger, "Lifecycle trigger");
            self.lifecycle.trigger(trigger);
        }

        for token in self.tokenizer.ingest(chunk) {
            tracing::debug!(token = %token, "Queueing command");
            if let Err(e) = self.dispatch.enqueue(token) {
                tracing::warn!("Failed to queue command: {}", e);
            }
        }
    }

    /// Run until the serial reader goes away.
    pub async fn run(mut self, mut inbound: mpsc::UnboundedReceiver<Bytes>) {
        while let Some(chunk) = inbound.recv().await {
            self.handle_chunk(&chunk);
        }
        tracing::warn!("Serial input closed");
    }
}

/// Run the bridge until Ctrl-C or a fatal error.
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;
    let lifecycle_config = config.lifecycle_config()?;

    let stats = Arc::new(BridgeStats::new());
    let SerialLink {
        sink,
        drain,
        inbound,
    } = SerialLink::open(&config.serial)?;

    let remote: Arc<dyn RemoteControl> = Arc::new(HttpRemote::new(&config.device)?);
    tracing::info!("Sensor control endpoint: http://{}", config.device);

    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<BridgeError>();
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();
    let listener = Arc::new(FrameListener::new(
        config.local_address.clone(),
        config.port,
        conn_tx,
        fatal_tx,
    ));

    let (dispatch, _dispatch_task) = spawn_dispatch_task(remote.clone(), stats.clone());
    let lifecycle = LifecycleController::new(remote, listener, lifecycle_config);

    tokio::spawn(FramePump::new(sink, drain, stats.clone(), conn_rx).run());
    tokio::spawn(CommandPump::new(dispatch, lifecycle).run(inbound));
    let _reporter = stats::spawn_reporter(stats.clone(), config.stats_interval());

    tracing::info!("Bridge ready, waiting for commands on {}", config.serial);

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("Shutting down");
            Ok(())
        }
        Some(err) = fatal_rx.recv() => Err(err),
    }
}
