//! Session lifecycle: start and stop sequences driven by serial triggers.
//!
//! A `b` byte on the serial line schedules a start sequence; an `s` byte
//! schedules a stop sequence. Each trigger runs its own sequence on its own
//! task after a short settle delay. Sequences are not serialized against
//! each other; overlapping sequences interleave freely.
//!
//! Start sequence:
//! 1. make sure the frame listener is bound (first time only: point the
//!    device at it)
//! 2. stop any stream in progress
//! 3. send the init command, if configured
//! 4. send each per-channel command, in channel order
//! 5. wait until one second after the sequence began, then start the stream
//!
//! Remote failures along the way are logged and never abort the sequence.
//! Only a listener that cannot be bound does.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::remote::{check_response, send_command, BoxFuture, NetworkTarget, RemoteControl};
use crate::error::Result;

/// Delay between a trigger byte and the start of its sequence.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Minimum time between the start of a start sequence and the stream start.
pub const START_BARRIER: Duration = Duration::from_secs(1);

/// Something that can bind the frame listener on demand.
pub trait ListenerControl: Send + Sync + 'static {
    /// Bind the listener if it is not yet bound.
    ///
    /// Returns `Ok(true)` if this call bound it.
    fn ensure_active(&self) -> BoxFuture<'_, Result<bool>>;
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No stream running.
    Stopped,
    /// Binding the listener and pointing the device at it.
    Configuring,
    /// Sending the init command.
    Initializing,
    /// Sending per-channel commands.
    ChannelSetup,
    /// Waiting out the start barrier.
    Settling,
    /// Stream started.
    Streaming,
}

/// A lifecycle trigger seen on the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Run the start sequence.
    Begin,
    /// Run the stop sequence.
    Stop,
}

impl Trigger {
    /// Byte that schedules a start sequence.
    pub const BEGIN_BYTE: u8 = b'b';
    /// Byte that schedules a stop sequence.
    pub const STOP_BYTE: u8 = b's';

    /// Map a serial byte to a trigger.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::BEGIN_BYTE => Some(Trigger::Begin),
            Self::STOP_BYTE => Some(Trigger::Stop),
            _ => None,
        }
    }
}

/// Every trigger in `chunk`, one per trigger byte, in order.
pub fn scan_triggers(chunk: &[u8]) -> impl Iterator<Item = Trigger> + '_ {
    chunk.iter().filter_map(|&b| Trigger::from_byte(b))
}

/// A command sent during channel setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCommand {
    /// 1-based channel index.
    pub channel: usize,
    /// Command token sent for this channel.
    pub command: String,
}

/// Fixed inputs of the start and stop sequences.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Target sent to the device the first time the listener binds.
    pub target: NetworkTarget,
    /// Sent once per start sequence, before channel setup.
    pub init_command: Option<String>,
    /// Sent in order during channel setup.
    pub channel_commands: Vec<ChannelCommand>,
    /// Delay between the trigger byte and the sequence.
    pub settle_delay: Duration,
    /// Minimum time from sequence start to the stream start.
    pub start_delay: Duration,
}

impl LifecycleConfig {
    /// Config with no init or channel commands and the default delays.
    pub fn new(target: NetworkTarget) -> Self {
        Self {
            target,
            init_command: None,
            channel_commands: Vec::new(),
            settle_delay: SETTLE_DELAY,
            start_delay: START_BARRIER,
        }
    }

    /// Set the init command. Empty strings are ignored.
    pub fn with_init_command(mut self, command: Option<String>) -> Self {
        self.init_command = command.filter(|c| !c.trim().is_empty());
        self
    }

    /// Set the channel commands; channel numbers follow list position.
    pub fn with_channel_commands<I>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.channel_commands = commands
            .into_iter()
            .enumerate()
            .filter(|(_, c)| !c.trim().is_empty())
            .map(|(i, command)| ChannelCommand {
                channel: i + 1,
                command,
            })
            .collect();
        self
    }
}

struct Inner {
    remote: Arc<dyn RemoteControl>,
    listener: Arc<dyn ListenerControl>,
    config: LifecycleConfig,
    state: watch::Sender<SessionState>,
}

/// Runs start and stop sequences against the remote endpoint.
#[derive(Clone)]
pub struct LifecycleController {
    inner: Arc<Inner>,
}

impl LifecycleController {
    /// Create a controller in the `Stopped` state.
    pub fn new(
        remote: Arc<dyn RemoteControl>,
        listener: Arc<dyn ListenerControl>,
        config: LifecycleConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Stopped);
        Self {
            inner: Arc::new(Inner {
                remote,
                listener,
                config,
                state,
            }),
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Schedule the sequence for `trigger` on its own task.
    pub fn trigger(&self, trigger: Trigger) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            match trigger {
                Trigger::Begin => this.run_begin().await,
                Trigger::Stop => this.run_stop().await,
            }
        })
    }

    fn set_state(&self, state: SessionState) {
        tracing::debug!(?state, "session state");
        self.inner.state.send_replace(state);
    }

    /// Run the start sequence, settle delay included.
    pub async fn run_begin(&self) {
        let Inner {
            remote,
            listener,
            config,
            ..
        } = &*self.inner;

        tokio::time::sleep(config.settle_delay).await;
        let started = Instant::now();
        tracing::info!("Starting session");

        self.set_state(SessionState::Configuring);
        match listener.ensure_active().await {
            Ok(true) => {
                match check_response("tcp", remote.configure_target(&config.target).await) {
                    Ok(_) => tracing::info!(
                        "Device streaming to {}:{}",
                        config.target.ip,
                        config.target.port
                    ),
                    Err(e) => tracing::warn!("Failed to configure network target: {}", e),
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!("Frame listener unavailable, aborting start: {}", e);
                self.set_state(SessionState::Stopped);
                return;
            }
        }

        if let Err(e) = check_response("stream/stop", remote.stream_stop().await) {
            tracing::warn!("Failed to stop stream before start: {}", e);
        }

        self.set_state(SessionState::Initializing);
        if let Some(command) = &config.init_command {
            tracing::info!(command = %command, "Sending init command");
            send_command(remote.as_ref(), command).await;
        }

        self.set_state(SessionState::ChannelSetup);
        for ChannelCommand { channel, command } in &config.channel_commands {
            tracing::info!(channel, command = %command, "Sending channel command");
            send_command(remote.as_ref(), command).await;
        }

        self.set_state(SessionState::Settling);
        tokio::time::sleep_until(started + config.start_delay).await;

        match check_response("stream/start", remote.stream_start().await) {
            Ok(_) => {
                tracing::info!("Stream started");
                self.set_state(SessionState::Streaming);
            }
            Err(e) => {
                tracing::warn!("Failed to start stream: {}", e);
                self.set_state(SessionState::Stopped);
            }
        }
    }

    /// Run the stop sequence, settle delay included.
    pub async fn run_stop(&self) {
        tokio::time::sleep(self.inner.config.settle_delay).await;
        tracing::info!("Stopping session");

        match check_response("stream/stop", self.inner.remote.stream_stop().await) {
            Ok(_) => tracing::info!("Stream stopped"),
            Err(e) => tracing::warn!("Failed to stop stream: {}", e),
        }
        self.set_state(SessionState::Stopped);
    }
}
