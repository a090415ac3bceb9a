//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or as a `BRIDGE_*` environment
//! variable; flags win.

use std::net::IpAddr;
use std::time::Duration;

use clap::Parser;

use crate::control::{LifecycleConfig, NetworkTarget};
use crate::error::{BridgeError, Result};

/// Bridge configuration.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sensorbridge",
    version,
    about = "Bridge a network sensor's frame stream to a serial port"
)]
pub struct Config {
    /// Sensor device host (its HTTP control endpoint is http://<device>)
    #[arg(long, env = "BRIDGE_DEVICE")]
    pub device: String,

    /// Local address the frame listener binds to
    #[arg(long, env = "BRIDGE_LOCAL_ADDRESS", default_value = "0.0.0.0")]
    pub local_address: String,

    /// Address the device should stream to (defaults to --local-address)
    #[arg(long, env = "BRIDGE_ADVERTISE_ADDRESS")]
    pub advertise_address: Option<String>,

    /// Frame listener port
    #[arg(short, long, env = "BRIDGE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Serial port path (e.g., /dev/ttyUSB0)
    #[arg(long, env = "BRIDGE_SERIAL")]
    pub serial: String,

    /// Latency hint sent to the device, in microseconds
    #[arg(long, env = "BRIDGE_LATENCY", default_value_t = 10_000)]
    pub latency: u32,

    /// Command sent once at the start of every session
    #[arg(long, env = "BRIDGE_INIT_COMMAND")]
    pub init_command: Option<String>,

    /// Per-channel setup command; repeat once per channel, in order
    #[arg(long = "channel-command", env = "BRIDGE_CHANNEL_COMMANDS", value_delimiter = ';')]
    pub channel_commands: Vec<String>,

    /// Enable debug logging
    #[arg(short, long, env = "BRIDGE_VERBOSE")]
    pub verbose: bool,

    /// Seconds between stats log lines (0 disables)
    #[arg(long, env = "BRIDGE_STATS_INTERVAL", default_value_t = 10)]
    pub stats_interval: u64,
}

impl Config {
    /// Check the configuration for values the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(BridgeError::Config("device must not be empty".to_string()));
        }
        if self.serial.trim().is_empty() {
            return Err(BridgeError::Config("serial port must not be empty".to_string()));
        }
        self.advertised_address()?;
        Ok(())
    }

    /// Address the device is told to stream frames to.
    ///
    /// An unspecified local address (e.g. `0.0.0.0`) cannot be reached by
    /// the device, so an advertise address is required in that case.
    pub fn advertised_address(&self) -> Result<String> {
        if let Some(addr) = &self.advertise_address {
            return Ok(addr.clone());
        }

        match self.local_address.parse::<IpAddr>() {
            Ok(ip) if ip.is_unspecified() => Err(BridgeError::Config(format!(
                "local address {} is unspecified; set --advertise-address",
                self.local_address
            ))),
            _ => Ok(self.local_address.clone()),
        }
    }

    /// Network target the device is pointed at.
    pub fn network_target(&self) -> Result<NetworkTarget> {
        Ok(NetworkTarget::raw(
            self.advertised_address()?,
            self.port,
            self.latency,
        ))
    }

    /// Inputs of the start and stop sequences.
    pub fn lifecycle_config(&self) -> Result<LifecycleConfig> {
        Ok(LifecycleConfig::new(self.network_target()?)
            .with_init_command(self.init_command.clone())
            .with_channel_commands(self.channel_commands.iter().cloned()))
    }

    /// Stats reporting interval; zero disables reporting.
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval)
    }
}
