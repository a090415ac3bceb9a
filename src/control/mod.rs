//! Control plane - the sensor's HTTP endpoint and the session lifecycle.
//!
//! Command tokens parsed from the serial line are sent to the device
//! through [`RemoteControl`]; trigger bytes run start and stop sequences
//! through [`LifecycleController`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sensorbridge::control::{HttpRemote, LifecycleConfig, LifecycleController, NetworkTarget, Trigger};
//!
//! let remote = Arc::new(HttpRemote::new("192.168.4.1")?);
//! let config = LifecycleConfig::new(NetworkTarget::raw("192.168.4.2", 3000, 10_000));
//! let lifecycle = LifecycleController::new(remote, listener, config);
//! lifecycle.trigger(Trigger::Begin);
//! ```

mod lifecycle;
mod remote;

pub use lifecycle::{
    scan_triggers, ChannelCommand, LifecycleConfig, LifecycleController, ListenerControl,
    SessionState, Trigger, SETTLE_DELAY, START_BARRIER,
};
pub use remote::{
    check_response, send_command, Attempt, BoxFuture, DispatchReport, HttpRemote, NetworkTarget,
    RemoteControl, RemoteResponse,
};
