//! Flow control between the TCP frame source and the serial sink.
//!
//! The serial sink reports saturation on every write. The first saturated
//! write pauses the TCP source's read side; the sink's next drain signal
//! resumes it. Pause and resume are each issued at most once per
//! saturation episode.
//!
//! Drain signals are level-checked against the sink: one left over from
//! before the pause finds the sink still saturated and is ignored.
//!
//! # Usage
//!
//! The [`FlowCoordinator`] is owned by the frame pump, which is the only
//! task that touches the Flow Control Flag. The pump's socket read gate
//! implements [`FlowSource`], so "paused" simply means the pump stops
//! polling the socket until the drain signal arrives.

use crate::stats::BridgeStats;
use crate::transport::SerialSink;

/// Read side of a source that can be paused and resumed.
pub trait FlowSource {
    /// Stop reading from the source.
    fn pause(&mut self);
    /// Start reading from the source again.
    fn resume(&mut self);
}

/// Result of forwarding one frame to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarded {
    /// Bytes were handed to the sink, which still has room.
    Written,
    /// Bytes were handed to the sink, which is now above its water mark.
    Saturated,
    /// The sink was not writable; the bytes were dropped.
    Dropped,
}

/// Couples a [`FlowSource`] to a [`SerialSink`].
#[derive(Debug, Default)]
pub struct FlowCoordinator {
    /// Flow Control Flag: the source is paused because the sink saturated.
    paused: bool,
}

impl FlowCoordinator {
    /// Create a coordinator with the source running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the source is currently paused.
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Hand `data` to the sink, pausing the source if the sink saturates.
    ///
    /// Writes to an unavailable sink are silently dropped; nothing is
    /// queued for retry.
    pub fn forward<S, F>(
        &mut self,
        data: &[u8],
        sink: &mut S,
        source: &mut F,
        stats: &BridgeStats,
    ) -> Forwarded
    where
        S: SerialSink + ?Sized,
        F: FlowSource + ?Sized,
    {
        if !sink.is_writable() {
            stats.record_dropped_frame();
            return Forwarded::Dropped;
        }

        if !sink.write(data) {
            return Forwarded::Written;
        }

        if !self.paused {
            source.pause();
            self.paused = true;
            stats.record_backpressure();
            tracing::debug!("serial sink saturated, pausing TCP source");
        }

        Forwarded::Saturated
    }

    /// Handle the sink's drain signal.
    ///
    /// Resumes the source only if it was paused by this coordinator and the
    /// sink has actually dropped below its water mark.
    /// Returns `true` if a resume was issued.
    pub fn on_drain<S, F>(&mut self, sink: &S, source: &mut F) -> bool
    where
        S: SerialSink + ?Sized,
        F: FlowSource + ?Sized,
    {
        if !self.paused {
            return false;
        }

        if sink.is_saturated() {
            tracing::debug!("stale drain signal, serial sink still saturated");
            return false;
        }

        source.resume();
        self.paused = false;
        tracing::debug!("serial sink drained, resuming TCP source");
        true
    }

    /// Clear the flag without signalling the source (source went away).
    pub fn reset(&mut self) {
        self.paused = false;
    }
}

/// Read gate for the TCP source: the pump polls the socket only while open.
#[derive(Debug, Default)]
pub struct ReadGate {
    paused: bool,
}

impl ReadGate {
    /// Create an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the socket may be read.
    #[inline]
    pub fn is_open(&self) -> bool {
        !self.paused
    }

    /// Reopen the gate (peer replaced or disconnected).
    pub fn reset(&mut self) {
        self.paused = false;
    }
}

impl FlowSource for ReadGate {
    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }
}
