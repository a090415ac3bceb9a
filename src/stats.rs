//! Process-wide bridge counters.
//!
//! A single [`BridgeStats`] is created at startup and shared by reference
//! (`Arc<BridgeStats>`) with the components that update it. Counters only
//! ever grow; they reset when the process restarts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Counters updated by the frame path and the command path.
#[derive(Debug, Default)]
pub struct BridgeStats {
    bytes_received: AtomicU64,
    good_frames: AtomicU64,
    bad_frames: AtomicU64,
    skipped_bytes: AtomicU64,
    backpressure_events: AtomicU64,
    dropped_frames: AtomicU64,
    commands_dispatched: AtomicU64,
    command_failures: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Bytes read from the TCP peer.
    pub bytes_received: u64,
    /// Frames that passed validation and were forwarded.
    pub good_frames: u64,
    /// Candidates rejected because of a bad stop byte.
    pub bad_frames: u64,
    /// Garbage bytes skipped while searching for a sync marker.
    pub skipped_bytes: u64,
    /// Times the TCP source was paused because the serial sink saturated.
    pub backpressure_events: u64,
    /// Frames dropped because the serial sink was not writable.
    pub dropped_frames: u64,
    /// Command tokens whose dispatch completed (success or failure).
    pub commands_dispatched: u64,
    /// Command tokens for which both encodings failed.
    pub command_failures: u64,
}

impl BridgeStats {
    /// Create a zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` bytes read from the TCP peer.
    #[inline]
    pub fn add_bytes_received(&self, n: usize) {
        self.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Count one frame forwarded to the serial sink.
    #[inline]
    pub fn record_good_frame(&self) {
        self.good_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one candidate rejected for its stop byte.
    #[inline]
    pub fn record_bad_frame(&self) {
        self.bad_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `n` garbage bytes skipped while resyncing.
    #[inline]
    pub fn add_skipped_bytes(&self, n: usize) {
        self.skipped_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Count one pause of the TCP source.
    #[inline]
    pub fn record_backpressure(&self) {
        self.backpressure_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one frame dropped because the sink was unwritable.
    #[inline]
    pub fn record_dropped_frame(&self) {
        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed command dispatch.
    pub fn record_dispatch(&self, success: bool) {
        self.commands_dispatched.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.command_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            good_frames: self.good_frames.load(Ordering::Relaxed),
            bad_frames: self.bad_frames.load(Ordering::Relaxed),
            skipped_bytes: self.skipped_bytes.load(Ordering::Relaxed),
            backpressure_events: self.backpressure_events.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
            command_failures: self.command_failures.load(Ordering::Relaxed),
        }
    }
}

/// Spawn a task that logs a stats line every `interval`.
///
/// Returns `None` when `interval` is zero (reporting disabled).
pub fn spawn_reporter(stats: Arc<BridgeStats>, interval: Duration) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately.
        ticker.tick().await;
        let mut last = stats.snapshot();

        loop {
            ticker.tick().await;
            let now = stats.snapshot();
            let rate = (now.good_frames - last.good_frames) as f64 / interval.as_secs_f64();

            tracing::info!(
                frames_per_sec = format_args!("{:.1}", rate),
                good = now.good_frames,
                bad = now.bad_frames,
                skipped = now.skipped_bytes,
                dropped = now.dropped_frames,
                backpressure = now.backpressure_events,
                bytes = now.bytes_received,
                commands = now.commands_dispatched,
                command_failures = now.command_failures,
                "bridge stats"
            );
            last = now;
        }
    }))
}
