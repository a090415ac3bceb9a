//! Dedicated dispatch task for command tokens.
//!
//! The serial side enqueues tokens without waiting; a single task sends
//! them to the remote endpoint one at a time. A token is never sent before
//! the previous token's dispatch (both attempts) has finished.
//!
//! ```text
//! CommandPump ─► mpsc::UnboundedSender<String> ─► Dispatch Task ─► RemoteControl
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::control::{send_command, RemoteControl};
use crate::error::{BridgeError, Result};
use crate::stats::BridgeStats;

/// Handle for queueing tokens on the dispatch task.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<String>,
    /// Tokens queued or in flight.
    depth: Arc<AtomicUsize>,
}

impl DispatchHandle {
    /// Queue a token for dispatch. Never waits.
    pub fn enqueue(&self, token: impl Into<String>) -> Result<()> {
        self.depth.fetch_add(1, Ordering::AcqRel);

        self.tx.send(token.into()).map_err(|_| {
            self.depth.fetch_sub(1, Ordering::Release);
            BridgeError::ChannelClosed
        })
    }

    /// Tokens queued or currently being dispatched.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Whether nothing is queued or in flight.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.depth() == 0
    }
}

/// Spawn the dispatch task and return a handle for queueing tokens.
///
/// The task ends once every [`DispatchHandle`] has been dropped and the
/// queue is empty.
pub fn spawn_dispatch_task(
    remote: Arc<dyn RemoteControl>,
    stats: Arc<BridgeStats>,
) -> (DispatchHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));

    let handle = DispatchHandle {
        tx,
        depth: depth.clone(),
    };
    let task = tokio::spawn(dispatch_loop(rx, remote, depth, stats));

    (handle, task)
}

async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    remote: Arc<dyn RemoteControl>,
    depth: Arc<AtomicUsize>,
    stats: Arc<BridgeStats>,
) {
    while let Some(token) = rx.recv().await {
        let report = send_command(remote.as_ref(), &token).await;
        stats.record_dispatch(report.succeeded());
        depth.fetch_sub(1, Ordering::Release);
    }

    tracing::debug!("Dispatch queue closed");
}
