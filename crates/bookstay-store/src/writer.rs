// ABOUTME: Background task that performs snapshot saves in the order they were queued.
// ABOUTME: Queueing is synchronous so it can happen inside a critical section; the I/O happens outside it.

use bookstay_core::Snapshot;
use tokio::sync::{mpsc, oneshot};

use crate::coordinator::{PersistenceCoordinator, StorageError};

type SaveReply = oneshot::Sender<Result<(), StorageError>>;
type SaveRequest = (Snapshot, SaveReply);

/// Outcome of a queued save. Await it to learn whether the snapshot, or a
/// later one that superseded it, reached durable storage.
pub struct PendingSave {
    reply_rx: oneshot::Receiver<Result<(), StorageError>>,
}

impl PendingSave {
    pub async fn wait(self) -> Result<(), StorageError> {
        self.reply_rx
            .await
            .unwrap_or(Err(StorageError::WriterClosed))
    }
}

/// Handle for queueing snapshots to the writer task.
#[derive(Clone)]
pub struct SnapshotWriter {
    save_tx: mpsc::UnboundedSender<SaveRequest>,
}

impl SnapshotWriter {
    /// Spawn the writer task, which owns `coordinator` from now on.
    pub fn spawn(coordinator: PersistenceCoordinator) -> Self {
        let (save_tx, save_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(coordinator, save_rx));
        Self { save_tx }
    }

    /// Queue `snapshot` for saving. Saves complete in queue order, so calling
    /// this from inside the serializer makes write order match mutation order.
    pub fn enqueue(&self, snapshot: Snapshot) -> PendingSave {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.save_tx.send((snapshot, reply_tx)).is_err() {
            // The dropped request closes reply_rx; wait() reports WriterClosed.
            tracing::error!("snapshot writer is gone, save dropped");
        }
        PendingSave { reply_rx }
    }
}

/// Saves snapshots one at a time. When several are waiting, only the newest is
/// written: it contains every earlier mutation, so all waiters share its result.
async fn run(coordinator: PersistenceCoordinator, mut save_rx: mpsc::UnboundedReceiver<SaveRequest>) {
    while let Some((mut snapshot, reply)) = save_rx.recv().await {
        let mut replies = vec![reply];
        while let Ok((newer, reply)) = save_rx.try_recv() {
            snapshot = newer;
            replies.push(reply);
        }

        if replies.len() > 1 {
            tracing::debug!(coalesced = replies.len(), "saving newest of queued snapshots");
        }

        let result = coordinator.save(&snapshot).await;
        for reply in replies {
            // Ignore send error: the caller may have stopped waiting
            let _ = reply.send(result.clone());
        }
    }
    tracing::debug!("snapshot writer stopped: all handles dropped");
}
