//! Queue drain with retry and abandonment policy.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::{
    config::SyncConfig,
    op::{QueuedOp, RemoteWrite, WriteKind},
    persist::{OperationQueue, QueueError},
    remote::{RemoteStore, apply_write},
    types::{OpId, now_ms},
};

/// Error type for drain operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Local queue failure; the drain stopped.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Published sync indicator state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Last known connectivity.
    pub is_online: bool,
    /// Operations waiting in the queue.
    pub pending_count: usize,
    /// End of the last drain that ran, milliseconds since epoch.
    pub last_sync_ms: Option<u64>,
    /// A drain is running.
    pub is_syncing: bool,
    /// Operations confirmed by replay since start.
    pub synced_total: u64,
    /// Operations dropped after exhausting their attempts.
    pub failed_total: u64,
}

/// Per-drain tally.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DrainReport {
    /// Operations applied and removed.
    pub synced: usize,
    /// Operations dropped after their last attempt.
    pub dropped: usize,
    /// Operation whose failure ended the drain; it and everything after it
    /// stay queued.
    pub deferred: Option<OpId>,
    /// Connectivity dropped mid-drain.
    pub interrupted: bool,
}

/// What a drain request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The queue was walked.
    Completed(DrainReport),
    /// Another drain holds the lock; nothing was done.
    AlreadyRunning,
    /// Known offline; nothing was attempted.
    Offline,
}

/// Drains the durable queue against the remote store, one drain at a time.
pub struct SyncEngine {
    queue: OperationQueue,
    remote: Arc<dyn RemoteStore>,
    online: watch::Receiver<bool>,
    config: SyncConfig,
    drain_lock: Mutex<()>,
    status_tx: watch::Sender<SyncStatus>,
}

impl SyncEngine {
    /// Builds an engine over `queue` that replays to `remote` while `online` holds.
    pub fn new(
        queue: OperationQueue,
        remote: Arc<dyn RemoteStore>,
        online: watch::Receiver<bool>,
        config: SyncConfig,
    ) -> Self {
        let status = SyncStatus {
            is_online: *online.borrow(),
            pending_count: queue.pending(),
            ..SyncStatus::default()
        };
        let (status_tx, _) = watch::channel(status);
        Self {
            queue,
            remote,
            online,
            config,
            drain_lock: Mutex::new(()),
            status_tx,
        }
    }

    /// Current status.
    pub fn status(&self) -> SyncStatus {
        self.status_tx.borrow().clone()
    }

    /// Watch channel carrying every status change.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Queue being drained.
    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    /// Re-reads connectivity and pending count into the published status.
    pub fn refresh_status(&self) {
        let is_online = *self.online.borrow();
        let pending_count = self.queue.pending();
        self.status_tx.send_if_modified(|s| {
            let changed = s.is_online != is_online || s.pending_count != pending_count;
            s.is_online = is_online;
            s.pending_count = pending_count;
            changed
        });
    }

    /// Replays pending operations in enqueue order.
    ///
    /// A request while another drain runs is a no-op. A failed operation that
    /// still has attempts left ends the drain so nothing behind it is applied
    /// first; one that has used its last attempt is dropped and the drain
    /// moves on.
    pub async fn drain(&self) -> Result<DrainOutcome, SyncError> {
        let Ok(_guard) = self.drain_lock.try_lock() else {
            debug!("drain already running");
            return Ok(DrainOutcome::AlreadyRunning);
        };
        if !*self.online.borrow() {
            self.refresh_status();
            return Ok(DrainOutcome::Offline);
        }

        self.status_tx.send_modify(|s| s.is_syncing = true);
        let result = self.drain_locked().await;
        let pending_count = self.queue.pending();
        let is_online = *self.online.borrow();
        self.status_tx.send_modify(|s| {
            s.is_syncing = false;
            s.is_online = is_online;
            s.pending_count = pending_count;
            if result.is_ok() {
                s.last_sync_ms = Some(now_ms());
            }
        });

        let report = result?;
        info!(
            synced = report.synced,
            dropped = report.dropped,
            pending = pending_count,
            "drain finished"
        );
        Ok(DrainOutcome::Completed(report))
    }

    async fn drain_locked(&self) -> Result<DrainReport, SyncError> {
        let mut report = DrainReport::default();

        for op in self.queue.dequeue_all().await? {
            if !*self.online.borrow() {
                report.interrupted = true;
                break;
            }

            let write = self.replay_write(&op);
            match apply_write(self.remote.as_ref(), &write).await {
                Ok(()) => {
                    self.queue.remove(op.id).await?;
                    report.synced += 1;
                    self.status_tx.send_modify(|s| {
                        s.synced_total += 1;
                        s.pending_count = self.queue.pending();
                    });
                    debug!(op_id = op.id, table = %write.table, "replayed");
                }
                Err(err) => {
                    let attempts = self.queue.bump_retry(op.id).await?;
                    if attempts >= self.config.max_attempts {
                        self.queue.remove(op.id).await?;
                        report.dropped += 1;
                        self.status_tx.send_modify(|s| {
                            s.failed_total += 1;
                            s.pending_count = self.queue.pending();
                        });
                        warn!(
                            op_id = op.id,
                            table = %write.table,
                            record_id = %write.record_id,
                            attempts,
                            error = %err,
                            "dropping queued operation"
                        );
                        continue;
                    }
                    warn!(op_id = op.id, attempts, error = %err, "replay failed, deferring");
                    report.deferred = Some(op.id);
                    break;
                }
            }
        }

        Ok(report)
    }

    fn replay_write(&self, op: &QueuedOp) -> RemoteWrite {
        let mut write = op.write.clone();
        if self.config.upsert_on_replay && write.kind == WriteKind::Insert {
            write.kind = WriteKind::Upsert;
        }
        write
    }
}
