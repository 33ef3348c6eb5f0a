//! Single entry point for scoring facts on their way to the remote store.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    config::FacadeConfig,
    op::{Fact, RemoteWrite, WriteKind},
    persist::{OperationQueue, QueueError},
    remote::{RemoteStore, apply_write},
    types::OpId,
};

/// Failure to persist a fact locally or remotely.
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    /// Deletes are never queued; they need the remote row to exist now.
    #[error("delete requires connectivity")]
    OfflineDelete,
    /// The fact could not be encoded.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The local append itself failed; nothing is durable.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Where a fact ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    /// Confirmed by the remote store.
    Remote,
    /// Durably queued for replay.
    Queued(OpId),
}

/// Remote-first writer with durable-queue fallback.
pub struct PersistenceFacade {
    remote: Arc<dyn RemoteStore>,
    queue: OperationQueue,
    online: watch::Receiver<bool>,
    config: FacadeConfig,
}

impl PersistenceFacade {
    /// Builds a facade writing to `remote`, falling back to `queue`.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        queue: OperationQueue,
        online: watch::Receiver<bool>,
        config: FacadeConfig,
    ) -> Self {
        Self {
            remote,
            queue,
            online,
            config,
        }
    }

    /// Current connectivity as seen by the facade.
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// True when a delete would be attempted rather than refused.
    pub fn can_delete(&self) -> bool {
        self.is_online()
    }

    /// Persists one scoring fact.
    pub async fn persist(&self, fact: &Fact) -> Result<Persisted, FacadeError> {
        let write = fact.to_write()?;
        self.submit(write).await
    }

    /// Writes through when online, otherwise queues.
    ///
    /// A remote failure falls back to the queue, so the only errors are a
    /// refused offline delete and a failed local append.
    pub async fn submit(&self, write: RemoteWrite) -> Result<Persisted, FacadeError> {
        if !self.is_online() {
            if write.kind == WriteKind::Delete {
                return Err(FacadeError::OfflineDelete);
            }
            return self.enqueue(write).await;
        }

        if self.config.queue_behind_pending && self.queue.pending() > 0 {
            debug!(table = %write.table, pending = self.queue.pending(), "queueing behind pending ops");
            return self.enqueue(write).await;
        }

        match apply_write(self.remote.as_ref(), &write).await {
            Ok(()) => {
                debug!(table = %write.table, record_id = %write.record_id, "written remotely");
                Ok(Persisted::Remote)
            }
            Err(err) => {
                warn!(
                    table = %write.table,
                    record_id = %write.record_id,
                    error = %err,
                    "remote write failed, queueing"
                );
                self.enqueue(write).await
            }
        }
    }

    async fn enqueue(&self, write: RemoteWrite) -> Result<Persisted, FacadeError> {
        let op = self.queue.enqueue(write).await?;
        Ok(Persisted::Queued(op.id))
    }
}
