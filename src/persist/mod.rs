pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use tokio::sync::{Mutex, watch};

use crate::{
    op::{QueuedOp, RemoteWrite},
    types::{OpId, now_ms},
};

/// Local queue failure.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Stored payload has an unknown format version.
    #[error("unsupported op format version: {0}")]
    FormatVersion(u16),
    /// No pending operation has this id.
    #[error("unknown queued operation {0}")]
    UnknownOp(OpId),
    /// Blocking storage task panicked or was cancelled.
    #[error("queue task failed: {0}")]
    Join(String),
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Storage behind the durable queue.
///
/// Implementations return operations in enqueue order and never merge or
/// reorder them.
pub trait QueueStore: Send {
    /// Appends `write` and assigns the next id.
    fn enqueue(&mut self, write: &RemoteWrite, ts_ms: u64) -> QueueResult<QueuedOp>;
    /// Pending operations, oldest first. Does not remove them.
    fn dequeue_all(&self) -> QueueResult<Vec<QueuedOp>>;
    /// Returns false when `id` was not pending.
    fn remove(&mut self, id: OpId) -> QueueResult<bool>;
    /// Increments and returns the retry count of `id`.
    fn bump_retry(&mut self, id: OpId) -> QueueResult<u32>;
    /// Pending operations.
    fn count(&self) -> QueueResult<usize>;
}

/// Durable local queue service.
///
/// Owns its storage handle and publishes the pending count. Storage calls run
/// on the blocking pool so callers only ever await.
#[derive(Clone)]
pub struct OperationQueue {
    store: Arc<Mutex<Box<dyn QueueStore>>>,
    count_tx: Arc<watch::Sender<usize>>,
}

impl OperationQueue {
    /// Wraps `store` and publishes its current size.
    pub fn new(store: Box<dyn QueueStore>) -> QueueResult<Self> {
        let pending = store.count()?;
        let (count_tx, _) = watch::channel(pending);
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            count_tx: Arc::new(count_tx),
        })
    }

    /// Appends `write`; success means the local append is durable.
    pub async fn enqueue(&self, write: RemoteWrite) -> QueueResult<QueuedOp> {
        let (op, pending) = self
            .with_store(move |store| {
                let op = store.enqueue(&write, now_ms())?;
                Ok((op, store.count()?))
            })
            .await?;
        self.count_tx.send_replace(pending);
        Ok(op)
    }

    /// All pending operations, oldest first.
    pub async fn dequeue_all(&self) -> QueueResult<Vec<QueuedOp>> {
        self.with_store(|store| store.dequeue_all()).await
    }

    /// Deletes a confirmed operation.
    pub async fn remove(&self, id: OpId) -> QueueResult<bool> {
        let (removed, pending) = self
            .with_store(move |store| Ok((store.remove(id)?, store.count()?)))
            .await?;
        self.count_tx.send_replace(pending);
        Ok(removed)
    }

    /// Records one more failed replay of `id`.
    pub async fn bump_retry(&self, id: OpId) -> QueueResult<u32> {
        self.with_store(move |store| store.bump_retry(id)).await
    }

    /// Reads the pending count from storage.
    pub async fn count(&self) -> QueueResult<usize> {
        self.with_store(|store| store.count()).await
    }

    /// Last published pending count.
    pub fn pending(&self) -> usize {
        *self.count_tx.borrow()
    }

    /// Watch channel carrying the pending count after every change.
    pub fn subscribe_count(&self) -> watch::Receiver<usize> {
        self.count_tx.subscribe()
    }

    async fn with_store<T, F>(&self, f: F) -> QueueResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn QueueStore) -> QueueResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut guard = store.blocking_lock();
            f(guard.as_mut())
        })
        .await
        .map_err(|e| QueueError::Join(e.to_string()))?
    }
}
