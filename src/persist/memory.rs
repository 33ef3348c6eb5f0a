//! Volatile queue storage for tests and hosts without a filesystem.

use crate::{
    op::{QueuedOp, RemoteWrite},
    types::OpId,
};

use super::{QueueError, QueueResult, QueueStore};

/// In-memory [`QueueStore`].
#[derive(Debug, Default)]
pub struct MemoryQueue {
    ops: Vec<QueuedOp>,
    next_id: OpId,
}

impl MemoryQueue {
    /// Empty queue; ids start at 1.
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            next_id: 1,
        }
    }
}

impl QueueStore for MemoryQueue {
    fn enqueue(&mut self, write: &RemoteWrite, ts_ms: u64) -> QueueResult<QueuedOp> {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        let op = QueuedOp {
            id,
            ts_ms,
            retry_count: 0,
            write: write.clone(),
        };
        self.ops.push(op.clone());
        Ok(op)
    }

    fn dequeue_all(&self) -> QueueResult<Vec<QueuedOp>> {
        Ok(self.ops.clone())
    }

    fn remove(&mut self, id: OpId) -> QueueResult<bool> {
        match self.ops.iter().position(|op| op.id == id) {
            Some(pos) => {
                self.ops.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn bump_retry(&mut self, id: OpId) -> QueueResult<u32> {
        let op = self
            .ops
            .iter_mut()
            .find(|op| op.id == id)
            .ok_or(QueueError::UnknownOp(id))?;
        op.retry_count += 1;
        Ok(op.retry_count)
    }

    fn count(&self) -> QueueResult<usize> {
        Ok(self.ops.len())
    }
}
