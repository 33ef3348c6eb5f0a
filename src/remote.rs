//! Remote system-of-record abstraction.
//!
//! The core only needs "one write against one named table, succeeds or
//! fails"; the host supplies the implementation.

use std::future::Future;
use std::pin::Pin;

use crate::op::{RemoteWrite, WriteKind};

/// Remote write failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Store could not be reached.
    #[error("remote unreachable: {0}")]
    Unreachable(String),
    /// Store answered with an error.
    #[error("remote rejected write: {0}")]
    Rejected(String),
}

/// Result type for remote writes.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Boxed future returned by [`RemoteStore`] methods.
pub type RemoteFuture<'a> = Pin<Box<dyn Future<Output = RemoteResult<()>> + Send + 'a>>;

/// Remote store with four write kinds per entity table.
pub trait RemoteStore: Send + Sync {
    /// Creates a row.
    fn insert<'a>(&'a self, table: &'a str, payload: &'a serde_json::Value) -> RemoteFuture<'a>;

    /// Updates the row `id`.
    fn update<'a>(&'a self, table: &'a str, id: &'a str, payload: &'a serde_json::Value) -> RemoteFuture<'a>;

    /// Deletes the row `id`.
    fn delete<'a>(&'a self, table: &'a str, id: &'a str) -> RemoteFuture<'a>;

    /// Inserts or replaces the row `id`.
    fn upsert<'a>(&'a self, table: &'a str, id: &'a str, payload: &'a serde_json::Value) -> RemoteFuture<'a>;
}

/// Dispatches `write` to the matching [`RemoteStore`] method.
pub async fn apply_write(remote: &dyn RemoteStore, write: &RemoteWrite) -> RemoteResult<()> {
    let (table, id, payload) = (write.table.as_str(), write.record_id.as_str(), &write.payload);
    match write.kind {
        WriteKind::Insert => remote.insert(table, payload).await,
        WriteKind::Update => remote.update(table, id, payload).await,
        WriteKind::Delete => remote.delete(table, id).await,
        WriteKind::Upsert => remote.upsert(table, id, payload).await,
    }
}
