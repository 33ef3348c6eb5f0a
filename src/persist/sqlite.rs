//! SQLite-backed durable operation queue.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    op::{OP_FORMAT_VERSION, QueuedOp, RemoteWrite, WriteEnvelope},
    types::OpId,
};

use super::{QueueError, QueueResult, QueueStore};

/// SQLite implementation of [`crate::persist::QueueStore`].
pub struct SqliteQueue {
    conn: Connection,
}

impl SqliteQueue {
    /// Opens or creates a SQLite-backed queue at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=FULL` so an acknowledged
    /// enqueue survives power loss.
    pub fn open(path: impl AsRef<Path>) -> QueueResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite queue.
    pub fn open_in_memory() -> QueueResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> QueueResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        Ok(Self { conn })
    }

    /// Highest id ever assigned, 0 when none.
    pub fn latest_id(&self) -> QueueResult<OpId> {
        let id: Option<i64> = self
            .conn
            .query_row("SELECT MAX(id) FROM pending_ops", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()?
            .flatten();
        Ok(id.unwrap_or(0) as OpId)
    }
}

impl QueueStore for SqliteQueue {
    fn enqueue(&mut self, write: &RemoteWrite, ts_ms: u64) -> QueueResult<QueuedOp> {
        let payload = serde_json::to_vec(&WriteEnvelope::new(write.clone()))?;
        self.conn.execute(
            "INSERT INTO pending_ops(ts_ms, kind, target, record_id, retry_count, payload) \
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                ts_ms as i64,
                write.kind.code(),
                write.table,
                write.record_id,
                payload,
            ],
        )?;
        let id = self.conn.last_insert_rowid() as OpId;
        Ok(QueuedOp {
            id,
            ts_ms,
            retry_count: 0,
            write: write.clone(),
        })
    }

    fn dequeue_all(&self) -> QueueResult<Vec<QueuedOp>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, ts_ms, retry_count, payload FROM pending_ops ORDER BY id ASC")?;

        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let ts_ms: i64 = row.get(1)?;
            let retry_count: i64 = row.get(2)?;
            let payload: Vec<u8> = row.get(3)?;
            Ok((id, ts_ms, retry_count, payload))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, ts_ms, retry_count, payload) = row?;
            out.push(QueuedOp {
                id: id as OpId,
                ts_ms: ts_ms as u64,
                retry_count: retry_count as u32,
                write: decode_write_payload(&payload)?,
            });
        }
        Ok(out)
    }

    fn remove(&mut self, id: OpId) -> QueueResult<bool> {
        let count = self
            .conn
            .execute("DELETE FROM pending_ops WHERE id = ?1", params![id as i64])?;
        Ok(count > 0)
    }

    fn bump_retry(&mut self, id: OpId) -> QueueResult<u32> {
        let updated = self.conn.execute(
            "UPDATE pending_ops SET retry_count = retry_count + 1 WHERE id = ?1",
            params![id as i64],
        )?;
        if updated == 0 {
            return Err(QueueError::UnknownOp(id));
        }
        let retries: i64 = self.conn.query_row(
            "SELECT retry_count FROM pending_ops WHERE id = ?1",
            params![id as i64],
            |row| row.get(0),
        )?;
        Ok(retries as u32)
    }

    fn count(&self) -> QueueResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pending_ops", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn decode_write_payload(payload: &[u8]) -> QueueResult<RemoteWrite> {
    let envelope: WriteEnvelope = serde_json::from_slice(payload)?;
    if envelope.format_version != OP_FORMAT_VERSION {
        return Err(QueueError::FormatVersion(envelope.format_version));
    }
    Ok(envelope.write)
}
