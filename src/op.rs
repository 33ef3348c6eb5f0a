//! Persistence facts, remote write model and queued-operation rows.

use serde::{Deserialize, Serialize};

use crate::{
    ball::{BallRecord, MatchRecord, PlayerLine},
    types::OpId,
};

/// Version number for serialized [`WriteEnvelope`] payloads.
pub const OP_FORMAT_VERSION: u16 = 1;

/// Remote table receiving ball rows.
pub const TABLE_BALLS: &str = "balls";
/// Remote table receiving player lines.
pub const TABLE_PLAYER_STATS: &str = "player_match_stats";
/// Remote table receiving match rows.
pub const TABLE_MATCHES: &str = "matches";

/// Fact emitted by the scoring state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fact {
    /// A delivery was recorded.
    BallRecorded(BallRecord),
    /// A delivery was undone.
    BallDeleted {
        /// Row id of the removed ball.
        id: String,
    },
    /// A player line changed.
    PlayerLine(PlayerLine),
    /// Match status or score summary changed.
    Match(MatchRecord),
}

impl Fact {
    /// Row identifier the fact targets.
    pub fn record_id(&self) -> String {
        match self {
            Self::BallRecorded(ball) => ball.id.clone(),
            Self::BallDeleted { id } => id.clone(),
            Self::PlayerLine(line) => line.id.clone(),
            Self::Match(record) => record.row_id(),
        }
    }

    /// Maps this fact to the remote write that persists it.
    pub fn to_write(&self) -> Result<RemoteWrite, serde_json::Error> {
        let write = match self {
            Self::BallRecorded(ball) => RemoteWrite {
                kind: WriteKind::Insert,
                table: TABLE_BALLS.to_string(),
                record_id: ball.id.clone(),
                payload: serde_json::to_value(ball)?,
            },
            Self::BallDeleted { id } => RemoteWrite {
                kind: WriteKind::Delete,
                table: TABLE_BALLS.to_string(),
                record_id: id.clone(),
                payload: serde_json::Value::Null,
            },
            Self::PlayerLine(line) => RemoteWrite {
                kind: WriteKind::Upsert,
                table: TABLE_PLAYER_STATS.to_string(),
                record_id: line.id.clone(),
                payload: serde_json::to_value(line)?,
            },
            Self::Match(record) => RemoteWrite {
                kind: WriteKind::Update,
                table: TABLE_MATCHES.to_string(),
                record_id: record.row_id(),
                payload: serde_json::to_value(record)?,
            },
        };
        Ok(write)
    }
}

/// Remote write operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    /// Create a row.
    Insert,
    /// Update a row by identifier.
    Update,
    /// Delete a row by identifier.
    Delete,
    /// Insert or replace by identifier.
    Upsert,
}

impl WriteKind {
    /// Stable storage code.
    pub fn code(self) -> i64 {
        match self {
            Self::Insert => 1,
            Self::Update => 2,
            Self::Delete => 3,
            Self::Upsert => 4,
        }
    }
}

/// One write against one remote entity table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteWrite {
    /// Operation kind.
    pub kind: WriteKind,
    /// Target table name.
    pub table: String,
    /// Target row identifier.
    pub record_id: String,
    /// Row snapshot; `null` for deletes.
    pub payload: serde_json::Value,
}

/// Pending operation held by the durable queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedOp {
    /// Monotonic local identifier; enqueue order.
    pub id: OpId,
    /// Enqueue time in milliseconds.
    pub ts_ms: u64,
    /// Failed replay attempts so far.
    pub retry_count: u32,
    /// Write to replay.
    pub write: RemoteWrite,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped write.
    pub write: RemoteWrite,
}

impl WriteEnvelope {
    /// Constructs an envelope using [`OP_FORMAT_VERSION`].
    pub fn new(write: RemoteWrite) -> Self {
        Self {
            format_version: OP_FORMAT_VERSION,
            write,
        }
    }
}
