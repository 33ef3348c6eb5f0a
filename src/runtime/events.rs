//! Runtime event stream payloads.

use crate::types::{EndReason, InningsNo, PlayerId, TeamId};

/// Events emitted from the single-writer scorer loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreEvent {
    /// The match went live.
    MatchStarted {
        /// Side batting first.
        batting_team: TeamId,
    },
    /// A delivery was recorded.
    BallRecorded {
        /// Ball row id.
        id: String,
        /// Innings ordinal.
        innings: InningsNo,
        /// Over in progress when bowled.
        over_number: u32,
        /// Slot within the over.
        ball_number: u8,
    },
    /// A batsman is out; a replacement is required.
    WicketFell {
        /// Dismissed batsman.
        player: PlayerId,
    },
    /// Six legal balls completed; a bowler change is required.
    OverCompleted {
        /// Innings ordinal.
        innings: InningsNo,
        /// Completed overs so far.
        overs: u32,
    },
    /// Powerplay overs are done. Display only.
    PowerplayEnded {
        /// Innings ordinal.
        innings: InningsNo,
    },
    /// An innings closed.
    InningsEnded {
        /// Innings ordinal.
        innings: InningsNo,
        /// Why it closed.
        reason: EndReason,
    },
    /// The match is over.
    MatchCompleted {
        /// Result string.
        result: String,
    },
    /// The last ball was removed.
    BallUndone {
        /// Ball row id.
        id: String,
    },
    /// A fact reached the remote store or the durable queue.
    Persisted {
        /// Target row id.
        record_id: String,
        /// True when queued rather than confirmed remotely.
        queued: bool,
    },
}
