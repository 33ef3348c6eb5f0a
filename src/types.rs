//! Shared primitive IDs and cricket rule enums.

use serde::{Deserialize, Serialize};

/// Match identifier supplied by the match-setup collaborator.
pub type MatchId = u64;
/// Team identifier.
pub type TeamId = u64;
/// Player identifier.
pub type PlayerId = u64;
/// Locally generated, monotonic queued-operation identifier.
pub type OpId = u64;
/// Innings ordinal, 1 or 2.
pub type InningsNo = u8;

/// Extra classification of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraKind {
    /// No extra.
    #[default]
    None,
    /// Wide, does not consume a ball slot.
    Wide,
    /// No-ball, does not consume a ball slot and sets a free hit.
    NoBall,
    /// Byes.
    Bye,
    /// Leg-byes.
    LegBye,
}

impl ExtraKind {
    /// True when a delivery of this kind consumes a ball slot.
    pub fn is_legal(self) -> bool {
        !matches!(self, Self::Wide | Self::NoBall)
    }
}

/// How a batsman was dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissalKind {
    /// Bowled.
    Bowled,
    /// Caught.
    Caught,
    /// Leg before wicket.
    Lbw,
    /// Stumped.
    Stumped,
    /// Run out.
    RunOut,
    /// Hit wicket.
    HitWicket,
    /// Obstructing the field.
    ObstructingField,
}

impl DismissalKind {
    /// True when the bowler is credited with the wicket.
    pub fn credits_bowler(self) -> bool {
        matches!(
            self,
            Self::Bowled | Self::Caught | Self::Lbw | Self::Stumped | Self::HitWicket
        )
    }
}

/// Lifecycle of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Created, not started.
    #[default]
    Upcoming,
    /// Being scored.
    Live,
    /// Terminal.
    Completed,
}

/// What the toss winner chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TossDecision {
    /// Toss winner bats first.
    Bat,
    /// Toss winner bowls first.
    Bowl,
}

/// Why an innings ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Wickets reached squad size minus one.
    AllOut,
    /// Over limit reached.
    OversCompleted,
    /// Second innings passed the target.
    TargetReached,
}

impl EndReason {
    /// Stable wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllOut => "all_out",
            Self::OversCompleted => "overs_completed",
            Self::TargetReached => "target_reached",
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
