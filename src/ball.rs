//! Match, innings, ball and player-line records plus the scoring action input.

use serde::{Deserialize, Serialize};

use crate::types::{
    DismissalKind, EndReason, ExtraKind, InningsNo, MatchId, MatchStatus, PlayerId, TeamId,
    TossDecision,
};

/// Team reference carried by a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    /// Team identifier.
    pub id: TeamId,
    /// Display name used in the result string.
    pub name: String,
}

/// Toss outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toss {
    /// Team that won the toss.
    pub winner: TeamId,
    /// Choice made by the winner.
    pub decision: TossDecision,
}

/// Match row as handed over by match setup and mutated by scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Match identifier.
    pub id: MatchId,
    /// First team.
    pub team_a: TeamRef,
    /// Second team.
    pub team_b: TeamRef,
    /// Toss outcome.
    pub toss: Toss,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Per-innings score summaries, in order.
    pub innings: Vec<InningsState>,
    /// Result string once completed.
    pub result: Option<String>,
}

impl MatchRecord {
    /// Creates an upcoming match.
    pub fn new(id: MatchId, team_a: TeamRef, team_b: TeamRef, toss: Toss) -> Self {
        Self {
            id,
            team_a,
            team_b,
            toss,
            status: MatchStatus::Upcoming,
            innings: Vec::new(),
            result: None,
        }
    }

    /// Team reference for `id`, if it plays in this match.
    pub fn team(&self, id: TeamId) -> Option<&TeamRef> {
        [&self.team_a, &self.team_b].into_iter().find(|t| t.id == id)
    }

    /// The team that is not `id`.
    pub fn opponent_of(&self, id: TeamId) -> TeamId {
        if self.team_a.id == id {
            self.team_b.id
        } else {
            self.team_a.id
        }
    }

    /// Stable remote row identifier.
    pub fn row_id(&self) -> String {
        self.id.to_string()
    }
}

/// Running totals of one innings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InningsState {
    /// Ordinal, 1 or 2.
    pub number: InningsNo,
    /// Batting side.
    pub batting_team: TeamId,
    /// Fielding side.
    pub bowling_team: TeamId,
    /// Total runs including extras.
    pub runs: u32,
    /// Wickets fallen.
    pub wickets: u32,
    /// Completed overs.
    pub overs: u32,
    /// Legal balls bowled in the current over, 0..=5.
    pub balls: u8,
    /// Runs needed to win, second innings only.
    pub target: Option<u32>,
    /// Set exactly once when the innings ends.
    pub end_reason: Option<EndReason>,
    /// Deliveries recorded so far, legal or not.
    pub deliveries: u32,
    /// Powerplay notification already fired.
    pub powerplay_done: bool,
}

impl InningsState {
    /// Fresh innings with zeroed counters.
    pub fn new(number: InningsNo, batting_team: TeamId, bowling_team: TeamId, target: Option<u32>) -> Self {
        Self {
            number,
            batting_team,
            bowling_team,
            runs: 0,
            wickets: 0,
            overs: 0,
            balls: 0,
            target,
            end_reason: None,
            deliveries: 0,
            powerplay_done: false,
        }
    }

    /// Legal deliveries bowled in this innings.
    pub fn legal_balls(&self) -> u32 {
        self.overs * 6 + u32::from(self.balls)
    }

    /// True once an end reason has been recorded.
    pub fn is_ended(&self) -> bool {
        self.end_reason.is_some()
    }

    /// Overs in cricket notation, e.g. `18.3`.
    pub fn overs_display(&self) -> String {
        format!("{}.{}", self.overs, self.balls)
    }
}

/// Single scoring action as entered by the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Delivery {
    /// Runs credited off the bat, 0..=6.
    pub runs_off_bat: u8,
    /// Extra runs, including the wide/no-ball penalty.
    pub extra_runs: u32,
    /// Extra classification.
    pub extra_kind: ExtraKind,
    /// A wicket fell on this delivery.
    pub is_wicket: bool,
    /// Required when `is_wicket` is set.
    pub dismissal: Option<DismissalKind>,
    /// Dismissed batsman; the striker when not given.
    pub dismissed: Option<PlayerId>,
    /// Free-text commentary.
    pub commentary: String,
}

impl Delivery {
    /// Legal delivery with `n` runs off the bat.
    pub fn runs(n: u8) -> Self {
        Self {
            runs_off_bat: n,
            ..Self::default()
        }
    }

    /// Extra of `kind` worth `runs`.
    pub fn extra(kind: ExtraKind, runs: u32) -> Self {
        Self {
            extra_runs: runs,
            extra_kind: kind,
            ..Self::default()
        }
    }

    /// Legal delivery on which the striker is dismissed.
    pub fn wicket(kind: DismissalKind) -> Self {
        Self {
            is_wicket: true,
            dismissal: Some(kind),
            ..Self::default()
        }
    }

    /// Names the dismissed batsman explicitly.
    pub fn dismissing(mut self, player: PlayerId) -> Self {
        self.dismissed = Some(player);
        self
    }

    /// Attaches commentary.
    pub fn with_commentary(mut self, text: impl Into<String>) -> Self {
        self.commentary = text.into();
        self
    }

    /// Runs this delivery adds to the innings total.
    pub fn total_runs(&self) -> u32 {
        u32::from(self.runs_off_bat).saturating_add(self.extra_runs)
    }
}

/// Immutable fact for one delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallRecord {
    /// Pre-generated row identifier, `{match}-{innings}-{seq}`.
    pub id: String,
    /// Owning match.
    pub match_id: MatchId,
    /// Innings ordinal.
    pub innings: InningsNo,
    /// Delivery ordinal within the innings, starting at 1.
    pub seq: u32,
    /// Over in progress when bowled, 0-based.
    pub over_number: u32,
    /// Slot within the over, 1..=6.
    pub ball_number: u8,
    /// Facing batsman.
    pub striker: PlayerId,
    /// Batsman at the other end.
    pub non_striker: PlayerId,
    /// Bowler.
    pub bowler: PlayerId,
    /// Runs off the bat.
    pub runs_off_bat: u8,
    /// Extra runs.
    pub extra_runs: u32,
    /// Extra classification.
    pub extra_kind: ExtraKind,
    /// Wicket flag.
    pub is_wicket: bool,
    /// Dismissal kind when `is_wicket`.
    pub dismissal: Option<DismissalKind>,
    /// Dismissed batsman when `is_wicket`.
    pub dismissed: Option<PlayerId>,
    /// Free hit was in effect for this delivery.
    pub free_hit: bool,
    /// Free-text commentary.
    pub commentary: String,
    /// Wall-clock time in milliseconds.
    pub ts_ms: u64,
}

impl BallRecord {
    /// True when the delivery consumed a ball slot.
    pub fn is_legal(&self) -> bool {
        self.extra_kind.is_legal()
    }

    /// Runs added to the innings.
    pub fn total_runs(&self) -> u32 {
        u32::from(self.runs_off_bat).saturating_add(self.extra_runs)
    }
}

/// Batting half of a player line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BattingLine {
    /// Runs off the bat.
    pub runs: u32,
    /// Deliveries faced, wides excluded.
    pub balls_faced: u32,
    /// Boundaries worth four.
    pub fours: u32,
    /// Boundaries worth six.
    pub sixes: u32,
    /// Line closed by a dismissal.
    pub is_out: bool,
    /// How the line was closed.
    pub dismissal: Option<DismissalKind>,
}

/// Bowling half of a player line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BowlingLine {
    /// Legal deliveries bowled.
    pub legal_balls: u32,
    /// Runs conceded, extras included.
    pub runs_conceded: u32,
    /// Bowler-credited dismissals.
    pub wickets: u32,
}

impl BowlingLine {
    /// Overs bowled in cricket notation.
    pub fn overs_display(&self) -> String {
        format!("{}.{}", self.legal_balls / 6, self.legal_balls % 6)
    }
}

/// Per-player, per-innings accumulated figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLine {
    /// Pre-generated row identifier, `{match}-{innings}-{player}`.
    pub id: String,
    /// Owning match.
    pub match_id: MatchId,
    /// Innings ordinal.
    pub innings: InningsNo,
    /// Player.
    pub player_id: PlayerId,
    /// Batting figures.
    pub batting: BattingLine,
    /// Bowling figures.
    pub bowling: BowlingLine,
}

impl PlayerLine {
    /// Zeroed line.
    pub fn new(match_id: MatchId, innings: InningsNo, player_id: PlayerId) -> Self {
        Self {
            id: format!("{match_id}-{innings}-{player_id}"),
            match_id,
            innings,
            player_id,
            batting: BattingLine::default(),
            bowling: BowlingLine::default(),
        }
    }
}
