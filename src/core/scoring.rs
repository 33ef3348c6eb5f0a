use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    ball::{BallRecord, Delivery, InningsState, MatchRecord, PlayerLine},
    config::MatchRules,
    op::Fact,
    types::{
        DismissalKind, EndReason, ExtraKind, InningsNo, MatchStatus, PlayerId, TeamId,
        TossDecision, now_ms,
    },
};

use super::summary;

const SNAPSHOT_FORMAT_VERSION: u16 = 1;

/// Invalid scoring action. Raised before any state is touched.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    /// The match is still upcoming.
    #[error("match has not started")]
    MatchNotStarted,
    /// `start_match` was called twice.
    #[error("match already started")]
    AlreadyStarted,
    /// Both innings are over.
    #[error("match is completed")]
    MatchCompleted,
    #[error("toss winner {0} does not play in this match")]
    UnknownTossWinner(TeamId),
    #[error("opening pair not selected")]
    OpenersRequired,
    #[error("openers already at the crease")]
    OpenersAlreadySelected,
    #[error("striker and non-striker are both {0}")]
    SamePlayer(PlayerId),
    /// A wicket left a slot empty.
    #[error("new batsman required")]
    NewBatsmanRequired,
    #[error("no batting slot is vacant")]
    NoVacancy,
    #[error("player {0} is already out")]
    AlreadyDismissed(PlayerId),
    #[error("player {0} is already batting")]
    AlreadyBatting(PlayerId),
    /// No bowler for the over in progress.
    #[error("bowler required")]
    BowlerRequired,
    #[error("bowler {0} bowled the previous over")]
    ConsecutiveOvers(PlayerId),
    #[error("bowler cannot change mid-over")]
    OverInProgress,
    #[error("runs off the bat must be 0..=6, got {0}")]
    InvalidRuns(u8),
    /// Extra runs would overflow the delivery or innings total.
    #[error("extra runs {0} out of range")]
    InvalidExtras(u32),
    #[error("runs off the bat not allowed on {0:?}")]
    RunsOffBatOnExtra(ExtraKind),
    #[error("wicket requires a dismissal kind")]
    MissingDismissal,
    /// The dismissal kind is refused while a free hit is in effect.
    #[error("{0:?} is not allowed on a free hit")]
    FreeHitDismissal(DismissalKind),
    #[error("player {0} is not at the crease")]
    NotAtCrease(PlayerId),
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("unsupported snapshot format {0}")]
    SnapshotVersion(u16),
}

/// Who is batting and bowling right now.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Crease {
    /// Active batsmen; `None` marks a vacated slot.
    pub pair: [Option<PlayerId>; 2],
    /// Index into `pair` of the batsman on strike.
    pub striker: usize,
    /// Current bowler; cleared when an over completes.
    pub bowler: Option<PlayerId>,
    /// Bowler of the last completed over.
    pub last_over_bowler: Option<PlayerId>,
    /// Next legal delivery is a free hit.
    pub free_hit: bool,
    /// Batsmen dismissed this innings.
    pub dismissed: Vec<PlayerId>,
    /// Openers have been seated for this innings.
    pub opened: bool,
}

impl Crease {
    /// Facing batsman, if seated.
    pub fn striker(&self) -> Option<PlayerId> {
        self.pair[self.striker]
    }

    /// Batsman at the bowler's end, if seated.
    pub fn non_striker(&self) -> Option<PlayerId> {
        self.pair[1 - self.striker]
    }

    fn vacancy(&self) -> Option<usize> {
        self.pair.iter().position(Option::is_none)
    }

    fn slot_of(&self, player: PlayerId) -> Option<usize> {
        self.pair.iter().position(|p| *p == Some(player))
    }
}

/// What a recorded delivery did, for event fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Record of the delivery as persisted.
    pub ball: BallRecord,
    /// Striker and non-striker swapped ends.
    pub strike_rotated: bool,
    /// Six legal balls completed; a new bowler must be selected.
    pub over_completed: bool,
    /// A batsman is out; a replacement must be selected unless the innings ended.
    pub wicket: Option<PlayerId>,
    /// Powerplay overs just ran out. Fires once per innings.
    pub powerplay_ended: bool,
    /// Set when this delivery closed the innings.
    pub innings_ended: Option<EndReason>,
    /// Result string when this delivery completed the match.
    pub match_result: Option<String>,
}

#[derive(Debug, Clone)]
struct UndoEntry {
    innings: InningsState,
    crease: Crease,
    lines: Vec<PlayerLine>,
}

/// Serializable image of a live match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringSnapshotV1 {
    /// Always the current snapshot version.
    pub format_version: u16,
    /// Rules the match was started with.
    pub rules: MatchRules,
    /// Match row with every innings so far.
    pub record: MatchRecord,
    /// Crease at the time of export.
    pub crease: Crease,
    /// Player lines sorted by innings and player.
    pub lines: Vec<PlayerLine>,
    /// Every recorded delivery, in order.
    pub balls: Vec<BallRecord>,
}

/// Ball-by-ball scoring state machine.
///
/// Every accepted action mutates state and queues the facts that persist it in
/// one step; drain them with [`ScoringMachine::drain_pending_facts`].
#[derive(Debug)]
pub struct ScoringMachine {
    rules: MatchRules,
    record: MatchRecord,
    crease: Crease,
    lines: HashMap<(InningsNo, PlayerId), PlayerLine>,
    balls: Vec<BallRecord>,
    undo: Vec<UndoEntry>,
    pending: Vec<Fact>,
}

impl ScoringMachine {
    /// Wraps an upcoming match. The toss winner must be one of its teams.
    pub fn new(record: MatchRecord, rules: MatchRules) -> Result<Self, ScoreError> {
        if record.team(record.toss.winner).is_none() {
            return Err(ScoreError::UnknownTossWinner(record.toss.winner));
        }
        Ok(Self {
            rules,
            record,
            crease: Crease::default(),
            lines: HashMap::new(),
            balls: Vec::new(),
            undo: Vec::new(),
            pending: Vec::new(),
        })
    }

    /// Restores a machine exported by [`ScoringMachine::export_snapshot`]. The undo history is not carried over.
    pub fn from_snapshot(snapshot: ScoringSnapshotV1) -> Result<Self, ScoreError> {
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(ScoreError::SnapshotVersion(snapshot.format_version));
        }
        let lines = snapshot
            .lines
            .into_iter()
            .map(|line| ((line.innings, line.player_id), line))
            .collect();
        Ok(Self {
            rules: snapshot.rules,
            record: snapshot.record,
            crease: snapshot.crease,
            lines,
            balls: snapshot.balls,
            undo: Vec::new(),
            pending: Vec::new(),
        })
    }

    /// Serializable image of the live match.
    pub fn export_snapshot(&self) -> ScoringSnapshotV1 {
        let mut lines: Vec<PlayerLine> = self.lines.values().cloned().collect();
        lines.sort_by_key(|l| (l.innings, l.player_id));
        ScoringSnapshotV1 {
            format_version: SNAPSHOT_FORMAT_VERSION,
            rules: self.rules.clone(),
            record: self.record.clone(),
            crease: self.crease.clone(),
            lines,
            balls: self.balls.clone(),
        }
    }

    /// Moves an upcoming match to live and opens the first innings.
    pub fn start_match(&mut self) -> Result<&InningsState, ScoreError> {
        match self.record.status {
            MatchStatus::Upcoming => {}
            MatchStatus::Live => return Err(ScoreError::AlreadyStarted),
            MatchStatus::Completed => return Err(ScoreError::MatchCompleted),
        }

        let toss = self.record.toss;
        let batting = match toss.decision {
            TossDecision::Bat => toss.winner,
            TossDecision::Bowl => self.record.opponent_of(toss.winner),
        };
        let bowling = self.record.opponent_of(batting);

        self.record.status = MatchStatus::Live;
        self.record.innings.push(InningsState::new(1, batting, bowling, None));
        self.crease = Crease::default();
        info!(match_id = self.record.id, batting, "match started");
        self.pending.push(Fact::Match(self.record.clone()));
        self.current_innings().ok_or(ScoreError::MatchNotStarted)
    }

    /// Seats the opening pair for the current innings.
    pub fn select_openers(&mut self, striker: PlayerId, non_striker: PlayerId) -> Result<(), ScoreError> {
        let innings = self.live_innings()?.number;
        if self.crease.opened {
            return Err(ScoreError::OpenersAlreadySelected);
        }
        if striker == non_striker {
            return Err(ScoreError::SamePlayer(striker));
        }

        self.crease.pair = [Some(striker), Some(non_striker)];
        self.crease.striker = 0;
        self.crease.opened = true;
        for player in [striker, non_striker] {
            self.touch_line(innings, player);
        }
        Ok(())
    }

    /// Seats a replacement in the slot vacated by the last wicket.
    pub fn select_new_batsman(&mut self, player: PlayerId) -> Result<(), ScoreError> {
        let innings = self.live_innings()?.number;
        if !self.crease.opened {
            return Err(ScoreError::OpenersRequired);
        }
        let slot = self.crease.vacancy().ok_or(ScoreError::NoVacancy)?;
        if self.crease.dismissed.contains(&player) {
            return Err(ScoreError::AlreadyDismissed(player));
        }
        if self.crease.slot_of(player).is_some() {
            return Err(ScoreError::AlreadyBatting(player));
        }

        self.crease.pair[slot] = Some(player);
        self.touch_line(innings, player);
        Ok(())
    }

    /// Sets the bowler for the coming over.
    ///
    /// Rejects the bowler of the previous over and changes once the over has
    /// a legal ball in it.
    pub fn select_bowler(&mut self, player: PlayerId) -> Result<(), ScoreError> {
        let innings = self.live_innings()?;
        let (number, mid_over) = (innings.number, innings.balls > 0);
        if self.crease.last_over_bowler == Some(player) {
            return Err(ScoreError::ConsecutiveOvers(player));
        }
        if mid_over && self.crease.bowler.is_some_and(|b| b != player) {
            return Err(ScoreError::OverInProgress);
        }
        if self.crease.slot_of(player).is_some() {
            return Err(ScoreError::AlreadyBatting(player));
        }

        self.crease.bowler = Some(player);
        self.touch_line(number, player);
        Ok(())
    }

    /// Records one delivery.
    ///
    /// Validation runs first; an error leaves the machine untouched. On success
    /// the ball, the changed player lines and the match row are queued as facts.
    pub fn record_ball(&mut self, delivery: Delivery) -> Result<DeliveryOutcome, ScoreError> {
        let (striker, non_striker, bowler, dismissed) = self.validate(&delivery)?;

        let match_id = self.record.id;
        let rules = &self.rules;
        let Some(innings) = self.record.innings.last_mut() else {
            return Err(ScoreError::MatchNotStarted);
        };
        let number = innings.number;

        let mut prior_lines = Vec::with_capacity(3);
        for player in [Some(striker), Some(bowler), dismissed].into_iter().flatten() {
            if prior_lines.iter().all(|l: &PlayerLine| l.player_id != player) {
                let line = self
                    .lines
                    .get(&(number, player))
                    .cloned()
                    .unwrap_or_else(|| PlayerLine::new(match_id, number, player));
                prior_lines.push(line);
            }
        }
        self.undo.push(UndoEntry {
            innings: innings.clone(),
            crease: self.crease.clone(),
            lines: prior_lines,
        });

        let kind = delivery.extra_kind;
        let legal = kind.is_legal();
        let total = delivery.total_runs();
        let free_hit = self.crease.free_hit;

        innings.deliveries += 1;
        innings.runs += total;
        let seq = innings.deliveries;
        let over_number = innings.overs;
        let ball_number = innings.balls + 1;

        {
            let line = self
                .lines
                .entry((number, striker))
                .or_insert_with(|| PlayerLine::new(match_id, number, striker));
            if kind != ExtraKind::Wide {
                line.batting.balls_faced += 1;
                line.batting.runs += u32::from(delivery.runs_off_bat);
                match delivery.runs_off_bat {
                    4 => line.batting.fours += 1,
                    6 => line.batting.sixes += 1,
                    _ => {}
                }
            }
        }
        {
            let line = self
                .lines
                .entry((number, bowler))
                .or_insert_with(|| PlayerLine::new(match_id, number, bowler));
            line.bowling.runs_conceded += total;
            if legal {
                line.bowling.legal_balls += 1;
            }
            if delivery.is_wicket && delivery.dismissal.is_some_and(DismissalKind::credits_bowler) {
                line.bowling.wickets += 1;
            }
        }

        if let Some(out) = dismissed {
            innings.wickets += 1;
            let line = self
                .lines
                .entry((number, out))
                .or_insert_with(|| PlayerLine::new(match_id, number, out));
            line.batting.is_out = true;
            line.batting.dismissal = delivery.dismissal;
            if let Some(slot) = self.crease.slot_of(out) {
                self.crease.pair[slot] = None;
            }
            self.crease.dismissed.push(out);
        }

        if kind == ExtraKind::NoBall {
            self.crease.free_hit = true;
        } else if legal {
            self.crease.free_hit = false;
        }

        let mut strike_rotated = legal && !delivery.is_wicket && delivery.runs_off_bat % 2 == 1;
        let mut over_completed = false;
        let mut powerplay_ended = false;
        if legal {
            innings.balls += 1;
            if innings.balls == 6 {
                innings.overs += 1;
                innings.balls = 0;
                over_completed = true;
                strike_rotated = !strike_rotated;
                self.crease.last_over_bowler = Some(bowler);
                self.crease.bowler = None;

                if rules.powerplay_overs > 0
                    && !innings.powerplay_done
                    && innings.overs == rules.powerplay_overs
                {
                    innings.powerplay_done = true;
                    powerplay_ended = true;
                }
            }
        }
        if strike_rotated {
            self.crease.striker ^= 1;
        }

        let innings_ended = if innings.wickets >= rules.all_out_wickets() {
            Some(EndReason::AllOut)
        } else if innings.overs >= rules.overs_per_innings {
            Some(EndReason::OversCompleted)
        } else if number == 2 && innings.target.is_some_and(|t| innings.runs >= t) {
            Some(EndReason::TargetReached)
        } else {
            None
        };

        let ball = BallRecord {
            id: format!("{match_id}-{number}-{seq}"),
            match_id,
            innings: number,
            seq,
            over_number,
            ball_number,
            striker,
            non_striker,
            bowler,
            runs_off_bat: delivery.runs_off_bat,
            extra_runs: delivery.extra_runs,
            extra_kind: kind,
            is_wicket: delivery.is_wicket,
            dismissal: delivery.dismissal.filter(|_| delivery.is_wicket),
            dismissed,
            free_hit,
            commentary: delivery.commentary,
            ts_ms: now_ms(),
        };
        debug!(ball = %ball.id, runs = total, legal, "ball recorded");
        self.balls.push(ball.clone());

        self.pending.push(Fact::BallRecorded(ball.clone()));
        for player in [Some(striker), Some(bowler), dismissed.filter(|p| *p != striker)]
            .into_iter()
            .flatten()
        {
            if let Some(line) = self.lines.get(&(number, player)) {
                self.pending.push(Fact::PlayerLine(line.clone()));
            }
        }

        let match_result = match innings_ended {
            Some(reason) => self.end_innings(reason),
            None => None,
        };
        self.pending.push(Fact::Match(self.record.clone()));

        Ok(DeliveryOutcome {
            ball,
            strike_rotated,
            over_completed,
            wicket: dismissed,
            powerplay_ended,
            innings_ended,
            match_result,
        })
    }

    /// Reverts the last delivery of the current innings.
    pub fn undo_last_ball(&mut self) -> Result<BallRecord, ScoreError> {
        self.live_innings()?;
        let entry = self.undo.pop().ok_or(ScoreError::NothingToUndo)?;
        let ball = self.balls.pop().ok_or(ScoreError::NothingToUndo)?;

        if let Some(innings) = self.record.innings.last_mut() {
            *innings = entry.innings;
        }
        self.crease = entry.crease;
        self.pending.push(Fact::BallDeleted { id: ball.id.clone() });
        for line in entry.lines {
            self.pending.push(Fact::PlayerLine(line.clone()));
            self.lines.insert((line.innings, line.player_id), line);
        }
        self.pending.push(Fact::Match(self.record.clone()));
        debug!(ball = %ball.id, "ball undone");
        Ok(ball)
    }

    /// Match row as scored so far.
    pub fn match_record(&self) -> &MatchRecord {
        &self.record
    }

    /// Rules in force.
    pub fn rules(&self) -> &MatchRules {
        &self.rules
    }

    /// Current batsmen, bowler and free-hit state.
    pub fn crease(&self) -> &Crease {
        &self.crease
    }

    /// Innings being scored, or the last one once the match is over.
    pub fn current_innings(&self) -> Option<&InningsState> {
        self.record.innings.last()
    }

    /// All recorded deliveries across both innings.
    pub fn balls(&self) -> &[BallRecord] {
        &self.balls
    }

    /// Deliveries of innings `number`.
    pub fn innings_balls(&self, number: InningsNo) -> impl Iterator<Item = &BallRecord> {
        self.balls.iter().filter(move |b| b.innings == number)
    }

    /// Line of `player` in innings `innings`, if they took part.
    pub fn line(&self, innings: InningsNo, player: PlayerId) -> Option<&PlayerLine> {
        self.lines.get(&(innings, player))
    }

    /// Deliveries that can still be undone.
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Takes the facts queued since the last call, oldest first.
    pub fn drain_pending_facts(&mut self) -> Vec<Fact> {
        std::mem::take(&mut self.pending)
    }

    fn live_innings(&self) -> Result<&InningsState, ScoreError> {
        match self.record.status {
            MatchStatus::Upcoming => Err(ScoreError::MatchNotStarted),
            MatchStatus::Completed => Err(ScoreError::MatchCompleted),
            MatchStatus::Live => self.current_innings().ok_or(ScoreError::MatchNotStarted),
        }
    }

    /// Returns striker, non-striker, bowler and the dismissed batsman.
    fn validate(
        &self,
        delivery: &Delivery,
    ) -> Result<(PlayerId, PlayerId, PlayerId, Option<PlayerId>), ScoreError> {
        let innings = self.live_innings()?;
        if !self.crease.opened {
            return Err(ScoreError::OpenersRequired);
        }
        let (Some(striker), Some(non_striker)) = (self.crease.striker(), self.crease.non_striker()) else {
            return Err(ScoreError::NewBatsmanRequired);
        };
        let bowler = self.crease.bowler.ok_or(ScoreError::BowlerRequired)?;

        if delivery.runs_off_bat > 6 {
            return Err(ScoreError::InvalidRuns(delivery.runs_off_bat));
        }
        let total = u32::from(delivery.runs_off_bat)
            .checked_add(delivery.extra_runs)
            .ok_or(ScoreError::InvalidExtras(delivery.extra_runs))?;
        if innings.runs.checked_add(total).is_none() {
            return Err(ScoreError::InvalidExtras(delivery.extra_runs));
        }
        if delivery.runs_off_bat > 0
            && matches!(delivery.extra_kind, ExtraKind::Wide | ExtraKind::Bye | ExtraKind::LegBye)
        {
            return Err(ScoreError::RunsOffBatOnExtra(delivery.extra_kind));
        }

        if !delivery.is_wicket {
            return Ok((striker, non_striker, bowler, None));
        }

        let kind = delivery.dismissal.ok_or(ScoreError::MissingDismissal)?;
        if self.crease.free_hit && !self.rules.free_hit.permits(kind) {
            return Err(ScoreError::FreeHitDismissal(kind));
        }
        let out = delivery.dismissed.unwrap_or(striker);
        if out != striker && out != non_striker {
            return Err(ScoreError::NotAtCrease(out));
        }
        Ok((striker, non_striker, bowler, Some(out)))
    }

    fn touch_line(&mut self, innings: InningsNo, player: PlayerId) {
        let match_id = self.record.id;
        if self.lines.contains_key(&(innings, player)) {
            return;
        }
        let line = PlayerLine::new(match_id, innings, player);
        self.pending.push(Fact::PlayerLine(line.clone()));
        self.lines.insert((innings, player), line);
    }

    /// Closes the current innings; returns the result string when the match ends.
    fn end_innings(&mut self, reason: EndReason) -> Option<String> {
        self.undo.clear();
        self.crease = Crease::default();

        let innings = self.record.innings.last_mut()?;
        innings.end_reason = Some(reason);
        let (number, runs, batting, bowling) =
            (innings.number, innings.runs, innings.batting_team, innings.bowling_team);
        info!(
            match_id = self.record.id,
            innings = number,
            runs,
            reason = reason.as_str(),
            "innings ended"
        );

        if number == 1 {
            self.record
                .innings
                .push(InningsState::new(2, bowling, batting, Some(runs + 1)));
            return None;
        }

        let result = summary::result_string(&self.record, &self.rules);
        self.record.status = MatchStatus::Completed;
        self.record.result = Some(result.clone());
        info!(match_id = self.record.id, result = %result, "match completed");
        Some(result)
    }
}
