#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use hashbrown::HashMap;
use tokio::sync::Semaphore;

use cricklog::{
    ball::{MatchRecord, TeamRef, Toss},
    config::MatchRules,
    core::scoring::ScoringMachine,
    op::WriteKind,
    remote::{RemoteError, RemoteFuture, RemoteStore},
    types::{PlayerId, TossDecision},
};

pub const TEAM_ONE: u64 = 10;
pub const TEAM_TWO: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub kind: WriteKind,
    pub table: String,
    pub record_id: String,
}

#[derive(Default)]
struct Inner {
    applied: Vec<Applied>,
    failures: HashMap<String, u32>,
    attempts: HashMap<String, u32>,
    down: bool,
    started: usize,
    gate: Option<Arc<Semaphore>>,
}

/// Remote double that records application order and injects failures.
#[derive(Default)]
pub struct ScriptedRemote {
    inner: Mutex<Inner>,
}

impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fails the next `n` writes targeting `record_id`.
    pub fn fail_times(&self, record_id: &str, n: u32) {
        self.lock().failures.insert(record_id.to_string(), n);
    }

    /// Fails every write while set.
    pub fn set_down(&self, down: bool) {
        self.lock().down = down;
    }

    /// Holds every call until permits are added to the returned semaphore.
    pub fn install_gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.lock().gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn started(&self) -> usize {
        self.lock().started
    }

    pub fn applied(&self) -> Vec<Applied> {
        self.lock().applied.clone()
    }

    pub fn applied_ids(&self) -> Vec<String> {
        self.lock().applied.iter().map(|a| a.record_id.clone()).collect()
    }

    pub fn attempts(&self, record_id: &str) -> u32 {
        self.lock().attempts.get(record_id).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("remote lock")
    }

    fn call<'a>(&'a self, kind: WriteKind, table: &'a str, record_id: String) -> RemoteFuture<'a> {
        Box::pin(async move {
            let gate = {
                let mut inner = self.lock();
                inner.started += 1;
                inner.gate.clone()
            };
            if let Some(gate) = gate {
                let _permit = gate.acquire().await.expect("gate closed");
            }

            let mut inner = self.lock();
            *inner.attempts.entry(record_id.clone()).or_insert(0) += 1;
            if inner.down {
                return Err(RemoteError::Unreachable("remote down".to_string()));
            }
            if let Some(left) = inner.failures.get_mut(&record_id) {
                if *left > 0 {
                    *left -= 1;
                    return Err(RemoteError::Rejected(format!("scripted failure for {record_id}")));
                }
            }
            inner.applied.push(Applied {
                kind,
                table: table.to_string(),
                record_id,
            });
            Ok(())
        })
    }
}

impl RemoteStore for ScriptedRemote {
    fn insert<'a>(&'a self, table: &'a str, payload: &'a serde_json::Value) -> RemoteFuture<'a> {
        let id = payload
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        self.call(WriteKind::Insert, table, id)
    }

    fn update<'a>(&'a self, table: &'a str, id: &'a str, _payload: &'a serde_json::Value) -> RemoteFuture<'a> {
        self.call(WriteKind::Update, table, id.to_string())
    }

    fn delete<'a>(&'a self, table: &'a str, id: &'a str) -> RemoteFuture<'a> {
        self.call(WriteKind::Delete, table, id.to_string())
    }

    fn upsert<'a>(&'a self, table: &'a str, id: &'a str, _payload: &'a serde_json::Value) -> RemoteFuture<'a> {
        self.call(WriteKind::Upsert, table, id.to_string())
    }
}

pub fn match_record() -> MatchRecord {
    MatchRecord::new(
        1,
        TeamRef {
            id: TEAM_ONE,
            name: "Team 1".to_string(),
        },
        TeamRef {
            id: TEAM_TWO,
            name: "Team 2".to_string(),
        },
        Toss {
            winner: TEAM_ONE,
            decision: TossDecision::Bat,
        },
    )
}

/// Started machine with nobody selected yet.
pub fn started_machine(rules: MatchRules) -> ScoringMachine {
    let mut machine = ScoringMachine::new(match_record(), rules).expect("machine");
    machine.start_match().expect("start");
    machine
}

/// Player ids are `team * 10 + n`; bowlers use the top two of the squad.
fn player(team: u64, n: u64) -> PlayerId {
    team * 10 + n
}

/// Fills any selection the machine is waiting for, playing the part of
/// the player-selection screens.
pub struct Selector {
    next_batsman: u64,
    innings: u8,
}

impl Selector {
    pub fn new() -> Self {
        Self {
            next_batsman: 3,
            innings: 0,
        }
    }

    pub fn ensure_ready(&mut self, machine: &mut ScoringMachine) {
        let Some(innings) = machine.current_innings().cloned() else {
            return;
        };
        if innings.is_ended() {
            return;
        }
        if innings.number != self.innings {
            self.innings = innings.number;
            self.next_batsman = 3;
        }
        let bat = innings.batting_team;
        let bowl = innings.bowling_team;

        if !machine.crease().opened {
            machine
                .select_openers(player(bat, 1), player(bat, 2))
                .expect("openers");
        }
        if machine.crease().pair.iter().any(Option::is_none) {
            let next = player(bat, self.next_batsman);
            self.next_batsman += 1;
            machine.select_new_batsman(next).expect("new batsman");
        }
        if machine.crease().bowler.is_none() {
            let first = player(bowl, 8);
            let pick = if machine.crease().last_over_bowler == Some(first) {
                player(bowl, 9)
            } else {
                first
            };
            machine.select_bowler(pick).expect("bowler");
        }
    }
}
