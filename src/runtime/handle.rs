use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::error;

use crate::{
    ball::{BallRecord, Delivery},
    config::RuntimeConfig,
    core::scoring::{DeliveryOutcome, ScoreError, ScoringMachine, ScoringSnapshotV1},
    sync::facade::{FacadeError, PersistenceFacade, Persisted},
    types::PlayerId,
};

use super::events::ScoreEvent;

/// Failure of a scorer command.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The scoring action was invalid; nothing changed.
    #[error(transparent)]
    Score(#[from] ScoreError),
    /// A fact could not be persisted, or an undo was refused.
    #[error(transparent)]
    Facade(#[from] FacadeError),
    /// The scorer loop is gone.
    #[error("scorer loop stopped")]
    ChannelClosed,
}

/// Cloneable handle to the scorer loop.
pub struct ScorerHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<ScoreEvent>,
}

impl Clone for ScorerHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    StartMatch {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    SelectOpeners {
        striker: PlayerId,
        non_striker: PlayerId,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    SelectBowler {
        player: PlayerId,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    SelectNewBatsman {
        player: PlayerId,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    RecordBall {
        delivery: Delivery,
        resp: oneshot::Sender<Result<DeliveryOutcome, RuntimeError>>,
    },
    UndoLastBall {
        resp: oneshot::Sender<Result<BallRecord, RuntimeError>>,
    },
    Snapshot {
        resp: oneshot::Sender<ScoringSnapshotV1>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Spawns the single-writer scorer loop.
///
/// Commands run one at a time: the machine computes the next state, then
/// every emitted fact goes through `facade` in order before the caller is
/// answered.
pub fn spawn_scorer(
    machine: ScoringMachine,
    facade: PersistenceFacade,
    config: RuntimeConfig,
) -> ScorerHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<ScoreEvent>(config.event_capacity.max(1));

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut machine = machine;
        while let Some(cmd) = cmd_rx.recv().await {
            let done = handle_command(cmd, &mut machine, &facade, &events_tx_loop).await;
            if done {
                break;
            }
        }
    });

    ScorerHandle { cmd_tx, events_tx }
}

impl ScorerHandle {
    /// Subscribes to scorer events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScoreEvent> {
        self.events_tx.subscribe()
    }

    /// Starts the match. See [`ScoringMachine::start_match`].
    pub async fn start_match(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::StartMatch { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Seats the opening pair.
    pub async fn select_openers(&self, striker: PlayerId, non_striker: PlayerId) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SelectOpeners {
                striker,
                non_striker,
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Selects the bowler for the coming over.
    pub async fn select_bowler(&self, player: PlayerId) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SelectBowler { player, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Fills the slot vacated by the last wicket.
    pub async fn select_new_batsman(&self, player: PlayerId) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SelectNewBatsman { player, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Records one delivery and waits until its facts are persisted or queued.
    pub async fn record_ball(&self, delivery: Delivery) -> Result<DeliveryOutcome, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::RecordBall { delivery, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Removes the last ball. Refused while offline.
    pub async fn undo_last_ball(&self) -> Result<BallRecord, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::UndoLastBall { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Serializable image of the live match.
    pub async fn snapshot(&self) -> Result<ScoringSnapshotV1, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Snapshot { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Stops the scorer loop after the commands ahead of it.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

async fn handle_command(
    cmd: Command,
    machine: &mut ScoringMachine,
    facade: &PersistenceFacade,
    events_tx: &broadcast::Sender<ScoreEvent>,
) -> bool {
    match cmd {
        Command::StartMatch { resp } => {
            let res = match machine.start_match().map(|innings| innings.batting_team) {
                Ok(batting_team) => {
                    let persisted = flush_facts(machine, facade, events_tx).await;
                    let _ = events_tx.send(ScoreEvent::MatchStarted { batting_team });
                    persisted
                }
                Err(err) => Err(err.into()),
            };
            let _ = resp.send(res);
        }
        Command::SelectOpeners {
            striker,
            non_striker,
            resp,
        } => {
            let res = match machine.select_openers(striker, non_striker) {
                Ok(()) => flush_facts(machine, facade, events_tx).await,
                Err(err) => Err(err.into()),
            };
            let _ = resp.send(res);
        }
        Command::SelectBowler { player, resp } => {
            let res = match machine.select_bowler(player) {
                Ok(()) => flush_facts(machine, facade, events_tx).await,
                Err(err) => Err(err.into()),
            };
            let _ = resp.send(res);
        }
        Command::SelectNewBatsman { player, resp } => {
            let res = match machine.select_new_batsman(player) {
                Ok(()) => flush_facts(machine, facade, events_tx).await,
                Err(err) => Err(err.into()),
            };
            let _ = resp.send(res);
        }
        Command::RecordBall { delivery, resp } => {
            let res = match machine.record_ball(delivery) {
                Ok(outcome) => {
                    let persisted = flush_facts(machine, facade, events_tx).await;
                    publish_outcome(&outcome, events_tx);
                    persisted.map(|()| outcome)
                }
                Err(err) => Err(err.into()),
            };
            let _ = resp.send(res);
        }
        Command::UndoLastBall { resp } => {
            let res = if !facade.can_delete() {
                Err(RuntimeError::Facade(FacadeError::OfflineDelete))
            } else {
                match machine.undo_last_ball() {
                    Ok(ball) => {
                        let persisted = flush_facts(machine, facade, events_tx).await;
                        let _ = events_tx.send(ScoreEvent::BallUndone { id: ball.id.clone() });
                        persisted.map(|()| ball)
                    }
                    Err(err) => Err(err.into()),
                }
            };
            let _ = resp.send(res);
        }
        Command::Snapshot { resp } => {
            let _ = resp.send(machine.export_snapshot());
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(());
            return true;
        }
    }

    false
}

/// Persists every pending fact in emission order.
///
/// Keeps going past a failed local append so later facts still get their
/// chance; the first error is returned.
async fn flush_facts(
    machine: &mut ScoringMachine,
    facade: &PersistenceFacade,
    events_tx: &broadcast::Sender<ScoreEvent>,
) -> Result<(), RuntimeError> {
    let mut first_err = None;
    for fact in machine.drain_pending_facts() {
        match facade.persist(&fact).await {
            Ok(persisted) => {
                let _ = events_tx.send(ScoreEvent::Persisted {
                    record_id: fact.record_id(),
                    queued: matches!(persisted, Persisted::Queued(_)),
                });
            }
            Err(err) => {
                error!(record_id = %fact.record_id(), error = %err, "fact not persisted");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
    }
    match first_err {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn publish_outcome(outcome: &DeliveryOutcome, events_tx: &broadcast::Sender<ScoreEvent>) {
    let ball = &outcome.ball;
    let _ = events_tx.send(ScoreEvent::BallRecorded {
        id: ball.id.clone(),
        innings: ball.innings,
        over_number: ball.over_number,
        ball_number: ball.ball_number,
    });
    if let Some(player) = outcome.wicket {
        let _ = events_tx.send(ScoreEvent::WicketFell { player });
    }
    if outcome.over_completed {
        let _ = events_tx.send(ScoreEvent::OverCompleted {
            innings: ball.innings,
            overs: ball.over_number + 1,
        });
    }
    if outcome.powerplay_ended {
        let _ = events_tx.send(ScoreEvent::PowerplayEnded { innings: ball.innings });
    }
    if let Some(reason) = outcome.innings_ended {
        let _ = events_tx.send(ScoreEvent::InningsEnded {
            innings: ball.innings,
            reason,
        });
    }
    if let Some(result) = &outcome.match_result {
        let _ = events_tx.send(ScoreEvent::MatchCompleted {
            result: result.clone(),
        });
    }
}
