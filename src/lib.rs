//! Ball-by-ball cricket scoring with a durable offline write queue.
//!
//! # Examples
//!
//! In-memory usage with [`core::scoring::ScoringMachine`]:
//! ```
//! use cricklog::{
//!     ball::{Delivery, MatchRecord, TeamRef, Toss},
//!     config::MatchRules,
//!     core::scoring::ScoringMachine,
//!     types::TossDecision,
//! };
//!
//! let record = MatchRecord::new(
//!     1,
//!     TeamRef { id: 10, name: "Lions".to_string() },
//!     TeamRef { id: 20, name: "Tigers".to_string() },
//!     Toss { winner: 10, decision: TossDecision::Bat },
//! );
//! let mut machine = ScoringMachine::new(record, MatchRules::default()).expect("machine");
//! machine.start_match().expect("start");
//! machine.select_openers(101, 102).expect("openers");
//! machine.select_bowler(201).expect("bowler");
//!
//! let outcome = machine.record_ball(Delivery::runs(1)).expect("ball");
//! assert!(outcome.strike_rotated);
//! assert_eq!(machine.current_innings().map(|i| i.runs), Some(1));
//! ```
//!
//! Runtime usage with a SQLite-backed queue:
//! ```no_run
//! use std::sync::Arc;
//!
//! use cricklog::{
//!     ball::{Delivery, MatchRecord, TeamRef, Toss},
//!     config::CoreConfig,
//!     core::scoring::ScoringMachine,
//!     persist::{OperationQueue, sqlite::SqliteQueue},
//!     remote::RemoteStore,
//!     runtime::handle::spawn_scorer,
//!     sync::{PersistenceFacade, ReachabilityMonitor, SyncEngine, spawn_monitor},
//!     types::TossDecision,
//! };
//!
//! # async fn run(remote: Arc<dyn RemoteStore>) {
//! let cfg = CoreConfig::default();
//! let queue = OperationQueue::new(Box::new(SqliteQueue::open("queue.db").expect("open")))
//!     .expect("queue");
//! let monitor = ReachabilityMonitor::new(true);
//! let engine = Arc::new(SyncEngine::new(
//!     queue.clone(),
//!     Arc::clone(&remote),
//!     monitor.subscribe(),
//!     cfg.sync.clone(),
//! ));
//! let _monitor_task = spawn_monitor(&monitor, Arc::clone(&engine));
//!
//! let facade = PersistenceFacade::new(remote, queue, monitor.subscribe(), cfg.facade.clone());
//! let record = MatchRecord::new(
//!     1,
//!     TeamRef { id: 10, name: "Lions".to_string() },
//!     TeamRef { id: 20, name: "Tigers".to_string() },
//!     Toss { winner: 20, decision: TossDecision::Bowl },
//! );
//! let machine = ScoringMachine::new(record, cfg.rules.clone()).expect("machine");
//! let handle = spawn_scorer(machine, facade, cfg.runtime.clone());
//!
//! handle.start_match().await.expect("start");
//! handle.select_openers(101, 102).await.expect("openers");
//! handle.select_bowler(201).await.expect("bowler");
//! handle.record_ball(Delivery::runs(4)).await.expect("ball");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![warn(missing_docs)]

/// Match, innings, ball and player-line records.
pub mod ball;
/// Rule, sync and runtime configuration.
pub mod config;
/// Scoring state machine.
pub mod core;
/// Persistence facts and queued-operation model.
pub mod op;
/// Durable local queue and its storage backends.
pub mod persist;
/// Remote store abstraction.
pub mod remote;
/// Single-writer scorer runtime and events.
pub mod runtime;
/// Facade, sync engine and reachability monitor.
pub mod sync;
/// Shared primitive types and enums.
pub mod types;
