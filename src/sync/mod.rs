//! Durability path from scoring facts to the remote store.
//!
//! ```text
//! ┌──────────────┐  online   ┌─────────────┐
//! │   Facade     │──────────►│ RemoteStore │
//! └──────────────┘           └─────────────┘
//!        │ offline / failure        ▲
//!        ▼                          │ replay, FIFO
//! ┌──────────────┐  drain    ┌─────────────┐
//! │ OperationQ.  │──────────►│ SyncEngine  │◄── ReachabilityMonitor
//! └──────────────┘           └─────────────┘
//! ```

pub mod engine;
pub mod facade;
pub mod reachability;

pub use engine::{DrainOutcome, DrainReport, SyncEngine, SyncError, SyncStatus};
pub use facade::{FacadeError, PersistenceFacade, Persisted};
pub use reachability::{ReachabilityMonitor, spawn_monitor};
