//! Online/offline signal and the task that turns reconnects and queued writes into drains.

use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use super::engine::{DrainOutcome, SyncEngine};

/// Connectivity fact supplied by the host. Never checks the network itself.
#[derive(Debug, Clone)]
pub struct ReachabilityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ReachabilityMonitor {
    /// Starts with the host-reported state.
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    /// Records the host's connectivity; returns true on a transition.
    pub fn set_online(&self, online: bool) -> bool {
        self.tx.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        })
    }

    /// Last recorded connectivity.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Watch channel carrying connectivity.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Watches connectivity and queue depth for `engine`.
///
/// Every offline-to-online transition requests a drain, and so does every
/// enqueue that lands while online, so a write that fell back to the queue
/// is retried without waiting for a reconnect. A backlog found at start is
/// drained when online. The engine's single-flight lock absorbs a request
/// that overlaps a running drain.
pub fn spawn_monitor(monitor: &ReachabilityMonitor, engine: Arc<SyncEngine>) -> JoinHandle<()> {
    let mut online_rx = monitor.subscribe();
    let mut count_rx = engine.queue().subscribe_count();

    tokio::spawn(async move {
        let mut was_online = *online_rx.borrow_and_update();
        let mut last_count = *count_rx.borrow_and_update();
        engine.refresh_status();
        if was_online && last_count > 0 {
            drain_until_settled(&engine).await;
            last_count = engine.queue().pending();
        }

        loop {
            tokio::select! {
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *online_rx.borrow_and_update();
                    engine.refresh_status();
                    if online && !was_online {
                        info!("connectivity restored, draining queue");
                        drain_until_settled(&engine).await;
                        last_count = engine.queue().pending();
                    }
                    was_online = online;
                }
                changed = count_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let count = *count_rx.borrow_and_update();
                    engine.refresh_status();
                    let grew = count > last_count;
                    last_count = count;
                    if grew && *online_rx.borrow() {
                        debug!(pending = count, "queued while online, draining");
                        drain_until_settled(&engine).await;
                        last_count = engine.queue().pending();
                    }
                }
            }
        }
    })
}

/// Drains until the queue is empty or a drain stops early.
///
/// Operations enqueued while a drain runs are not in its snapshot, so a clean
/// drain that leaves work behind is followed by another.
async fn drain_until_settled(engine: &SyncEngine) {
    loop {
        match engine.drain().await {
            Ok(DrainOutcome::Completed(report))
                if report.deferred.is_none()
                    && !report.interrupted
                    && engine.queue().pending() > 0 => {}
            Ok(_) => break,
            Err(err) => {
                warn!(error = %err, "queue drain failed");
                break;
            }
        }
    }
}
