mod common;

use std::{sync::Arc, time::Duration};

use serde_json::json;

use cricklog::{
    config::SyncConfig,
    op::{RemoteWrite, TABLE_BALLS, WriteKind},
    persist::{OperationQueue, memory::MemoryQueue},
    sync::{DrainOutcome, DrainReport, ReachabilityMonitor, SyncEngine, spawn_monitor},
};

use common::ScriptedRemote;

fn insert(id: &str) -> RemoteWrite {
    RemoteWrite {
        kind: WriteKind::Insert,
        table: TABLE_BALLS.to_string(),
        record_id: id.to_string(),
        payload: json!({ "id": id }),
    }
}

struct Rig {
    remote: Arc<ScriptedRemote>,
    monitor: ReachabilityMonitor,
    queue: OperationQueue,
    engine: Arc<SyncEngine>,
}

fn rig(online: bool, config: SyncConfig) -> Rig {
    let remote = ScriptedRemote::new();
    let monitor = ReachabilityMonitor::new(online);
    let queue = OperationQueue::new(Box::new(MemoryQueue::new())).expect("queue");
    let engine = Arc::new(SyncEngine::new(
        queue.clone(),
        remote.clone(),
        monitor.subscribe(),
        config,
    ));
    Rig {
        remote,
        monitor,
        queue,
        engine,
    }
}

async fn enqueue_all(queue: &OperationQueue, ids: &[&str]) -> Vec<u64> {
    let mut out = Vec::new();
    for id in ids {
        out.push(queue.enqueue(insert(id)).await.expect("enqueue").id);
    }
    out
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

fn completed(outcome: DrainOutcome) -> DrainReport {
    match outcome {
        DrainOutcome::Completed(report) => report,
        other => panic!("expected a completed drain, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_head_defers_everything_behind_it() {
    let rig = rig(true, SyncConfig::default());
    let ids = enqueue_all(&rig.queue, &["A", "B", "C"]).await;
    rig.remote.fail_times("A", 1);

    let first = completed(rig.engine.drain().await.expect("drain"));
    assert_eq!(first.synced, 0);
    assert_eq!(first.deferred, Some(ids[0]));
    assert!(rig.remote.applied_ids().is_empty());
    assert_eq!(rig.queue.pending(), 3);
    assert_eq!(rig.queue.dequeue_all().await.expect("dequeue")[0].retry_count, 1);

    let second = completed(rig.engine.drain().await.expect("drain"));
    assert_eq!(second.synced, 3);
    assert_eq!(rig.remote.applied_ids(), ["A", "B", "C"]);
    assert_eq!(rig.queue.pending(), 0);
}

#[tokio::test]
async fn first_and_last_failing_once_still_land_in_order() {
    let rig = rig(true, SyncConfig::default());
    enqueue_all(&rig.queue, &["A", "B", "C"]).await;
    rig.remote.fail_times("A", 1);
    rig.remote.fail_times("C", 1);

    let mut drains = 0;
    while rig.queue.pending() > 0 {
        completed(rig.engine.drain().await.expect("drain"));
        drains += 1;
        assert!(drains <= 3, "queue did not empty");
    }
    assert_eq!(drains, 3);
    assert_eq!(rig.remote.applied_ids(), ["A", "B", "C"]);
    assert_eq!(rig.engine.status().failed_total, 0);
}

#[tokio::test]
async fn exhausted_op_is_dropped_and_never_retried() {
    let rig = rig(true, SyncConfig::default());
    enqueue_all(&rig.queue, &["A", "B"]).await;
    rig.remote.fail_times("A", u32::MAX);

    for _ in 0..2 {
        let report = completed(rig.engine.drain().await.expect("drain"));
        assert_eq!(report.synced, 0);
        assert_eq!(report.dropped, 0);
    }
    let third = completed(rig.engine.drain().await.expect("drain"));
    assert_eq!(third.dropped, 1);
    assert_eq!(third.synced, 1);
    assert_eq!(third.deferred, None);
    assert_eq!(rig.remote.attempts("A"), 3);
    assert_eq!(rig.remote.applied_ids(), ["B"]);

    completed(rig.engine.drain().await.expect("drain"));
    assert_eq!(rig.remote.attempts("A"), 3);

    let status = rig.engine.status();
    assert_eq!(status.failed_total, 1);
    assert_eq!(status.synced_total, 1);
    assert_eq!(status.pending_count, 0);
}

#[tokio::test]
async fn drain_respects_configured_attempts() {
    let rig = rig(
        true,
        SyncConfig {
            max_attempts: 1,
            ..SyncConfig::default()
        },
    );
    enqueue_all(&rig.queue, &["A", "B"]).await;
    rig.remote.fail_times("A", 1);

    let report = completed(rig.engine.drain().await.expect("drain"));
    assert_eq!((report.dropped, report.synced), (1, 1));
    assert_eq!(rig.remote.applied_ids(), ["B"]);
}

#[tokio::test]
async fn overlapping_drain_request_is_a_no_op() {
    let rig = rig(true, SyncConfig::default());
    enqueue_all(&rig.queue, &["A"]).await;
    let gate = rig.remote.install_gate();

    let engine = Arc::clone(&rig.engine);
    let running = tokio::spawn(async move { engine.drain().await });
    let remote = Arc::clone(&rig.remote);
    wait_until(move || remote.started() == 1).await;

    assert!(rig.engine.status().is_syncing);
    assert_eq!(
        rig.engine.drain().await.expect("drain"),
        DrainOutcome::AlreadyRunning
    );

    gate.add_permits(8);
    let report = completed(running.await.expect("join").expect("drain"));
    assert_eq!(report.synced, 1);
    assert_eq!(rig.remote.started(), 1);
    assert!(!rig.engine.status().is_syncing);
}

#[tokio::test]
async fn offline_drain_touches_nothing() {
    let rig = rig(false, SyncConfig::default());
    enqueue_all(&rig.queue, &["A"]).await;

    assert_eq!(rig.engine.drain().await.expect("drain"), DrainOutcome::Offline);
    assert_eq!(rig.remote.started(), 0);
    assert_eq!(rig.queue.pending(), 1);
    assert_eq!(rig.engine.status().last_sync_ms, None);
}

#[tokio::test]
async fn inserts_replay_as_upserts_when_configured() {
    let rig = rig(
        true,
        SyncConfig {
            upsert_on_replay: true,
            ..SyncConfig::default()
        },
    );
    enqueue_all(&rig.queue, &["A"]).await;
    completed(rig.engine.drain().await.expect("drain"));

    let applied = rig.remote.applied();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].kind, WriteKind::Upsert);
    assert_eq!(applied[0].record_id, "A");
}

#[tokio::test]
async fn reconnect_triggers_one_drain() {
    let rig = rig(false, SyncConfig::default());
    let _task = spawn_monitor(&rig.monitor, Arc::clone(&rig.engine));
    enqueue_all(&rig.queue, &["A", "B", "C"]).await;

    let engine = Arc::clone(&rig.engine);
    wait_until(move || engine.status().pending_count == 3).await;
    let status = rig.engine.status();
    assert!(!status.is_online);
    assert_eq!(rig.remote.started(), 0);

    assert!(rig.monitor.set_online(true));
    assert!(!rig.monitor.set_online(true));

    let engine = Arc::clone(&rig.engine);
    wait_until(move || engine.status().last_sync_ms.is_some()).await;
    assert_eq!(rig.remote.applied_ids(), ["A", "B", "C"]);

    let status = rig.engine.status();
    assert!(status.is_online);
    assert_eq!(status.pending_count, 0);
    assert_eq!(status.synced_total, 3);
    assert!(!status.is_syncing);
}

#[tokio::test]
async fn enqueue_while_online_is_drained_by_the_monitor() {
    let rig = rig(true, SyncConfig::default());
    let _task = spawn_monitor(&rig.monitor, Arc::clone(&rig.engine));
    rig.remote.fail_times("A", 1);

    enqueue_all(&rig.queue, &["A"]).await;
    let remote = Arc::clone(&rig.remote);
    wait_until(move || remote.attempts("A") == 1).await;
    assert!(rig.remote.applied_ids().is_empty());

    // The next enqueue retries the head before anything behind it.
    enqueue_all(&rig.queue, &["B"]).await;
    let queue = rig.queue.clone();
    wait_until(move || queue.pending() == 0).await;
    assert_eq!(rig.remote.applied_ids(), ["A", "B"]);
    assert_eq!(rig.engine.status().failed_total, 0);
}

#[tokio::test]
async fn going_offline_mid_drain_stops_replay() {
    let rig = rig(true, SyncConfig::default());
    enqueue_all(&rig.queue, &["A", "B"]).await;
    let gate = rig.remote.install_gate();

    let engine = Arc::clone(&rig.engine);
    let running = tokio::spawn(async move { engine.drain().await });
    let remote = Arc::clone(&rig.remote);
    wait_until(move || remote.started() == 1).await;

    rig.monitor.set_online(false);
    gate.add_permits(8);
    let report = completed(running.await.expect("join").expect("drain"));
    assert_eq!(report.synced, 1);
    assert!(report.interrupted);
    assert_eq!(rig.remote.applied_ids(), ["A"]);
    assert_eq!(rig.queue.pending(), 1);
}
