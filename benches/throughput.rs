use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;

use cricklog::{
    ball::{Delivery, MatchRecord, TeamRef, Toss},
    config::MatchRules,
    core::{scoring::ScoringMachine, summary::fold_innings},
    op::{RemoteWrite, TABLE_BALLS, WriteKind},
    persist::{QueueStore, memory::MemoryQueue, sqlite::SqliteQueue},
    types::TossDecision,
};

fn record() -> MatchRecord {
    MatchRecord::new(
        1,
        TeamRef {
            id: 10,
            name: "Lions".to_string(),
        },
        TeamRef {
            id: 20,
            name: "Tigers".to_string(),
        },
        Toss {
            winner: 10,
            decision: TossDecision::Bat,
        },
    )
}

/// Scores a full 20-over first innings of singles and dots.
fn score_innings() -> ScoringMachine {
    let mut machine = ScoringMachine::new(record(), MatchRules::default()).expect("machine");
    machine.start_match().expect("start");
    machine.select_openers(101, 102).expect("openers");
    for over in 0..20u64 {
        machine.select_bowler(208 + over % 2).expect("bowler");
        for ball in 0..6u8 {
            machine.record_ball(Delivery::runs(ball % 2)).expect("ball");
        }
        machine.drain_pending_facts();
    }
    machine
}

fn bench_score_innings(c: &mut Criterion) {
    c.bench_function("score_innings_120_balls", |b| {
        b.iter(score_innings);
    });
}

fn bench_fold(c: &mut Criterion) {
    let machine = score_innings();
    c.bench_function("fold_innings", |b| {
        b.iter(|| fold_innings(machine.innings_balls(1)));
    });
}

fn write(i: u64) -> RemoteWrite {
    let id = format!("1-1-{i}");
    RemoteWrite {
        kind: WriteKind::Insert,
        table: TABLE_BALLS.to_string(),
        payload: json!({ "id": id, "runs_off_bat": i % 7 }),
        record_id: id,
    }
}

fn bench_queue_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_enqueue");
    for n in [100u64, 1000u64] {
        group.bench_with_input(BenchmarkId::new("memory", n), &n, |b, &n| {
            b.iter(|| {
                let mut queue = MemoryQueue::new();
                for i in 0..n {
                    queue.enqueue(&write(i), i).expect("enqueue");
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("sqlite_in_memory", n), &n, |b, &n| {
            b.iter(|| {
                let mut queue = SqliteQueue::open_in_memory().expect("open");
                for i in 0..n {
                    queue.enqueue(&write(i), i).expect("enqueue");
                }
                queue.dequeue_all().expect("dequeue")
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_score_innings, bench_fold, bench_queue_enqueue);
criterion_main!(benches);
