//! Benchmarks for snapshot history append and window queries.

use chrono::{Duration as ChronoDuration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pulse::telemetry::{MetricKind, Snapshot, SnapshotStore};
use serde_json::json;
use std::time::Duration;

fn filled_store(len: usize) -> SnapshotStore {
    let store = SnapshotStore::new(Duration::from_secs(24 * 3600), len);
    let start = Utc::now() - ChronoDuration::seconds(len as i64 * 10);
    for i in 0..len {
        store.append(Snapshot::at(
            MetricKind::HostMetrics,
            json!({ "cpu": i % 100, "memory": 0.5 }),
            start + ChronoDuration::seconds(i as i64 * 10),
        ));
    }
    store
}

fn bench_append_at_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_append");
    for len in [100, 720, 8640] {
        let store = filled_store(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &store, |b, store| {
            b.iter(|| {
                store.append(Snapshot::new(
                    MetricKind::HostMetrics,
                    black_box(json!({ "cpu": 50 })),
                ))
            });
        });
    }
    group.finish();
}

fn bench_window_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_query");
    let store = filled_store(8640);
    for window in [60, 3600, 24 * 3600] {
        group.bench_with_input(BenchmarkId::from_parameter(window), &window, |b, &window| {
            b.iter(|| store.query(MetricKind::HostMetrics, Duration::from_secs(black_box(window))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_append_at_capacity, bench_window_query);
criterion_main!(benches);
