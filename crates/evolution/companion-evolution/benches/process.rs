//! Performance benchmarks

use chrono::{Duration, TimeZone, Utc};
use companion_evolution::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

const EVENT_TYPES: [&str; 6] = ["feed", "play", "chat", "teach", "pet", "ignore"];

fn engine() -> EvolutionEngine {
    EvolutionEngine::with_rng_seed(
        Arc::new(EvolutionConfig::default()),
        &SeedStrategy::archetype("balanced"),
        7,
    )
    .expect("default configuration is valid")
}

fn events(count: usize) -> Vec<InteractionEvent> {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            InteractionEvent::new(
                if i % 3 == 0 { "bob" } else { "alice" },
                EVENT_TYPES[i % EVENT_TYPES.len()],
                1.0,
                start + Duration::minutes(i as i64 * 17),
            )
        })
        .collect()
}

fn benchmark_process(c: &mut Criterion) {
    let batch = events(256);

    c.bench_function("process_single_event", |b| {
        let mut engine = engine();
        let mut i = 0;
        b.iter(|| {
            i += 1;
            engine.process(black_box(&batch[i % batch.len()]))
        })
    });
}

fn benchmark_warm_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_with_memory");

    for size in [10, 100, 200].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut engine = engine();
            for event in events(size) {
                engine.process(&event);
            }
            let next = InteractionEvent::new("alice", "play", 1.0, Utc::now());

            b.iter(|| engine.process(black_box(&next)))
        });
    }

    group.finish();
}

fn benchmark_snapshot(c: &mut Criterion) {
    let mut engine = engine();
    for event in events(200) {
        engine.process(&event);
    }
    let config = engine.config().clone();

    c.bench_function("serialize_snapshot", |b| b.iter(|| engine.serialize()));

    let json = engine.serialize().expect("snapshot serializes");
    c.bench_function("deserialize_snapshot", |b| {
        b.iter(|| EvolutionEngine::deserialize(black_box(&json), config.clone()))
    });
}

criterion_group!(
    benches,
    benchmark_process,
    benchmark_warm_memory,
    benchmark_snapshot
);
criterion_main!(benches);
