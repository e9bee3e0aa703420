//! Benchmarks for rate graph updates and snapshots
//!
//! Target: <200ns per applied quote

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use forex_arb::core::{Currency, Quote, Timestamp};
use forex_arb::hot_path::RateGraph;
use std::time::Duration;

/// `n` synthetic currency codes: AAA, AAB, ...
fn currencies(n: usize) -> Vec<Currency> {
    (0..n)
        .filter_map(|i| {
            let code = [b'A' + (i / 676) as u8, b'A' + (i / 26 % 26) as u8, b'A' + (i % 26) as u8];
            Currency::from_bytes(&code)
        })
        .collect()
}

/// Every ordered pair quoted once with consistent rates
fn dense_graph(n: usize, micros: u64) -> RateGraph {
    let codes = currencies(n);
    let mut graph = RateGraph::new();
    for (i, &base) in codes.iter().enumerate() {
        for (j, &quote) in codes.iter().enumerate().skip(i + 1) {
            let rate = (j as f64 + 1.0) / (i as f64 + 1.0);
            graph.apply_quote(&Quote::new(Timestamp::from_micros(micros), base, quote, rate));
        }
    }
    graph
}

fn bench_apply(c: &mut Criterion) {
    let mut graph = dense_graph(16, 1);
    let codes = currencies(2);
    let mut micros = 2;

    let mut group = c.benchmark_group("rate_graph_apply");
    group.bench_function("newer_quote", |b| {
        b.iter(|| {
            micros += 1;
            let quote = Quote::new(Timestamp::from_micros(micros), codes[0], codes[1], 2.0);
            black_box(graph.apply_quote(black_box(&quote)))
        })
    });

    let stale = Quote::new(Timestamp::from_micros(1), codes[0], codes[1], 2.0);
    group.bench_function("stale_quote", |b| {
        b.iter(|| black_box(graph.apply_quote(black_box(&stale))))
    });
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_graph_snapshot");
    for n in [8, 32] {
        let graph = dense_graph(n, 1_000_000);
        group.bench_function(format!("dense_{n}"), |b| {
            b.iter_batched(
                || Timestamp::from_micros(1_000_000),
                |as_of| black_box(graph.snapshot(as_of, Duration::from_millis(1500))),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_apply, bench_snapshot);
criterion_main!(benches);
