//! Benchmarks for Bellman-Ford cycle detection
//!
//! Dense graphs are the worst case: every pair quoted, |E| = n(n-1).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use forex_arb::core::{Currency, Quote, Timestamp};
use forex_arb::hot_path::{CycleDetector, GraphSnapshot, RateGraph};
use std::time::Duration;

fn currencies(n: usize) -> Vec<Currency> {
    (0..n)
        .filter_map(|i| {
            let code = [b'A' + (i / 676) as u8, b'A' + (i / 26 % 26) as u8, b'A' + (i % 26) as u8];
            Currency::from_bytes(&code)
        })
        .collect()
}

/// Dense snapshot, with one mispriced pair when `arbitrage` is set
fn dense_snapshot(n: usize, arbitrage: bool) -> GraphSnapshot {
    let codes = currencies(n);
    let ts = Timestamp::from_micros(1_000_000);
    let mut graph = RateGraph::new();
    for (i, &base) in codes.iter().enumerate() {
        for (j, &quote) in codes.iter().enumerate().skip(i + 1) {
            let mut rate = (j as f64 + 1.0) / (i as f64 + 1.0);
            if arbitrage && i == n / 2 && j == n - 1 {
                rate *= 1.01;
            }
            graph.apply_quote(&Quote::new(ts, base, quote, rate));
        }
    }
    graph.snapshot(ts, Duration::from_secs(1))
}

fn bench_detect(c: &mut Criterion) {
    let detector = CycleDetector::default();

    let mut group = c.benchmark_group("detector");
    for n in [8, 16, 32] {
        let consistent = dense_snapshot(n, false);
        let mispriced = dense_snapshot(n, true);

        group.bench_function(format!("no_arbitrage_{n}"), |b| {
            b.iter(|| black_box(detector.detect(black_box(&consistent))))
        });
        group.bench_function(format!("arbitrage_{n}"), |b| {
            b.iter(|| black_box(detector.detect(black_box(&mispriced))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_detect);
criterion_main!(benches);
