//! Benchmarks for QUOTE datagram decoding
//!
//! Target: <1us for a full 50-record datagram

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use forex_arb::core::{Currency, Quote, Timestamp};
use forex_arb::wire::{QuoteCodec, RecordLayout, WireMessage, MAX_QUOTES_PER_MESSAGE};

const PAIRS: [(Currency, Currency, f64); 5] = [
    (Currency::USD, Currency::EUR, 0.9213),
    (Currency::EUR, Currency::GBP, 0.8571),
    (Currency::GBP, Currency::JPY, 188.42),
    (Currency::USD, Currency::CHF, 0.8842),
    (Currency::AUD, Currency::CAD, 0.9011),
];

fn make_quotes(count: usize) -> Vec<Quote> {
    (0..count)
        .map(|i| {
            let (base, quote, rate) = PAIRS[i % PAIRS.len()];
            Quote::new(Timestamp::from_micros(1_700_000_000_000_000 + i as u64), base, quote, rate)
        })
        .collect()
}

fn bench_decode(c: &mut Criterion) {
    let quotes = make_quotes(MAX_QUOTES_PER_MESSAGE);

    for layout in [RecordLayout::Compact, RecordLayout::Padded] {
        let codec = QuoteCodec::new(layout, MAX_QUOTES_PER_MESSAGE);
        let single = codec.encode(&quotes[..1]);
        let full = codec.encode(&quotes);

        let mut group = c.benchmark_group(format!("decode_{layout:?}").to_lowercase());

        group.throughput(Throughput::Bytes(single.len() as u64));
        group.bench_function("single_record", |b| {
            b.iter(|| {
                let result = codec.decode(black_box(&single));
                black_box(result)
            })
        });

        group.throughput(Throughput::Bytes(full.len() as u64));
        group.bench_function("full_datagram", |b| {
            b.iter(|| {
                let result = codec.decode(black_box(&full));
                black_box(result)
            })
        });

        group.finish();
    }
}

fn bench_classify(c: &mut Criterion) {
    let codec = QuoteCodec::default();
    let quotes = codec.encode(&make_quotes(10));
    let subscribe: [u8; 6] = [127, 0, 0, 1, 0xa6, 0x3b];
    let malformed = &quotes[..quotes.len() - 1];

    let mut group = c.benchmark_group("wire_message");
    group.bench_function("quotes", |b| {
        b.iter(|| black_box(WireMessage::decode(black_box(&quotes), &codec)))
    });
    group.bench_function("subscribe", |b| {
        b.iter(|| black_box(WireMessage::decode(black_box(&subscribe), &codec)))
    });
    group.bench_function("malformed", |b| {
        b.iter(|| black_box(WireMessage::decode(black_box(malformed), &codec)))
    });
    group.finish();
}

criterion_group!(benches, bench_decode, bench_classify);
criterion_main!(benches);
