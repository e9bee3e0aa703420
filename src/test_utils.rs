//! Test utilities for building quotes and graphs
//!
//! Currency codes are given as `&str` for brevity and must be valid.

use crate::core::{Currency, Quote, Timestamp};
use crate::hot_path::RateGraph;
use crate::wire::QuoteCodec;

/// Parse a currency code, panicking on malformed input
pub fn cur(code: &str) -> Currency {
    code.parse().unwrap()
}

/// Quote at `micros` since the epoch
pub fn q(micros: u64, base: &str, quote: &str, rate: f64) -> Quote {
    Quote::new(Timestamp::from_micros(micros), cur(base), cur(quote), rate)
}

/// Fresh graph with every quote applied in order
pub fn graph_from(quotes: &[Quote]) -> RateGraph {
    let mut graph = RateGraph::new();
    for quote in quotes {
        graph.apply_quote(quote);
    }
    graph
}

/// Compact-layout QUOTE datagram
pub fn quote_datagram(quotes: &[Quote]) -> Vec<u8> {
    QuoteCodec::default().encode(quotes).to_vec()
}

/// USD/EUR/GBP triangle with a product of 1.08, all stamped `micros`
pub fn triangle(micros: u64) -> [Quote; 3] {
    [
        q(micros, "USD", "EUR", 0.9),
        q(micros, "EUR", "GBP", 0.8),
        q(micros, "GBP", "USD", 1.5),
    ]
}
