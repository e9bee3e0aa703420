//! Rate graph (Warm Path)
//!
//! Directed graph over currencies. Edge weight is `-ln(rate)`, so a cycle
//! whose rates multiply to more than 1 has negative total weight.
//!
//! Each accepted quote writes the forward edge and its reciprocal under one
//! `&mut self` call. Edges are never deleted: staleness is applied when a
//! snapshot is taken, so a late but newer update can still land.

use crate::core::{Currency, Quote, Timestamp};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

/// Graph handle shared between the receive loop and readers
pub type SharedRateGraph = Arc<RwLock<RateGraph>>;

/// Stored edge for one ordered pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// `-ln(rate)`
    pub weight: f64,
    pub rate: f64,
    /// Timestamp of the quote that produced this edge
    pub updated: Timestamp,
}

/// Result of applying one quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Forward and reciprocal edges replaced
    Applied,
    /// Timestamp not newer than the stored edge; discarded
    Stale { stored: Timestamp },
    /// Rate not finite or not positive; discarded
    InvalidRate,
    /// Base and quote currency are the same; discarded
    SelfQuote,
}

impl ApplyOutcome {
    #[inline(always)]
    pub const fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

/// Canonical edge map keyed by ordered currency pair
#[derive(Debug, Clone, Default)]
pub struct RateGraph {
    edges: BTreeMap<(Currency, Currency), Edge>,
    latest: Option<Timestamp>,
}

impl RateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a graph for sharing across tasks
    pub fn into_shared(self) -> SharedRateGraph {
        Arc::new(RwLock::new(self))
    }

    /// Apply a quote with replace-if-newer semantics
    ///
    /// A quote for (base, quote) at rate r sets `base -> quote` to `-ln(r)` and
    /// `quote -> base` to `ln(r)`, both stamped with the quote's timestamp.
    pub fn apply_quote(&mut self, quote: &Quote) -> ApplyOutcome {
        if quote.base == quote.quote {
            return ApplyOutcome::SelfQuote;
        }
        if !quote.has_valid_rate() {
            return ApplyOutcome::InvalidRate;
        }

        // Forward and reciprocal always share a timestamp, checking one suffices.
        if let Some(existing) = self.edges.get(&quote.pair()) {
            if quote.timestamp <= existing.updated {
                return ApplyOutcome::Stale {
                    stored: existing.updated,
                };
            }
        }

        let weight = -quote.rate.ln();
        self.edges.insert(
            (quote.base, quote.quote),
            Edge {
                weight,
                rate: quote.rate,
                updated: quote.timestamp,
            },
        );
        self.edges.insert(
            (quote.quote, quote.base),
            Edge {
                weight: -weight,
                rate: quote.rate.recip(),
                updated: quote.timestamp,
            },
        );

        self.latest = Some(match self.latest {
            Some(latest) => latest.max(quote.timestamp),
            None => quote.timestamp,
        });

        ApplyOutcome::Applied
    }

    /// Point-in-time view of the edges updated within `stale_after` of `as_of`
    ///
    /// Edges whose last update predates `as_of - stale_after` are left out.
    pub fn snapshot(&self, as_of: Timestamp, stale_after: Duration) -> GraphSnapshot {
        let cutoff = as_of.saturating_sub(stale_after);

        let live: Vec<(&(Currency, Currency), &Edge)> = self
            .edges
            .iter()
            .filter(|(_, edge)| edge.updated >= cutoff)
            .collect();

        let vertices: Vec<Currency> = live
            .iter()
            .flat_map(|((from, to), _)| [*from, *to])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        // BTreeMap order is lexicographic by (from, to); vertex indices follow
        // currency order, so the edge list stays sorted by (from, to) index.
        let edges = live
            .iter()
            .filter_map(|((from, to), edge)| {
                Some(SnapshotEdge {
                    from: vertices.binary_search(from).ok()?,
                    to: vertices.binary_search(to).ok()?,
                    weight: edge.weight,
                    rate: edge.rate,
                })
            })
            .collect();

        GraphSnapshot {
            as_of,
            vertices,
            edges,
            excluded: self.edges.len() - live.len(),
        }
    }

    #[inline]
    pub fn edge(&self, from: Currency, to: Currency) -> Option<&Edge> {
        self.edges.get(&(from, to))
    }

    /// Newest accepted quote timestamp
    #[inline]
    pub fn latest_timestamp(&self) -> Option<Timestamp> {
        self.latest
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.edges
            .keys()
            .flat_map(|(from, to)| [*from, *to])
            .collect::<BTreeSet<_>>()
            .len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Edge in a snapshot, endpoints are indices into [`GraphSnapshot::vertices`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotEdge {
    pub from: usize,
    pub to: usize,
    pub weight: f64,
    pub rate: f64,
}

/// Immutable graph view handed to the cycle detector
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSnapshot {
    as_of: Timestamp,
    vertices: Vec<Currency>,
    edges: Vec<SnapshotEdge>,
    excluded: usize,
}

impl GraphSnapshot {
    #[inline]
    pub fn as_of(&self) -> Timestamp {
        self.as_of
    }

    /// Vertices in ascending currency order
    #[inline]
    pub fn vertices(&self) -> &[Currency] {
        &self.vertices
    }

    /// Edges in ascending (from, to) order
    #[inline]
    pub fn edges(&self) -> &[SnapshotEdge] {
        &self.edges
    }

    #[inline]
    pub fn vertex(&self, index: usize) -> Option<Currency> {
        self.vertices.get(index).copied()
    }

    /// Stale edges left out of this snapshot
    #[inline]
    pub fn excluded(&self) -> usize {
        self.excluded
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Whether the snapshot holds an edge between the two currencies
    pub fn contains_edge(&self, from: Currency, to: Currency) -> bool {
        let (Ok(f), Ok(t)) = (
            self.vertices.binary_search(&from),
            self.vertices.binary_search(&to),
        ) else {
            return false;
        };
        self.edges.iter().any(|e| e.from == f && e.to == t)
    }
}
