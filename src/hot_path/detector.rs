//! Negative-cycle detection (Bellman-Ford)
//!
//! Pure function of a [`GraphSnapshot`]. A synthetic source with a zero-weight
//! edge to every vertex makes every vertex reachable, so one run covers
//! disconnected components.
//!
//! Determinism: edges are relaxed in ascending (from, to) currency order every
//! round and the post-convergence scan uses the same order. The first edge in
//! that order that still relaxes and leads to a valid cycle wins.

use crate::core::Currency;
use crate::hot_path::rate_graph::{GraphSnapshot, SnapshotEdge};

/// Default minimum improvement for a relaxation to count
pub const DEFAULT_TOLERANCE: f64 = 1e-12;

/// One conversion step of a cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub from: Currency,
    pub to: Currency,
    pub rate: f64,
}

/// Profitable conversion cycle
///
/// `currencies` lists each currency once; the cycle closes back to the first.
/// It starts at the smallest currency code and runs in exchange order.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageCycle {
    pub currencies: Vec<Currency>,
    pub legs: Vec<Leg>,
    /// Sum of edge weights, negative for a profitable cycle
    pub total_weight: f64,
    /// Product of leg rates, `exp(-total_weight)`
    pub gain: f64,
}

impl ArbitrageCycle {
    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }

    /// `USD -> EUR -> GBP -> USD`
    pub fn path_string(&self) -> String {
        let mut parts: Vec<&str> = self.currencies.iter().map(Currency::as_str).collect();
        if let Some(first) = self.currencies.first() {
            parts.push(first.as_str());
        }
        parts.join(" -> ")
    }
}

/// Detector verdict for one snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    NoArbitrage,
    Arbitrage(ArbitrageCycle),
}

impl Detection {
    pub fn cycle(&self) -> Option<&ArbitrageCycle> {
        match self {
            Detection::NoArbitrage => None,
            Detection::Arbitrage(cycle) => Some(cycle),
        }
    }

    pub fn is_arbitrage(&self) -> bool {
        matches!(self, Detection::Arbitrage(_))
    }
}

/// Bellman-Ford negative-cycle detector
#[derive(Debug, Clone, Copy)]
pub struct CycleDetector {
    tolerance: f64,
}

impl CycleDetector {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Run detection on a snapshot
    pub fn detect(&self, snapshot: &GraphSnapshot) -> Detection {
        let n = snapshot.vertices().len();
        let edges = snapshot.edges();
        if n < 3 || edges.is_empty() {
            return Detection::NoArbitrage;
        }

        // Index n is the synthetic source.
        let source = n;
        let mut distance = vec![f64::INFINITY; n + 1];
        distance[source] = 0.0;
        // Index into `edges` of the edge that last improved each vertex.
        // `None` means the vertex hangs off the source (or is unreached).
        let mut via: Vec<Option<usize>> = vec![None; n];

        // |V| + 1 vertices including the source: |V| rounds.
        for _ in 0..n {
            let mut changed = false;

            for v in 0..n {
                if distance[source] < distance[v] - self.tolerance {
                    distance[v] = distance[source];
                    via[v] = None;
                    changed = true;
                }
            }
            for (i, edge) in edges.iter().enumerate() {
                if self.relaxes(&distance, edge) {
                    distance[edge.to] = distance[edge.from] + edge.weight;
                    via[edge.to] = Some(i);
                    changed = true;
                }
            }

            if !changed {
                return Detection::NoArbitrage;
            }
        }

        for (i, edge) in edges.iter().enumerate() {
            if !self.relaxes(&distance, edge) {
                continue;
            }
            via[edge.to] = Some(i);
            if let Some(cycle) = self.extract_cycle(snapshot, &via, edge.to) {
                return Detection::Arbitrage(cycle);
            }
        }

        Detection::NoArbitrage
    }

    #[inline(always)]
    fn relaxes(&self, distance: &[f64], edge: &SnapshotEdge) -> bool {
        let candidate = distance[edge.from] + edge.weight;
        candidate.is_finite() && candidate < distance[edge.to] - self.tolerance
    }

    /// Walk `via` back from `start` until a vertex repeats, then validate the
    /// loop between the two occurrences.
    fn extract_cycle(
        &self,
        snapshot: &GraphSnapshot,
        via: &[Option<usize>],
        start: usize,
    ) -> Option<ArbitrageCycle> {
        let edges = snapshot.edges();
        let n = via.len();

        // position[v] = index of v within `walk`
        let mut position: Vec<Option<usize>> = vec![None; n];
        // Edge indices, each one entering the previous walk vertex.
        let mut walk_edges: Vec<usize> = Vec::new();
        let mut vertex = start;
        let mut steps = 0;

        let loop_start = loop {
            if let Some(pos) = position[vertex] {
                break pos;
            }
            position[vertex] = Some(steps);
            let edge_idx = via[vertex]?;
            walk_edges.push(edge_idx);
            vertex = edges[edge_idx].from;
            steps += 1;
        };

        // Edges walked from the repeat onward, reversed into exchange order.
        let mut cycle_edges: Vec<usize> = walk_edges[loop_start..].to_vec();
        cycle_edges.reverse();
        if cycle_edges.len() < 3 {
            return None;
        }

        let total_weight: f64 = cycle_edges.iter().map(|&i| edges[i].weight).sum();
        if total_weight >= -self.tolerance {
            return None;
        }

        // Rotate so the smallest currency (lowest vertex index) leads.
        let lead = cycle_edges
            .iter()
            .enumerate()
            .min_by_key(|&(_, &i)| edges[i].from)
            .map(|(pos, _)| pos)?;
        cycle_edges.rotate_left(lead);

        let mut currencies = Vec::with_capacity(cycle_edges.len());
        let mut legs = Vec::with_capacity(cycle_edges.len());
        for &i in &cycle_edges {
            let edge = &edges[i];
            let from = snapshot.vertex(edge.from)?;
            let to = snapshot.vertex(edge.to)?;
            if currencies.contains(&from) {
                return None;
            }
            currencies.push(from);
            legs.push(Leg {
                from,
                to,
                rate: edge.rate,
            });
        }

        Some(ArbitrageCycle {
            currencies,
            legs,
            total_weight,
            gain: (-total_weight).exp(),
        })
    }
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}
