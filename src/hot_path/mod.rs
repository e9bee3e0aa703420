//! Hot path operations - per-datagram work
//!
//! This module contains the code run for every received datagram:
//! - Rate graph updates and snapshots
//! - Negative-cycle detection
//! - Report formatting for detected cycles

pub mod detector;
pub mod rate_graph;
pub mod report;

pub use detector::{ArbitrageCycle, CycleDetector, Detection, Leg, DEFAULT_TOLERANCE};
pub use rate_graph::{
    ApplyOutcome, Edge, GraphSnapshot, RateGraph, SharedRateGraph, SnapshotEdge,
};
pub use report::{ArbitrageReport, ReportStep};
