//! Metrics collection for system monitoring
//!
//! Lock-free metrics counters using atomic operations.
//! Updated from the receive loop and the renewal task, read as snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

/// Subscriber metrics collector
///
/// Thread-safe counters shared between the receive loop and the renewal task.
pub struct MetricsCollector {
    /// Datagrams read from the socket
    datagrams_received: AtomicU64,
    /// Datagrams rejected by the codec
    decode_errors: AtomicU64,
    /// Quotes that replaced an edge
    quotes_applied: AtomicU64,
    /// Quotes older than the stored edge
    quotes_stale: AtomicU64,
    /// Quotes with a non-positive rate or identical currencies
    quotes_invalid: AtomicU64,
    /// Detector invocations
    detection_runs: AtomicU64,
    /// Detector invocations that found a cycle
    cycles_found: AtomicU64,
    /// SUBSCRIBE datagrams sent successfully
    renewals_sent: AtomicU64,
    /// SUBSCRIBE sends that failed or timed out
    renewal_failures: AtomicU64,
    /// Last datagram wall time (Unix millis)
    last_datagram_time: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

/// Metrics snapshot for logging
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub datagrams_received: u64,
    pub decode_errors: u64,
    pub quotes_applied: u64,
    pub quotes_stale: u64,
    pub quotes_invalid: u64,
    pub detection_runs: u64,
    pub cycles_found: u64,
    pub renewals_sent: u64,
    pub renewal_failures: u64,
    /// Unix millis, 0 if nothing received yet
    pub last_datagram_ms: u64,
    pub uptime_seconds: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            datagrams_received: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            quotes_applied: AtomicU64::new(0),
            quotes_stale: AtomicU64::new(0),
            quotes_invalid: AtomicU64::new(0),
            detection_runs: AtomicU64::new(0),
            cycles_found: AtomicU64::new(0),
            renewals_sent: AtomicU64::new(0),
            renewal_failures: AtomicU64::new(0),
            last_datagram_time: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_datagram(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.last_datagram_time.store(unix_millis(), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record per-datagram quote outcomes
    #[inline]
    pub fn record_quotes(&self, applied: u64, stale: u64, invalid: u64) {
        self.quotes_applied.fetch_add(applied, Ordering::Relaxed);
        self.quotes_stale.fetch_add(stale, Ordering::Relaxed);
        self.quotes_invalid.fetch_add(invalid, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_detection(&self, found_cycle: bool) {
        self.detection_runs.fetch_add(1, Ordering::Relaxed);
        if found_cycle {
            self.cycles_found.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_renewal(&self) {
        self.renewals_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_renewal_failure(&self) {
        self.renewal_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            quotes_applied: self.quotes_applied.load(Ordering::Relaxed),
            quotes_stale: self.quotes_stale.load(Ordering::Relaxed),
            quotes_invalid: self.quotes_invalid.load(Ordering::Relaxed),
            detection_runs: self.detection_runs.load(Ordering::Relaxed),
            cycles_found: self.cycles_found.load(Ordering::Relaxed),
            renewals_sent: self.renewals_sent.load(Ordering::Relaxed),
            renewal_failures: self.renewal_failures.load(Ordering::Relaxed),
            last_datagram_ms: self.last_datagram_time.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Milliseconds since the last datagram, `None` before the first one
    pub fn since_last_datagram_ms(&self) -> Option<u64> {
        match self.last_datagram_time.load(Ordering::Relaxed) {
            0 => None,
            last => Some(unix_millis().saturating_sub(last)),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
