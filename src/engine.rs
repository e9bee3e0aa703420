//! Subscriber engine
//!
//! Orchestrates the quote listener, the rate graph and the renewal task:
//! receive -> decode -> apply -> snapshot -> detect -> report, one datagram at
//! a time, while the subscription manager renews the lease in its own task.

use crate::core::{Quote, Timestamp};
use crate::hot_path::{
    ApplyOutcome, ArbitrageReport, CycleDetector, Detection, RateGraph, SharedRateGraph,
};
use crate::infrastructure::{Config, MetricsCollector, StalenessClock};
use crate::net::{QuoteListener, SubscriptionManager, SubscriptionSettings};
use crate::wire::{DecodeError, QuoteCodec, WireMessage};
use crate::{ArbError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Level;

/// Bytes of a rejected datagram included in the warning
const HEX_DUMP_PREFIX: usize = 32;

/// Quote counts and detector verdict for one QUOTE datagram
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub applied: usize,
    pub stale: usize,
    pub invalid: usize,
    pub detection: Detection,
}

/// What happened to one datagram
#[derive(Debug, Clone, PartialEq)]
pub enum DatagramOutcome {
    /// Rejected by the codec, graph untouched
    Malformed(DecodeError),
    /// SUBSCRIBE arriving at the subscriber, ignored
    UnexpectedSubscribe(SocketAddr),
    /// Quotes applied and detection run
    Quotes(BatchOutcome),
}

/// Per-datagram pipeline, synchronous and socket-free
pub struct DatagramProcessor {
    codec: QuoteCodec,
    detector: CycleDetector,
    graph: SharedRateGraph,
    metrics: Arc<MetricsCollector>,
    stale_after: Duration,
    max_skew: Duration,
    clock: StalenessClock,
    notional: f64,
}

impl DatagramProcessor {
    pub fn new(config: &Config, graph: SharedRateGraph, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            codec: config.codec(),
            detector: CycleDetector::new(config.detection.relaxation_tolerance),
            graph,
            metrics,
            stale_after: config.quote_stale(),
            max_skew: config.max_clock_skew(),
            clock: config.detection.staleness_clock,
            notional: config.detection.report_notional,
        }
    }

    /// Decode, apply and detect for one datagram
    pub fn process(&self, payload: &[u8]) -> DatagramOutcome {
        self.metrics.record_datagram();

        let quotes = match WireMessage::decode(payload, &self.codec) {
            Ok(WireMessage::Quotes(quotes)) => quotes,
            Ok(WireMessage::Subscribe(addr)) => {
                crate::log_net!(Level::WARN, %addr, "Ignoring SUBSCRIBE sent to subscriber");
                return DatagramOutcome::UnexpectedSubscribe(addr);
            }
            Err(err) => {
                self.metrics.record_decode_error();
                crate::log_net!(
                    Level::WARN,
                    len = payload.len(),
                    prefix = %hex::encode(&payload[..payload.len().min(HEX_DUMP_PREFIX)]),
                    error = %err,
                    "Malformed datagram discarded"
                );
                return DatagramOutcome::Malformed(err);
            }
        };

        let mut batch = BatchOutcome {
            applied: 0,
            stale: 0,
            invalid: 0,
            detection: Detection::NoArbitrage,
        };
        let horizon = Timestamp::now().saturating_add(self.max_skew);
        for quote in &quotes {
            if quote.timestamp > horizon {
                batch.invalid += 1;
                tracing::warn!(%quote, %horizon, "Future-dated quote ignored");
                continue;
            }
            self.apply(quote, &mut batch);
        }
        self.metrics
            .record_quotes(batch.applied as u64, batch.stale as u64, batch.invalid as u64);

        batch.detection = self.detect();
        DatagramOutcome::Quotes(batch)
    }

    fn apply(&self, quote: &Quote, batch: &mut BatchOutcome) {
        let outcome = self.graph.write().apply_quote(quote);
        match outcome {
            ApplyOutcome::Applied => {
                batch.applied += 1;
                tracing::debug!(%quote, "Quote applied");
            }
            ApplyOutcome::Stale { stored } => {
                batch.stale += 1;
                tracing::debug!(%quote, %stored, "Stale quote ignored");
            }
            ApplyOutcome::InvalidRate | ApplyOutcome::SelfQuote => {
                batch.invalid += 1;
                tracing::warn!(%quote, reason = ?outcome, "Invalid quote ignored");
            }
        }
    }

    /// Snapshot under the read lock, then detect and report outside it
    fn detect(&self) -> Detection {
        let snapshot = {
            let graph = self.graph.read();
            let as_of = match self.clock {
                StalenessClock::Feed => graph.latest_timestamp().unwrap_or(Timestamp::EPOCH),
                StalenessClock::Wall => Timestamp::now(),
            };
            graph.snapshot(as_of, self.stale_after)
        };

        let detection = self.detector.detect(&snapshot);
        self.metrics.record_detection(detection.is_arbitrage());

        match detection.cycle() {
            Some(cycle) => {
                if let Some(report) = ArbitrageReport::from_cycle(cycle, self.notional) {
                    report.emit();
                }
            }
            None => tracing::trace!(
                vertices = snapshot.vertices().len(),
                excluded = snapshot.excluded(),
                "No arbitrage"
            ),
        }
        detection
    }
}

/// Quote subscriber: owns the socket, the graph and the renewal task
pub struct Subscriber {
    listener: QuoteListener,
    processor: DatagramProcessor,
    graph: SharedRateGraph,
    metrics: Arc<MetricsCollector>,
    provider: SocketAddr,
    advertised: SocketAddr,
    settings: SubscriptionSettings,
    shutdown: watch::Receiver<bool>,
}

impl Subscriber {
    /// Validate config, bind the socket and resolve addresses
    pub async fn bind(config: Config, shutdown: watch::Receiver<bool>) -> Result<Self> {
        config.validate()?;

        let provider = config.provider_addr()?;
        let listener =
            QuoteListener::bind(config.listener_addr()?, config.listener.recv_buffer_size).await?;
        let advertised = listener.advertised_addr(config.listener.advertise_host.as_deref())?;

        let graph = RateGraph::new().into_shared();
        let metrics = Arc::new(MetricsCollector::new());
        let processor = DatagramProcessor::new(&config, Arc::clone(&graph), Arc::clone(&metrics));

        Ok(Self {
            listener,
            processor,
            graph,
            metrics,
            provider,
            advertised,
            settings: SubscriptionSettings::from_config(&config),
            shutdown,
        })
    }

    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Address carried in SUBSCRIBE
    #[inline]
    pub fn advertised_addr(&self) -> SocketAddr {
        self.advertised
    }

    pub fn graph(&self) -> SharedRateGraph {
        Arc::clone(&self.graph)
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    /// Process one datagram without touching the socket
    pub fn process_datagram(&self, payload: &[u8]) -> DatagramOutcome {
        self.processor.process(payload)
    }

    /// Subscribe, then receive until shutdown, lapse or socket failure
    ///
    /// # Errors
    /// `SubscriptionLapsed` when renewals exhaust their budget, `Socket` when
    /// the receive socket fails.
    pub async fn run(self) -> Result<()> {
        let Subscriber {
            mut listener,
            processor,
            metrics,
            provider,
            advertised,
            settings,
            mut shutdown,
            ..
        } = self;

        let manager = SubscriptionManager::new(
            listener.socket(),
            provider,
            advertised,
            settings,
            Arc::clone(&metrics),
        );
        let mut renewal = tokio::spawn(manager.run(shutdown.clone()));

        crate::log_main!(
            Level::INFO,
            local = %listener.local_addr(),
            %advertised,
            %provider,
            "Subscriber running"
        );

        let result = loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        crate::log_main!(Level::INFO, "Shutdown requested");
                        break Ok(());
                    }
                }
                joined = &mut renewal => {
                    break match joined {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(ArbError::from(e)),
                        Err(e) => Err(ArbError::Io(std::io::Error::other(e))),
                    };
                }
                received = listener.recv() => {
                    match received {
                        Ok((payload, peer)) => {
                            tracing::trace!(%peer, len = payload.len(), "Datagram received");
                            processor.process(payload);
                        }
                        Err(e) => {
                            crate::log_net!(Level::ERROR, error = %e, "Receive socket failed");
                            break Err(e);
                        }
                    }
                }
            }
        };

        renewal.abort();

        let stats = metrics.snapshot();
        crate::log_main!(
            Level::INFO,
            datagrams = stats.datagrams_received,
            decode_errors = stats.decode_errors,
            applied = stats.quotes_applied,
            stale = stats.quotes_stale,
            invalid = stats.quotes_invalid,
            detections = stats.detection_runs,
            cycles = stats.cycles_found,
            renewals = stats.renewals_sent,
            renewal_failures = stats.renewal_failures,
            uptime_secs = stats.uptime_seconds,
            "Subscriber stopped"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Currency;
    use crate::test_utils::{q, quote_datagram, triangle};
    use crate::wire::{decode_subscribe, RecordLayout};
    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    fn processor(config: &Config) -> DatagramProcessor {
        DatagramProcessor::new(
            config,
            RateGraph::new().into_shared(),
            Arc::new(MetricsCollector::new()),
        )
    }

    fn batch(outcome: DatagramOutcome) -> BatchOutcome {
        match outcome {
            DatagramOutcome::Quotes(batch) => batch,
            other => panic!("expected quotes, got {other:?}"),
        }
    }

    #[test]
    fn test_triangle_datagram_reports_arbitrage() {
        let p = processor(&Config::default());
        let result = batch(p.process(&quote_datagram(&triangle(1_000_000))));

        assert_eq!(result.applied, 3);
        let cycle = result.detection.cycle().expect("arbitrage");
        assert_eq!(cycle.currencies, vec![Currency::EUR, Currency::GBP, Currency::USD]);

        let stats = p.metrics.snapshot();
        assert_eq!(stats.datagrams_received, 1);
        assert_eq!(stats.quotes_applied, 3);
        assert_eq!(stats.cycles_found, 1);
    }

    #[test]
    fn test_detection_runs_once_per_datagram() {
        let p = processor(&Config::default());
        for quote in triangle(1_000_000) {
            p.process(&quote_datagram(&[quote]));
        }
        let stats = p.metrics.snapshot();
        assert_eq!(stats.detection_runs, 3);
        assert_eq!(stats.cycles_found, 1);
    }

    #[test]
    fn test_malformed_datagrams_do_not_mutate_graph() {
        let p = processor(&Config::default());
        p.process(&quote_datagram(&[q(1_000, "USD", "EUR", 0.9)]));
        let before = p.graph.read().clone();

        let mut bad_rate = quote_datagram(&[q(2_000, "USD", "EUR", 0.5)]);
        bad_rate[14..].copy_from_slice(&f64::NAN.to_be_bytes());
        let mut truncated = quote_datagram(&triangle(3_000));
        truncated.pop();

        for payload in [&bad_rate[..], &truncated[..], &[][..], &b"garbage"[..]] {
            assert!(matches!(p.process(payload), DatagramOutcome::Malformed(_)));
        }

        let after = p.graph.read();
        assert_eq!(after.edge_count(), before.edge_count());
        assert_eq!(
            after.edge(Currency::USD, Currency::EUR),
            before.edge(Currency::USD, Currency::EUR)
        );
        assert_eq!(p.metrics.snapshot().decode_errors, 4);
    }

    #[test]
    fn test_stale_and_invalid_quotes_counted() {
        let p = processor(&Config::default());
        p.process(&quote_datagram(&[q(5_000, "USD", "EUR", 0.9)]));

        let result = batch(p.process(&quote_datagram(&[
            q(4_000, "USD", "EUR", 0.95),
            q(6_000, "USD", "GBP", -1.0),
            q(6_000, "GBP", "GBP", 1.0),
            q(6_000, "USD", "JPY", 150.0),
        ])));

        assert_eq!((result.applied, result.stale, result.invalid), (1, 1, 2));
        assert_eq!(result.detection, Detection::NoArbitrage);
    }

    #[test]
    fn test_feed_clock_prunes_old_edges() {
        let p = processor(&Config::default());
        // USD/EUR leg is 2s older than the rest, beyond the 1.5s window.
        let [usd_eur, eur_gbp, gbp_usd] = triangle(0);
        let shift = |quote: Quote, micros: u64| Quote {
            timestamp: Timestamp::from_micros(micros),
            ..quote
        };
        p.process(&quote_datagram(&[shift(usd_eur, 1_000_000)]));
        let result = batch(p.process(&quote_datagram(&[
            shift(eur_gbp, 3_000_000),
            shift(gbp_usd, 3_000_000),
        ])));
        assert_eq!(result.detection, Detection::NoArbitrage);
    }

    #[test]
    fn test_wall_clock_treats_old_feed_as_stale() {
        let mut config = Config::default();
        config.detection.staleness_clock = StalenessClock::Wall;
        let p = processor(&config);

        let result = batch(p.process(&quote_datagram(&triangle(1_000_000))));
        assert_eq!(result.applied, 3);
        assert_eq!(result.detection, Detection::NoArbitrage);
    }

    #[test]
    fn test_future_dated_quote_cannot_pin_feed_clock() {
        let p = processor(&Config::default());
        // 2100-01-01T00:00:00Z
        let far_future = q(4_102_444_800_000_000, "AUD", "CAD", 0.9);

        let result = batch(p.process(&quote_datagram(&[far_future])));
        assert_eq!((result.applied, result.invalid), (0, 1));
        assert!(p.graph.read().is_empty());
        assert_eq!(p.graph.read().latest_timestamp(), None);

        let now = Timestamp::now().as_micros();
        for i in 0..5 {
            let result = batch(p.process(&quote_datagram(&triangle(now + i * 1_000))));
            assert_eq!(result.applied, 3);
            assert!(result.detection.is_arbitrage(), "round {i}");
        }
    }

    #[test]
    fn test_quote_within_clock_skew_is_applied() {
        let p = processor(&Config::default());
        let ahead = Timestamp::now().as_micros() + 1_000_000;

        let result = batch(p.process(&quote_datagram(&triangle(ahead))));
        assert_eq!((result.applied, result.invalid), (3, 0));
        assert!(result.detection.is_arbitrage());
    }

    #[test]
    fn test_padded_layout_datagrams() {
        let mut config = Config::default();
        config.wire.record_layout = RecordLayout::Padded;
        let p = processor(&config);

        let payload = QuoteCodec::new(RecordLayout::Padded, 50).encode(&triangle(1_000_000));
        let result = batch(p.process(&payload));
        assert!(result.detection.is_arbitrage());
    }

    #[test]
    fn test_subscribe_payload_is_ignored() {
        let p = processor(&Config::default());
        let outcome = p.process(&[127, 0, 0, 1, 0xa6, 0x3b]);
        assert_eq!(
            outcome,
            DatagramOutcome::UnexpectedSubscribe("127.0.0.1:42555".parse().unwrap())
        );
        assert!(p.graph.read().is_empty());
    }

    fn loopback_config(provider: SocketAddr) -> Config {
        let mut config = Config::default();
        config.listener.port = 0;
        config.provider.host = provider.ip().to_string();
        config.provider.port = provider.port();
        config
    }

    #[tokio::test]
    async fn test_end_to_end_over_loopback() {
        let provider = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = loopback_config(provider.local_addr().unwrap());
        let (tx, rx) = watch::channel(false);

        let subscriber = Subscriber::bind(config, rx).await.unwrap();
        let metrics = subscriber.metrics();
        let graph = subscriber.graph();
        let local = subscriber.local_addr();
        let handle = tokio::spawn(subscriber.run());

        let mut buf = [0u8; 64];
        let (len, from) = timeout(Duration::from_secs(5), provider.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decode_subscribe(&buf[..len]).unwrap(), local);
        assert_eq!(from, local);

        provider
            .send_to(&quote_datagram(&triangle(1_000_000)), local)
            .await
            .unwrap();

        timeout(Duration::from_secs(5), async {
            while metrics.snapshot().cycles_found == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(graph.read().edge_count(), 6);

        tx.send(true).unwrap();
        let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert_eq!(metrics.snapshot().renewals_sent, 1);
    }

    #[tokio::test]
    async fn test_lapse_stops_subscriber_with_error() {
        // Sends to port 0 are rejected by the OS, so every SUBSCRIBE fails.
        let mut config = loopback_config("127.0.0.1:0".parse().unwrap());
        config.subscription.max_renewal_failures = 2;
        config.subscription.retry_interval_ms = 10;
        let (tx, rx) = watch::channel(false);

        let subscriber = Subscriber::bind(config, rx).await.unwrap();
        let metrics = subscriber.metrics();
        let local = subscriber.local_addr();

        let result = timeout(Duration::from_secs(5), subscriber.run())
            .await
            .unwrap();
        assert!(matches!(
            result,
            Err(ArbError::SubscriptionLapsed { failures: 2 })
        ));
        assert!(!*tx.borrow());

        let stats = metrics.snapshot();
        assert_eq!(stats.renewal_failures, 2);
        assert_eq!(stats.renewals_sent, 0);

        // Receive socket released with the loop.
        let rebound = UdpSocket::bind(local).await;
        assert!(rebound.is_ok());
    }

    #[tokio::test]
    async fn test_process_datagram_shares_graph() {
        let config = loopback_config("127.0.0.1:50403".parse().unwrap());
        let (_tx, rx) = watch::channel(false);
        let subscriber = Subscriber::bind(config, rx).await.unwrap();

        let outcome = subscriber.process_datagram(&quote_datagram(&triangle(1_000_000)));
        assert!(batch(outcome).detection.is_arbitrage());
        assert_eq!(subscriber.graph().read().vertex_count(), 3);
        assert_eq!(subscriber.advertised_addr(), subscriber.local_addr());
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let mut config = Config::default();
        config.subscription.max_renewal_failures = 0;
        let (_tx, rx) = watch::channel(false);
        assert!(matches!(
            Subscriber::bind(config, rx).await,
            Err(ArbError::Config(_))
        ));
    }
}
