//! Subscription lease management
//!
//! State machine:
//! `Unsubscribed -> Subscribed -> (renew ok) Subscribed | (N failures in a row) Lapsed`
//!
//! A background task re-sends SUBSCRIBE every renewal interval, or after the
//! retry interval when the previous send failed. Lapsed is terminal; the
//! process restarts to recover.

use super::SubscriptionError;
use crate::infrastructure::{Config, MetricsCollector};
use crate::wire::encode_subscribe;
use bytes::Bytes;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tracing::Level;

/// Something that can send a datagram to an address
///
/// Implemented for the tokio UDP socket; tests script their own.
pub trait DatagramSink: Send + Sync + 'static {
    fn send_datagram(
        &self,
        payload: &[u8],
        target: SocketAddr,
    ) -> impl Future<Output = io::Result<usize>> + Send;
}

impl DatagramSink for UdpSocket {
    async fn send_datagram(&self, payload: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.send_to(payload, target).await
    }
}

/// Subscription state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// No SUBSCRIBE has gone through yet
    Unsubscribed,
    /// Last successful send plus the lease
    Subscribed { expires_at: Instant },
    /// Failure budget exhausted
    Lapsed,
}

/// Lease bookkeeping, independent of any socket
#[derive(Debug, Clone)]
pub struct Lease {
    state: SubscriptionState,
    duration: Duration,
    consecutive_failures: u32,
    max_failures: u32,
}

impl Lease {
    pub fn new(duration: Duration, max_failures: u32) -> Self {
        Self {
            state: SubscriptionState::Unsubscribed,
            duration,
            consecutive_failures: 0,
            max_failures: max_failures.max(1),
        }
    }

    /// Successful send at `now`: reset failures and extend the lease
    pub fn record_success(&mut self, now: Instant) -> SubscriptionState {
        if self.state != SubscriptionState::Lapsed {
            self.consecutive_failures = 0;
            self.state = SubscriptionState::Subscribed {
                expires_at: now + self.duration,
            };
        }
        self.state
    }

    /// Failed send: lapse once the budget is used up
    pub fn record_failure(&mut self) -> SubscriptionState {
        if self.state != SubscriptionState::Lapsed {
            self.consecutive_failures += 1;
            if self.consecutive_failures >= self.max_failures {
                self.state = SubscriptionState::Lapsed;
            }
        }
        self.state
    }

    #[inline]
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    #[inline]
    pub fn is_lapsed(&self) -> bool {
        self.state == SubscriptionState::Lapsed
    }

    /// Whether a granted lease has run out
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.state {
            SubscriptionState::Subscribed { expires_at } => now >= expires_at,
            _ => false,
        }
    }

    #[inline]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Timing and budget for the renewal task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionSettings {
    pub lease: Duration,
    pub renewal_interval: Duration,
    pub retry_interval: Duration,
    pub send_timeout: Duration,
    pub max_failures: u32,
}

impl SubscriptionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lease: config.lease(),
            renewal_interval: config.renewal_interval(),
            retry_interval: config.retry_interval(),
            send_timeout: config.send_timeout(),
            max_failures: config.subscription.max_renewal_failures,
        }
    }
}

/// Sends SUBSCRIBE and keeps the lease alive
pub struct SubscriptionManager<S> {
    sink: Arc<S>,
    provider: SocketAddr,
    /// Encoded SUBSCRIBE, the advertised address never changes
    payload: Bytes,
    settings: SubscriptionSettings,
    lease: Lease,
    metrics: Arc<MetricsCollector>,
}

impl<S: DatagramSink> SubscriptionManager<S> {
    pub fn new(
        sink: Arc<S>,
        provider: SocketAddr,
        advertised: SocketAddr,
        settings: SubscriptionSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            sink,
            provider,
            payload: encode_subscribe(advertised),
            lease: Lease::new(settings.lease, settings.max_failures),
            settings,
            metrics,
        }
    }

    #[inline]
    pub fn state(&self) -> SubscriptionState {
        self.lease.state()
    }

    #[inline]
    pub fn lease(&self) -> &Lease {
        &self.lease
    }

    /// Send one SUBSCRIBE, bounded by the send timeout
    ///
    /// # Errors
    /// `SendFailed`/`Timeout` for a failure within the budget, `Lapsed` once
    /// the budget is exhausted (and on every call after that).
    pub async fn subscribe(&mut self) -> Result<SubscriptionState, SubscriptionError> {
        if self.lease.is_lapsed() {
            return Err(self.lapsed());
        }

        let sent = timeout(
            self.settings.send_timeout,
            self.sink.send_datagram(&self.payload, self.provider),
        )
        .await;

        let err = match sent {
            Ok(Ok(_)) => {
                self.metrics.record_renewal();
                let state = self.lease.record_success(Instant::now());
                crate::log_net!(
                    Level::INFO,
                    provider = %self.provider,
                    lease_secs = self.settings.lease.as_secs(),
                    "Subscribed"
                );
                return Ok(state);
            }
            Ok(Err(e)) => SubscriptionError::SendFailed(e),
            Err(_) => SubscriptionError::Timeout,
        };

        self.metrics.record_renewal_failure();
        if self.lease.record_failure() == SubscriptionState::Lapsed {
            let lapsed = self.lapsed();
            crate::log_net!(Level::ERROR, provider = %self.provider, error = %err, "{}", lapsed);
            return Err(lapsed);
        }

        crate::log_net!(
            Level::WARN,
            provider = %self.provider,
            failures = self.lease.consecutive_failures(),
            budget = self.settings.max_failures,
            error = %err,
            "SUBSCRIBE failed"
        );
        Err(err)
    }

    /// Subscribe, then renew until shutdown or lapse
    ///
    /// Returns `Ok(())` when `shutdown` flips to true (or its sender drops),
    /// `Err(Lapsed)` when the failure budget runs out.
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SubscriptionError> {
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let delay = match self.subscribe().await {
                Ok(_) => self.settings.renewal_interval,
                Err(SubscriptionError::Lapsed { failures }) => {
                    return Err(SubscriptionError::Lapsed { failures });
                }
                Err(_) => {
                    if self.lease.is_expired(Instant::now()) {
                        crate::log_net!(
                            Level::WARN,
                            provider = %self.provider,
                            "Lease expired while retrying, quotes may stop"
                        );
                    }
                    self.settings.retry_interval
                }
            };

            let next = sleep(delay);
            tokio::pin!(next);
            loop {
                tokio::select! {
                    _ = &mut next => break,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            crate::log_net!(Level::INFO, "Renewal task stopped");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn lapsed(&self) -> SubscriptionError {
        SubscriptionError::Lapsed {
            failures: self.lease.consecutive_failures(),
        }
    }
}
