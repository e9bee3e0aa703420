//! Forex arbitrage subscriber
//!
//! # Architecture
//! - **core**: Value types (Currency, Timestamp, Quote)
//! - **wire**: SUBSCRIBE / QUOTE datagram codec
//! - **hot_path**: Rate graph, Bellman-Ford cycle detection, reports
//! - **net**: UDP listener and subscription renewal
//! - **infrastructure**: Cold path (config, logging, metrics)

use anyhow::Context;
use forex_arb::infrastructure::{init_logging, Config};
use forex_arb::{log_main, ArbError, Subscriber};
use std::process::ExitCode;
use tokio::sync::watch;
use tracing::Level;

/// Main application state
struct SubscriberApp {
    config: Config,
}

impl SubscriberApp {
    fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until interrupted (exit 0) or the subscription lapses (exit 1)
    async fn run(self) -> anyhow::Result<ExitCode> {
        log_main!(Level::INFO, "Starting forex arbitrage subscriber...");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    log_main!(Level::INFO, "Interrupt received, shutting down");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => {
                    log_main!(Level::ERROR, error = %e, "Cannot listen for Ctrl-C");
                    // Dropping the sender would stop the subscriber.
                    std::future::pending::<()>().await;
                }
            }
        });

        let subscriber = Subscriber::bind(self.config, shutdown_rx)
            .await
            .context("failed to start subscriber")?;

        match subscriber.run().await {
            Ok(()) => Ok(ExitCode::SUCCESS),
            Err(ArbError::SubscriptionLapsed { failures }) => {
                log_main!(
                    Level::ERROR,
                    failures,
                    "Subscription lapsed, restart required"
                );
                Ok(ExitCode::FAILURE)
            }
            Err(e) => Err(e).context("subscriber stopped"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = Config::load().context("failed to load configuration")?;
    let _guards = init_logging(&config.logging).context("failed to initialize logging")?;

    SubscriberApp::new(config).run().await
}
