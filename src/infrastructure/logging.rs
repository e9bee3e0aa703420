//! Centralized logging system
//!
//! Console output plus, when enabled, daily rolling files under the
//! configured directory, separated by log type:
//! - main/ - everything, JSON lines
//! - error/ - warnings and errors only
//! - net/ - socket and subscription events
//! - arbitrage/ - detected cycles

use super::config::LoggingConfig;
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::{filter_fn, LevelFilter},
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log target for socket and subscription events
pub const NET_TARGET: &str = "net";
/// Log target for arbitrage reports
pub const ARBITRAGE_TARGET: &str = "arbitrage";
/// Log target for process lifecycle
pub const MAIN_TARGET: &str = "main";

const LOG_TYPES: [&str; 4] = ["main", "error", NET_TARGET, ARBITRAGE_TARGET];

/// Errors raised while installing the subscriber
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to create log directory {path}: {source}")]
    Directory {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Initialize console and file logging
///
/// `RUST_LOG` overrides the configured level. Returns the appender guards,
/// which must be kept alive for the duration of the program.
pub fn init_logging(config: &LoggingConfig) -> Result<Vec<WorkerGuard>, LoggingError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if !config.file_output {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer())
            .try_init()?;
        return Ok(Vec::new());
    }

    let logs_dir = config.directory.as_path();
    for log_type in LOG_TYPES {
        create_dir(&logs_dir.join(log_type))?;
    }

    let mut guards = Vec::with_capacity(LOG_TYPES.len());

    let (main_appender, guard) = create_appender(logs_dir, "main");
    guards.push(guard);
    let (error_appender, guard) = create_appender(logs_dir, "error");
    guards.push(guard);
    let (net_appender, guard) = create_appender(logs_dir, NET_TARGET);
    guards.push(guard);
    let (arb_appender, guard) = create_appender(logs_dir, ARBITRAGE_TARGET);
    guards.push(guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(LevelFilter::WARN);

    let net_layer = tracing_subscriber::fmt::layer()
        .with_writer(net_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(filter_fn(|metadata| metadata.target() == NET_TARGET));

    let arbitrage_layer = tracing_subscriber::fmt::layer()
        .with_writer(arb_appender)
        .with_ansi(false)
        .with_target(false)
        .with_level(false)
        .with_filter(filter_fn(|metadata| metadata.target() == ARBITRAGE_TARGET));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(main_layer)
        .with(error_layer)
        .with(net_layer)
        .with(arbitrage_layer)
        .with(console_layer())
        .try_init()?;

    tracing::info!(
        target: MAIN_TARGET,
        "Logging system initialized. Log files in {}",
        logs_dir.display()
    );

    Ok(guards)
}

/// Human-readable stdout layer, generic over the stack it lands on
fn console_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true)
}

fn create_dir(dir: &Path) -> Result<(), LoggingError> {
    fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
        path: dir.display().to_string(),
        source,
    })
}

/// Create a daily rolling file appender in `<logs_dir>/<name>/`
fn create_appender(logs_dir: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, logs_dir.join(name), name);
    tracing_appender::non_blocking(appender)
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_net {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "net", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_arbitrage {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "arbitrage", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_main {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "main", $level, $($arg)+)
    };
}
