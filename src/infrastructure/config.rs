//! Configuration management for the subscriber
//!
//! Loads configuration from config.toml at startup.
//! Every field has a default so a partial (or missing) file is fine.

use crate::wire::{QuoteCodec, RecordLayout, MAX_QUOTES_PER_MESSAGE};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Subscriber configuration
///
/// Loaded from config.toml at startup. Contains all tunable parameters
/// to avoid hardcoded values throughout the codebase.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub listener: ListenerConfig,

    #[serde(default)]
    pub subscription: SubscriptionConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub wire: WireConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Quote provider address
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_provider_port")]
    pub port: u16,
}

/// Receive socket settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port, 0 picks an ephemeral port
    #[serde(default = "default_listener_port")]
    pub port: u16,

    /// Host sent in SUBSCRIBE when binding to an unspecified address
    #[serde(default)]
    pub advertise_host: Option<String>,

    /// Receive buffer size in bytes
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
}

/// Subscription lease and renewal timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionConfig {
    #[serde(default = "default_lease_ms")]
    pub lease_ms: u64,

    /// Renewal period, half the lease when unset
    #[serde(default)]
    pub renewal_interval_ms: Option<u64>,

    /// Delay before the next attempt after a failed send
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Upper bound on a single SUBSCRIBE send
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Consecutive failed sends before the subscription lapses
    #[serde(default = "default_max_renewal_failures")]
    pub max_renewal_failures: u32,
}

/// Clock used as "now" for the staleness window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StalenessClock {
    /// Newest accepted quote timestamp
    #[default]
    Feed,
    /// Local system clock
    Wall,
}

/// Cycle detection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectionConfig {
    /// Edges older than this are left out of detection
    #[serde(default = "default_quote_stale_ms")]
    pub quote_stale_ms: u64,

    #[serde(default)]
    pub staleness_clock: StalenessClock,

    /// Quotes stamped further ahead of the local clock are discarded
    #[serde(default = "default_max_clock_skew_ms")]
    pub max_clock_skew_ms: u64,

    #[serde(default = "default_relaxation_tolerance")]
    pub relaxation_tolerance: f64,

    /// Starting amount for the report walk-through
    #[serde(default = "default_report_notional")]
    pub report_notional: f64,
}

/// Quote datagram format
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireConfig {
    #[serde(default)]
    pub record_layout: RecordLayout,

    #[serde(default = "default_max_quotes")]
    pub max_quotes_per_datagram: usize,
}

/// Log output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,

    /// Write rolling log files in addition to the console
    #[serde(default = "default_true")]
    pub file_output: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_provider_port(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_listener_port(),
            advertise_host: None,
            recv_buffer_size: default_recv_buffer_size(),
        }
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            lease_ms: default_lease_ms(),
            renewal_interval_ms: None,
            retry_interval_ms: default_retry_interval_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            max_renewal_failures: default_max_renewal_failures(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            quote_stale_ms: default_quote_stale_ms(),
            staleness_clock: StalenessClock::default(),
            max_clock_skew_ms: default_max_clock_skew_ms(),
            relaxation_tolerance: default_relaxation_tolerance(),
            report_notional: default_report_notional(),
        }
    }
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            record_layout: RecordLayout::default(),
            max_quotes_per_datagram: default_max_quotes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
            file_output: default_true(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_provider_port() -> u16 {
    50403
}

fn default_listener_port() -> u16 {
    42555
}

fn default_recv_buffer_size() -> usize {
    4096
}

fn default_lease_ms() -> u64 {
    10 * 60 * 1000 // 10 minutes
}

fn default_retry_interval_ms() -> u64 {
    5_000
}

fn default_send_timeout_ms() -> u64 {
    1_000
}

fn default_max_renewal_failures() -> u32 {
    3
}

fn default_quote_stale_ms() -> u64 {
    1_500
}

fn default_max_clock_skew_ms() -> u64 {
    5_000
}

fn default_relaxation_tolerance() -> f64 {
    crate::hot_path::DEFAULT_TOLERANCE
}

fn default_report_notional() -> f64 {
    100.0
}

fn default_max_quotes() -> usize {
    MAX_QUOTES_PER_MESSAGE
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from the file named by `CONFIG_PATH` (default `config.toml`)
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if the file exists but cannot be read, parsed or validated.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        Self::from_path(config_path)
    }

    /// Load from an explicit path, defaults if the file is missing
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the subscriber cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sub = &self.subscription;
        if sub.lease_ms == 0 {
            return Err(invalid("subscription.lease_ms must be positive"));
        }
        if sub.renewal_interval_ms == Some(0) {
            return Err(invalid("subscription.renewal_interval_ms must be positive"));
        }
        if self.renewal_interval() >= self.lease() {
            return Err(invalid(
                "subscription.renewal_interval_ms must be shorter than the lease",
            ));
        }
        if sub.retry_interval_ms == 0 {
            return Err(invalid("subscription.retry_interval_ms must be positive"));
        }
        if sub.send_timeout_ms == 0 {
            return Err(invalid("subscription.send_timeout_ms must be positive"));
        }
        if sub.max_renewal_failures == 0 {
            return Err(invalid("subscription.max_renewal_failures must be positive"));
        }
        if self.detection.quote_stale_ms == 0 {
            return Err(invalid("detection.quote_stale_ms must be positive"));
        }
        if self.detection.max_clock_skew_ms == 0 {
            return Err(invalid("detection.max_clock_skew_ms must be positive"));
        }
        let tolerance = self.detection.relaxation_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(invalid("detection.relaxation_tolerance must be finite and >= 0"));
        }
        let notional = self.detection.report_notional;
        if !notional.is_finite() || notional <= 0.0 {
            return Err(invalid("detection.report_notional must be positive"));
        }
        if self.listener.recv_buffer_size == 0 {
            return Err(invalid("listener.recv_buffer_size must be positive"));
        }
        if self.wire.max_quotes_per_datagram == 0 {
            return Err(invalid("wire.max_quotes_per_datagram must be positive"));
        }
        // A truncated datagram would be misread as a shorter one.
        let largest = self.codec().max_payload_len().ok_or_else(|| {
            invalid("wire.max_quotes_per_datagram overflows the datagram size")
        })?;
        if self.listener.recv_buffer_size <= largest {
            return Err(ConfigError::Invalid(format!(
                "listener.recv_buffer_size must exceed the largest datagram ({largest} bytes)"
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.subscription.lease_ms)
    }

    /// Renewal period, half the lease unless configured
    #[inline]
    pub fn renewal_interval(&self) -> Duration {
        match self.subscription.renewal_interval_ms {
            Some(ms) => Duration::from_millis(ms),
            None => self.lease() / 2,
        }
    }

    #[inline]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.subscription.retry_interval_ms)
    }

    #[inline]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.subscription.send_timeout_ms)
    }

    #[inline]
    pub fn quote_stale(&self) -> Duration {
        Duration::from_millis(self.detection.quote_stale_ms)
    }

    #[inline]
    pub fn max_clock_skew(&self) -> Duration {
        Duration::from_millis(self.detection.max_clock_skew_ms)
    }

    /// Codec for the configured record layout
    pub fn codec(&self) -> QuoteCodec {
        QuoteCodec::new(self.wire.record_layout, self.wire.max_quotes_per_datagram)
    }

    /// Resolve the provider address
    pub fn provider_addr(&self) -> Result<SocketAddr, ConfigError> {
        resolve(&self.provider.host, self.provider.port)
    }

    /// Resolve the bind address of the receive socket
    pub fn listener_addr(&self) -> Result<SocketAddr, ConfigError> {
        resolve(&self.listener.host, self.listener.port)
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| ConfigError::Invalid(format!("cannot resolve {host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| ConfigError::Invalid(format!("no address for {host}:{port}")))
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
