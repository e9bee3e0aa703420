//! Infrastructure - cold path only
//!
//! This module contains non-latency-critical code:
//! - Configuration management
//! - Logging and metrics

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{Config, ConfigError, StalenessClock};
pub use logging::{init_logging, LoggingError};
pub use metrics::{MetricsCollector, MetricsSnapshot};
