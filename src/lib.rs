//! Real-time forex arbitrage subscriber
//!
//! Core library: quote wire codec, rate graph, negative-cycle detection and
//! the UDP subscriber that ties them together.

pub mod core;
pub mod engine;
pub mod hot_path;
pub mod infrastructure;
pub mod net;
pub mod wire;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use engine::{DatagramOutcome, Subscriber};
pub use infrastructure::config::{Config, ConfigError};

use net::SubscriptionError;
use thiserror::Error;

/// Main error type for the subscriber
#[derive(Error, Debug)]
pub enum ArbError {
    #[error("Decode error: {0}")]
    Decode(#[from] wire::DecodeError),

    #[error("Subscription lapsed after {failures} consecutive failed renewals")]
    SubscriptionLapsed { failures: u32 },

    #[error("Socket error: {0}")]
    Socket(std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SubscriptionError> for ArbError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::Lapsed { failures } => ArbError::SubscriptionLapsed { failures },
            SubscriptionError::SendFailed(e) => ArbError::Socket(e),
            SubscriptionError::Timeout => ArbError::Socket(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "SUBSCRIBE send timed out",
            )),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ArbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lapse_maps_to_fatal_error() {
        let err = ArbError::from(SubscriptionError::Lapsed { failures: 3 });
        assert!(matches!(err, ArbError::SubscriptionLapsed { failures: 3 }));
        assert_eq!(
            err.to_string(),
            "Subscription lapsed after 3 consecutive failed renewals"
        );
    }

    #[test]
    fn test_timeout_maps_to_socket_error() {
        match ArbError::from(SubscriptionError::Timeout) {
            ArbError::Socket(e) => assert_eq!(e.kind(), std::io::ErrorKind::TimedOut),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_error_converts() {
        let err: ArbError = wire::DecodeError::Empty.into();
        assert_eq!(err.to_string(), "Decode error: empty datagram");
    }
}
