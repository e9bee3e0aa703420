//! UDP networking: quote listener and subscription renewal

pub mod connection;
pub mod subscription;

pub use connection::QuoteListener;
pub use subscription::{
    DatagramSink, Lease, SubscriptionManager, SubscriptionSettings, SubscriptionState,
};

/// Errors raised while subscribing to the provider
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("SUBSCRIBE send failed: {0}")]
    SendFailed(#[from] std::io::Error),

    #[error("SUBSCRIBE send timed out")]
    Timeout,

    #[error("subscription lapsed after {failures} consecutive failed renewals")]
    Lapsed { failures: u32 },
}
