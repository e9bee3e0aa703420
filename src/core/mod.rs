//! Core value types
//!
//! This module contains the fundamental types used throughout the system:
//! - Currency: 3-letter code, graph vertex key
//! - Timestamp: microsecond wall time from the provider
//! - Quote: one exchange-rate observation

pub mod currency;
pub mod quote;

pub use currency::{Currency, InvalidCurrency, CODE_LEN};
pub use quote::{Quote, Timestamp};
