//! Binary wire protocol between subscriber and quote provider
//!
//! Two datagram kinds travel over UDP:
//! - SUBSCRIBE (subscriber -> provider): the subscriber's listening address
//! - QUOTE (provider -> subscriber): one or more fixed-size quote records
//!
//! Datagrams are decoded once at the socket boundary into [`WireMessage`].
//! A SUBSCRIBE payload is 6 or 18 bytes, which is never a whole number of
//! quote records in either layout, so the length alone identifies the kind.

pub mod quote;
pub mod subscribe;

pub use quote::{QuoteCodec, COMPACT_RECORD_SIZE, MAX_QUOTES_PER_MESSAGE, PADDED_RECORD_SIZE};
pub use subscribe::{decode_subscribe, encode_subscribe, SUBSCRIBE_V4_LEN, SUBSCRIBE_V6_LEN};

use crate::core::Quote;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Quote record layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordLayout {
    /// 22 bytes: ts u64 BE | base | quote | rate f64 BE
    #[default]
    Compact,
    /// 32 bytes: base | quote | rate f32 LE | ts u64 BE | 14 reserved
    Padded,
}

impl RecordLayout {
    #[inline(always)]
    pub const fn record_size(&self) -> usize {
        match self {
            RecordLayout::Compact => COMPACT_RECORD_SIZE,
            RecordLayout::Padded => PADDED_RECORD_SIZE,
        }
    }
}

/// Decoded datagram
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// Subscription request carrying the subscriber's reachable address
    Subscribe(SocketAddr),
    /// Batch of quotes published together
    Quotes(Vec<Quote>),
}

impl WireMessage {
    /// Serialize into a datagram payload
    pub fn encode(&self, codec: &QuoteCodec) -> Bytes {
        match self {
            WireMessage::Subscribe(addr) => encode_subscribe(*addr),
            WireMessage::Quotes(quotes) => codec.encode(quotes),
        }
    }

    /// Classify and decode a datagram payload
    pub fn decode(payload: &[u8], codec: &QuoteCodec) -> Result<Self, DecodeError> {
        match payload.len() {
            SUBSCRIBE_V4_LEN | SUBSCRIBE_V6_LEN => decode_subscribe(payload).map(Self::Subscribe),
            _ => codec.decode(payload).map(Self::Quotes),
        }
    }
}

/// Malformed datagram. The whole datagram is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty datagram")]
    Empty,

    #[error("datagram length {len} is not a multiple of the {record_size}-byte record size")]
    Length { len: usize, record_size: usize },

    #[error("datagram carries {count} records, limit is {max}")]
    TooManyRecords { count: usize, max: usize },

    #[error("malformed currency code at byte {offset}")]
    Currency { offset: usize },

    #[error("non-finite rate at byte {offset}")]
    Rate { offset: usize },

    #[error("timestamp {micros}us at byte {offset} is out of range")]
    Timestamp { offset: usize, micros: u64 },

    #[error("subscribe payload is {len} bytes, expected 6 or 18")]
    Address { len: usize },
}
