//! QUOTE record codec
//!
//! A QUOTE datagram is a concatenation of fixed-size records. Decoding is
//! all-or-nothing: one bad record rejects the datagram.

use super::{DecodeError, RecordLayout};
use crate::core::{Currency, Quote, Timestamp, CODE_LEN};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Compact record: ts(8) | base(3) | quote(3) | rate f64 BE(8)
pub const COMPACT_RECORD_SIZE: usize = 8 + CODE_LEN * 2 + 8;

/// Padded legacy record: base(3) | quote(3) | rate f32 LE(4) | ts(8) | reserved(14)
pub const PADDED_RECORD_SIZE: usize = 32;

/// Records the provider puts in one datagram at most
pub const MAX_QUOTES_PER_MESSAGE: usize = 50;

const PADDED_RESERVED: usize = PADDED_RECORD_SIZE - (CODE_LEN * 2 + 4 + 8);

/// QUOTE datagram encoder/decoder for one record layout
#[derive(Debug, Clone, Copy)]
pub struct QuoteCodec {
    layout: RecordLayout,
    max_records: usize,
}

impl QuoteCodec {
    pub const fn new(layout: RecordLayout, max_records: usize) -> Self {
        Self {
            layout,
            max_records,
        }
    }

    #[inline(always)]
    pub const fn layout(&self) -> RecordLayout {
        self.layout
    }

    #[inline(always)]
    pub const fn record_size(&self) -> usize {
        self.layout.record_size()
    }

    /// Size of a datagram carrying the maximum number of records, `None` on overflow
    #[inline]
    pub const fn max_payload_len(&self) -> Option<usize> {
        self.record_size().checked_mul(self.max_records)
    }

    /// Decode every record in `payload`
    ///
    /// # Errors
    /// Returns `DecodeError` if the payload is empty, not a whole number of
    /// records, over the record limit, or any field is malformed.
    pub fn decode(&self, payload: &[u8]) -> Result<Vec<Quote>, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }

        let record_size = self.record_size();
        if payload.len() % record_size != 0 {
            return Err(DecodeError::Length {
                len: payload.len(),
                record_size,
            });
        }

        let count = payload.len() / record_size;
        if count > self.max_records {
            return Err(DecodeError::TooManyRecords {
                count,
                max: self.max_records,
            });
        }

        payload
            .chunks_exact(record_size)
            .enumerate()
            .map(|(i, record)| match self.layout {
                RecordLayout::Compact => decode_compact(record, i * record_size),
                RecordLayout::Padded => decode_padded(record, i * record_size),
            })
            .collect()
    }

    /// Encode quotes into a fresh datagram payload
    ///
    /// The padded layout narrows rates to `f32`.
    pub fn encode(&self, quotes: &[Quote]) -> Bytes {
        let mut buf = BytesMut::with_capacity(quotes.len() * self.record_size());
        self.encode_into(quotes, &mut buf);
        buf.freeze()
    }

    pub fn encode_into(&self, quotes: &[Quote], buf: &mut BytesMut) {
        buf.reserve(quotes.len() * self.record_size());
        for q in quotes {
            match self.layout {
                RecordLayout::Compact => {
                    buf.put_u64(q.timestamp.as_micros());
                    buf.put_slice(q.base.as_bytes());
                    buf.put_slice(q.quote.as_bytes());
                    buf.put_f64(q.rate);
                }
                RecordLayout::Padded => {
                    buf.put_slice(q.base.as_bytes());
                    buf.put_slice(q.quote.as_bytes());
                    buf.put_f32_le(q.rate as f32);
                    buf.put_u64(q.timestamp.as_micros());
                    buf.put_bytes(0, PADDED_RESERVED);
                }
            }
        }
    }
}

impl Default for QuoteCodec {
    fn default() -> Self {
        Self::new(RecordLayout::Compact, MAX_QUOTES_PER_MESSAGE)
    }
}

// Callers pass slices of exactly one record, so the Buf getters cannot run short.
fn decode_compact(mut record: &[u8], offset: usize) -> Result<Quote, DecodeError> {
    let micros = record.get_u64();
    let base = currency_at(&record[..CODE_LEN], offset + 8)?;
    let quote = currency_at(&record[CODE_LEN..CODE_LEN * 2], offset + 8 + CODE_LEN)?;
    record.advance(CODE_LEN * 2);
    let rate = record.get_f64();

    let rate_offset = offset + 8 + CODE_LEN * 2;
    Ok(Quote::new(
        timestamp_at(micros, offset)?,
        base,
        quote,
        finite_at(rate, rate_offset)?,
    ))
}

fn decode_padded(mut record: &[u8], offset: usize) -> Result<Quote, DecodeError> {
    let base = currency_at(&record[..CODE_LEN], offset)?;
    let quote = currency_at(&record[CODE_LEN..CODE_LEN * 2], offset + CODE_LEN)?;
    record.advance(CODE_LEN * 2);
    let rate = f64::from(record.get_f32_le());
    let micros = record.get_u64();

    Ok(Quote::new(
        timestamp_at(micros, offset + CODE_LEN * 2 + 4)?,
        base,
        quote,
        finite_at(rate, offset + CODE_LEN * 2)?,
    ))
}

#[inline]
fn currency_at(bytes: &[u8], offset: usize) -> Result<Currency, DecodeError> {
    Currency::from_bytes(bytes).ok_or(DecodeError::Currency { offset })
}

#[inline]
fn finite_at(rate: f64, offset: usize) -> Result<f64, DecodeError> {
    if rate.is_finite() {
        Ok(rate)
    } else {
        Err(DecodeError::Rate { offset })
    }
}

#[inline]
fn timestamp_at(micros: u64, offset: usize) -> Result<Timestamp, DecodeError> {
    let ts = Timestamp::from_micros(micros);
    match ts.to_datetime() {
        Some(_) => Ok(ts),
        None => Err(DecodeError::Timestamp { offset, micros }),
    }
}
