//! Quote data types
//!
//! `Timestamp` is microseconds since the Unix epoch, the provider's wire
//! resolution. `Quote` is one exchange-rate observation for a currency pair.

use super::Currency;
use std::fmt;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Microseconds since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const EPOCH: Self = Self(0);

    #[inline(always)]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    #[inline(always)]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        Self(u64::try_from(nanos / 1_000).unwrap_or(0))
    }

    /// Calendar representation, `None` if outside the representable date range
    pub fn to_datetime(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0) * 1_000).ok()
    }

    /// `self - window`, clamped at the epoch
    #[inline]
    pub fn saturating_sub(&self, window: Duration) -> Self {
        let micros = u64::try_from(window.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_sub(micros))
    }

    /// `self + window`, clamped at `u64::MAX` microseconds
    #[inline]
    pub fn saturating_add(&self, window: Duration) -> Self {
        let micros = u64::try_from(window.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }

    /// Elapsed time from `earlier` to `self`, zero if `earlier` is later
    #[inline]
    pub fn saturating_duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime().and_then(|dt| dt.format(&Rfc3339).ok()) {
            Some(s) => f.write_str(&s),
            None => write!(f, "{}us", self.0),
        }
    }
}

/// Single exchange-rate observation: 1 `base` buys `rate` units of `quote`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub timestamp: Timestamp,
    pub base: Currency,
    pub quote: Currency,
    pub rate: f64,
}

impl Quote {
    #[inline(always)]
    pub const fn new(timestamp: Timestamp, base: Currency, quote: Currency, rate: f64) -> Self {
        Self {
            timestamp,
            base,
            quote,
            rate,
        }
    }

    /// Ordered (base, quote) pair
    #[inline(always)]
    pub const fn pair(&self) -> (Currency, Currency) {
        (self.base, self.quote)
    }

    /// Rate usable as a graph weight (finite and strictly positive)
    #[inline]
    pub fn has_valid_rate(&self) -> bool {
        self.rate.is_finite() && self.rate > 0.0
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {} @ {}", self.base, self.quote, self.rate, self.timestamp)
    }
}
