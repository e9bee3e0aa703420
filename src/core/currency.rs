//! Currency codes
//!
//! A currency is a 3-letter ASCII code stored inline. Copy, hashable and
//! ordered byte-wise, so graph vertices sort lexicographically by code.

use std::fmt;
use std::str::FromStr;

/// Length of a currency code on the wire
pub const CODE_LEN: usize = 3;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Currency([u8; CODE_LEN]);

impl Currency {
    pub const USD: Self = Self(*b"USD");
    pub const EUR: Self = Self(*b"EUR");
    pub const GBP: Self = Self(*b"GBP");
    pub const JPY: Self = Self(*b"JPY");
    pub const CHF: Self = Self(*b"CHF");
    pub const CAD: Self = Self(*b"CAD");
    pub const AUD: Self = Self(*b"AUD");

    /// Parse a code from raw bytes.
    ///
    /// Returns `None` unless the slice is exactly three ASCII uppercase letters.
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let code: [u8; CODE_LEN] = bytes.try_into().ok()?;
        if code.iter().all(u8::is_ascii_uppercase) {
            Some(Self(code))
        } else {
            None
        }
    }

    #[inline(always)]
    pub const fn as_bytes(&self) -> &[u8; CODE_LEN] {
        &self.0
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        // Constructors only admit ASCII uppercase.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.as_str())
    }
}

/// Rejected currency code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid currency code: {0:?}")]
pub struct InvalidCurrency(pub String);

impl FromStr for Currency {
    type Err = InvalidCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes()).ok_or_else(|| InvalidCurrency(s.to_string()))
    }
}
