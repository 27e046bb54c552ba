//! Integer field text: plain decimal or base-N, chosen once from the config.

use crate::config::CodecConfig;
use crate::error::{DnslzError, Result};

use super::base_n;

/// Append `n` in conventional decimal.
pub fn write_decimal(mut n: u64, out: &mut Vec<u8>) {
    let mut buf = [0u8; 20];
    let mut i = buf.len();
    loop {
        i -= 1;
        buf[i] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    out.extend_from_slice(&buf[i..]);
}

/// Parse decimal digits without sign, accepting leading zeros.
pub fn parse_decimal(text: &[u8]) -> Option<u64> {
    if text.is_empty() {
        return None;
    }
    text.iter().try_fold(0u64, |acc, &c| {
        if !c.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add((c - b'0') as u64)
    })
}

/// Parse decimal in canonical form: no sign and no leading zeros.
///
/// Raw log integers must be canonical so they come back byte-identical.
pub fn parse_canonical_decimal(text: &[u8]) -> Option<u64> {
    if text.len() > 1 && text[0] == b'0' {
        return None;
    }
    parse_decimal(text)
}

/// Text form of numeric fields in the compressed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    /// Conventional decimal digits.
    Decimal,
    /// Little-endian base-N digits.
    BaseN(u8),
}

impl NumberFormat {
    /// Format selected by the numeric-encoding bit of `config`.
    pub fn for_config(config: &CodecConfig) -> Self {
        if config.functions.numeric_encoding() {
            NumberFormat::BaseN(config.base)
        } else {
            NumberFormat::Decimal
        }
    }

    pub fn is_base_n(self) -> bool {
        matches!(self, NumberFormat::BaseN(_))
    }

    /// Append `n` in this format.
    pub fn write(self, n: u64, out: &mut Vec<u8>) {
        match self {
            NumberFormat::Decimal => write_decimal(n, out),
            NumberFormat::BaseN(base) => base_n::encode(n, base, out),
        }
    }

    /// Parse a field written by [`NumberFormat::write`].
    pub fn read(self, text: &[u8]) -> Result<u64> {
        match self {
            NumberFormat::Decimal => parse_decimal(text).ok_or_else(|| {
                DnslzError::mismatch(format!(
                    "{:?} is not a decimal field",
                    String::from_utf8_lossy(text)
                ))
            }),
            NumberFormat::BaseN(base) => base_n::decode(text, base),
        }
    }

    /// Parse a field and check it fits `max`.
    pub fn read_bounded(self, text: &[u8], max: u64, what: &str) -> Result<u64> {
        let value = self.read(text)?;
        if value > max {
            return Err(DnslzError::mismatch(format!(
                "{} value {} exceeds {}",
                what, value, max
            )));
        }
        Ok(value)
    }
}
