//! Little-endian base-N integer text.
//!
//! The least significant digit is written first, so a value can be padded to
//! a fixed width by appending `'0'` digits without changing it.

use crate::config::{MAX_BASE, MIN_BASE};
use crate::error::{DnslzError, Result};

/// Digit alphabet: `0-9`, then `a-z`, then `A-Z`.
const DIGITS: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Value of a digit character, if it is one.
#[inline]
fn digit_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'z' => Some(c - b'a' + 10),
        b'A'..=b'Z' => Some(c - b'A' + 36),
        _ => None,
    }
}

/// Append `n` in base `base`, least significant digit first.
///
/// Zero is written as a single `'0'`.
pub fn encode(mut n: u64, base: u8, out: &mut Vec<u8>) {
    debug_assert!((MIN_BASE..=MAX_BASE).contains(&base));
    let base = base as u64;
    if n == 0 {
        out.push(b'0');
        return;
    }
    while n > 0 {
        out.push(DIGITS[(n % base) as usize]);
        n /= base;
    }
}

/// Append `n` padded with trailing `'0'` digits to exactly `width` characters.
///
/// The caller guarantees `n < base^width`.
pub fn encode_fixed(n: u64, base: u8, width: usize, out: &mut Vec<u8>) {
    let start = out.len();
    encode(n, base, out);
    debug_assert!(out.len() - start <= width, "{} does not fit {} digits", n, width);
    while out.len() - start < width {
        out.push(b'0');
    }
}

/// Decode little-endian base-N text.
///
/// Trailing `'0'` padding is accepted at any length. Empty text, characters
/// outside the alphabet, digits not below `base` and values beyond `u64` are
/// rejected.
pub fn decode(text: &[u8], base: u8) -> Result<u64> {
    if text.is_empty() {
        return Err(DnslzError::mismatch("empty base-N field"));
    }
    let radix = base as u64;
    let mut value: u64 = 0;
    // Horner's rule from the most significant (last) digit; padding zeros
    // contribute nothing and never overflow.
    for &c in text.iter().rev() {
        let digit = match digit_value(c) {
            Some(d) if d < base => d as u64,
            _ => {
                return Err(DnslzError::mismatch(format!(
                    "{:?} is not a base-{} digit",
                    c as char, base
                )))
            }
        };
        value = value
            .checked_mul(radix)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| DnslzError::mismatch("base-N value overflows 64 bits"))?;
    }
    Ok(value)
}

/// Number of base-N digits needed to write `n` (at least one).
pub fn digit_count(mut n: u64, base: u8) -> usize {
    let base = base as u64;
    let mut count = 1;
    while n >= base {
        n /= base;
        count += 1;
    }
    count
}
