//! Text codecs every transform depends on.
//!
//! This module converts addresses between text and binary and writes
//! integers as decimal or little-endian base-N text.

pub mod address;
pub mod base_n;
mod number;

pub use address::{parse_ip, parse_ipv4, parse_ipv6, write_ip, write_ipv4, write_ipv6};
pub use number::{parse_canonical_decimal, parse_decimal, write_decimal, NumberFormat};
