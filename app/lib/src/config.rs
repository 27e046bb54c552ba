//! Configuration shared by the compressor and the decompressor.
//!
//! A compression run and the decompression run that undoes it must use the
//! same function mask, base and chunk capacity.

use std::fmt;
use std::ops::BitOr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DnslzError, Result};

/// Smallest supported base for the base-N integer text codec.
pub const MIN_BASE: u8 = 2;

/// Largest supported base for the base-N integer text codec.
pub const MAX_BASE: u8 = 61;

/// Default base-N radix.
pub const DEFAULT_BASE: u8 = 32;

/// Default number of records buffered per chunk.
pub const DEFAULT_CHUNK_CAPACITY: usize = 30_000;

/// Default average number of pooled rrset elements per record.
pub const DEFAULT_RRSET_FANOUT: usize = 7;

/// Fewest slots in each pool, whatever the chunk capacity.
///
/// Holds 1280 records that each carry full A and AAAA sets, so small chunks
/// never run out where a larger chunk of the same records would not.
pub const MIN_POOL_SLOTS: usize = DEFAULT_CHUNK_CAPACITY * DEFAULT_RRSET_FANOUT;

/// Default tokenizer buffer size.
pub const DEFAULT_LINE_BUFFER_SIZE: usize = 4096 + 512;

/// Smallest tokenizer buffer accepted by [`CodecConfig::validate`].
///
/// Half of it must hold the longest address-manifest entry (82 fixed-width
/// groups at base 2).
pub const MIN_LINE_BUFFER_SIZE: usize = 1024;

/// Marker written in place of a field equal to the previous record's field.
pub const REPLACEMENT_MARKER: u8 = b'-';

/// Line terminating each manifest block.
pub const MANIFEST_END: &[u8] = b"-end-";

/// Query names longer than this allow query type and response code to be hidden.
///
/// Emitted query type and response code texts never exceed this width, which
/// is what lets the decoder tell a hidden field from a present one.
pub const HIDDEN_FIELD_MAX_WIDTH: usize = 5;

/// Bitset selecting the active transforms.
///
/// Serialized as a plain integer; bits outside [`FunctionMask::ALL`] are dropped.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct FunctionMask(u8);

impl FunctionMask {
    /// No transform at all: the output is the canonicalized input.
    pub const NONE: Self = Self(0x00);
    /// Reorder records inside a chunk by reversed query name.
    pub const LINE_SORTING: Self = Self(0x01);
    /// Sort A/AAAA rrset elements by address.
    pub const ADDRESS_SORTING: Self = Self(0x02);
    /// Write rrset addresses as deltas from the previous element.
    pub const ADDRESS_DIFFERENCE: Self = Self(0x04);
    /// Write timestamps as deltas from the previous record.
    pub const TIME_DIFFERENCE: Self = Self(0x08);
    /// Omit query type and response code when they hold the common default.
    pub const FIELD_HIDING: Self = Self(0x10);
    /// Replace fields equal to the previous record's with a marker.
    pub const FIELD_REPLACEMENT: Self = Self(0x20);
    /// Write integers in base-N text instead of decimal.
    pub const NUMERIC_ENCODING: Self = Self(0x40);
    /// Every transform.
    pub const ALL: Self = Self(0x7F);

    /// Build a mask from raw bits, dropping unknown ones.
    pub const fn from_bits(bits: u32) -> Self {
        Self((bits & Self::ALL.0 as u32) as u8)
    }

    /// Raw bits of the mask.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Mask with the bits of `other` cleared.
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Check whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn line_sorting(self) -> bool {
        self.contains(Self::LINE_SORTING)
    }

    pub const fn address_difference(self) -> bool {
        self.contains(Self::ADDRESS_DIFFERENCE)
    }

    /// Address sets are sorted, and an address manifest written, whenever
    /// either address transform is active.
    pub const fn sorts_addresses(self) -> bool {
        self.0 & (Self::ADDRESS_SORTING.0 | Self::ADDRESS_DIFFERENCE.0) != 0
    }

    pub const fn time_difference(self) -> bool {
        self.contains(Self::TIME_DIFFERENCE)
    }

    pub const fn field_hiding(self) -> bool {
        self.contains(Self::FIELD_HIDING)
    }

    pub const fn field_replacement(self) -> bool {
        self.contains(Self::FIELD_REPLACEMENT)
    }

    pub const fn numeric_encoding(self) -> bool {
        self.contains(Self::NUMERIC_ENCODING)
    }
}

impl Default for FunctionMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for FunctionMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<u32> for FunctionMask {
    fn from(bits: u32) -> Self {
        Self::from_bits(bits)
    }
}

impl From<FunctionMask> for u32 {
    fn from(mask: FunctionMask) -> Self {
        mask.0 as u32
    }
}

impl fmt::Debug for FunctionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionMask(0x{:02x})", self.0)
    }
}

/// Process-wide settings, fixed for the lifetime of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Active transforms.
    pub functions: FunctionMask,

    /// Radix of the base-N integer text codec (2..=61).
    pub base: u8,

    /// Records buffered, transformed and flushed together.
    pub chunk_capacity: usize,

    /// Average pooled rrset elements per record; each pool holds
    /// `chunk_capacity * rrset_fanout` slots, and never fewer than
    /// [`MIN_POOL_SLOTS`].
    pub rrset_fanout: usize,

    /// Tokenizer buffer size; bounds the length of any single line.
    pub line_buffer_size: usize,

    /// Field delimiter of raw log lines.
    pub raw_delimiter: u8,

    /// Field delimiter of compressed lines.
    pub packed_delimiter: u8,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            functions: FunctionMask::ALL,
            base: DEFAULT_BASE,
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            rrset_fanout: DEFAULT_RRSET_FANOUT,
            line_buffer_size: DEFAULT_LINE_BUFFER_SIZE,
            raw_delimiter: b'\t',
            packed_delimiter: b'\t',
        }
    }
}

impl CodecConfig {
    /// Default configuration with the given function mask.
    pub fn with_functions(functions: FunctionMask) -> Self {
        Self {
            functions,
            ..Self::default()
        }
    }

    /// Parse a JSON configuration; missing keys take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| DnslzError::InvalidConfig(format!("JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check every field and the combinations the wire format cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_BASE..=MAX_BASE).contains(&self.base) {
            return Err(DnslzError::InvalidConfig(format!(
                "base {} outside {}..={}",
                self.base, MIN_BASE, MAX_BASE
            )));
        }
        if self.chunk_capacity == 0 || self.chunk_capacity > u32::MAX as usize {
            return Err(DnslzError::InvalidConfig(format!(
                "chunk capacity {} out of range",
                self.chunk_capacity
            )));
        }
        if self.rrset_fanout == 0 {
            return Err(DnslzError::InvalidConfig("rrset fanout must be positive".into()));
        }
        match self.chunk_capacity.checked_mul(self.rrset_fanout) {
            Some(slots) if slots <= u32::MAX as usize => {}
            _ => {
                return Err(DnslzError::InvalidConfig(format!(
                    "pool of {} x {} slots too large",
                    self.chunk_capacity, self.rrset_fanout
                )))
            }
        }
        if self.line_buffer_size < MIN_LINE_BUFFER_SIZE {
            return Err(DnslzError::InvalidConfig(format!(
                "line buffer of {} bytes below minimum {}",
                self.line_buffer_size, MIN_LINE_BUFFER_SIZE
            )));
        }
        if self.raw_delimiter == b'\n' || self.packed_delimiter == b'\n' {
            return Err(DnslzError::InvalidConfig("delimiter cannot be a newline".into()));
        }
        let d = self.packed_delimiter;
        if d.is_ascii_alphanumeric() || matches!(d, REPLACEMENT_MARKER | b'.' | b':') {
            return Err(DnslzError::InvalidConfig(format!(
                "packed delimiter {:?} collides with field text",
                d as char
            )));
        }
        if self.functions.field_hiding() && self.functions.numeric_encoding() && self.base < 10 {
            return Err(DnslzError::InvalidConfig(format!(
                "field hiding (0x10) cannot be combined with numeric encoding \
                 below base 10 (got base {}); clear 0x10 from the mask or use base >= 10",
                self.base
            )));
        }
        Ok(())
    }

    /// Width of one line-manifest group: `ceil(log_base(capacity)) + 1` digits.
    pub fn line_manifest_width(&self) -> usize {
        let base = self.base.max(MIN_BASE) as u128;
        let capacity = self.chunk_capacity as u128;
        let mut digits = 0;
        let mut reach: u128 = 1;
        while reach < capacity {
            reach *= base;
            digits += 1;
        }
        digits + 1
    }

    /// Slots in each of the address and string pools.
    ///
    /// Never fewer than [`MIN_POOL_SLOTS`].
    pub fn pool_slots(&self) -> usize {
        self.chunk_capacity
            .saturating_mul(self.rrset_fanout)
            .max(MIN_POOL_SLOTS)
    }

    /// Tokenizer buffer for compressed input.
    ///
    /// Base-N and delta text may be longer than the raw field it replaces:
    /// `1.0.0.0` becomes `16777216` in decimal and 25 digits in base 2.
    pub fn packed_line_buffer_size(&self) -> usize {
        let factor = if self.functions.numeric_encoding() && self.base < 10 {
            4
        } else {
            2
        };
        self.line_buffer_size.saturating_mul(factor)
    }

    /// Longest manifest line written before wrapping.
    pub(crate) fn manifest_wrap(&self) -> usize {
        self.line_buffer_size / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CodecConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.functions, FunctionMask::ALL);
        assert_eq!(config.base, 32);
        assert_eq!(config.chunk_capacity, 30_000);
    }

    #[test]
    fn test_line_manifest_width() {
        // 32^3 = 32768 >= 30000
        assert_eq!(CodecConfig::default().line_manifest_width(), 4);

        let config = CodecConfig {
            base: 10,
            chunk_capacity: 1000,
            ..CodecConfig::default()
        };
        assert_eq!(config.line_manifest_width(), 4);

        let config = CodecConfig {
            chunk_capacity: 1,
            ..CodecConfig::default()
        };
        assert_eq!(config.line_manifest_width(), 1);
    }

    #[test]
    fn test_pool_slots_floor() {
        let config = CodecConfig {
            chunk_capacity: 2,
            ..CodecConfig::default()
        };
        assert_eq!(config.pool_slots(), 210_000);
        assert_eq!(CodecConfig::default().pool_slots(), 210_000);

        let config = CodecConfig {
            chunk_capacity: 50_000,
            ..CodecConfig::default()
        };
        assert_eq!(config.pool_slots(), 350_000);

        // a chunk of records with full A and AAAA sets fits at small capacities
        let config = CodecConfig {
            chunk_capacity: 1000,
            ..CodecConfig::default()
        };
        let per_record = 2 * crate::record::MAX_ALLOWED_RRSET_SIZE;
        assert!(config.pool_slots() >= config.chunk_capacity * per_record);
    }

    #[test]
    fn test_small_line_buffer_rejected() {
        let config = CodecConfig {
            line_buffer_size: 512,
            ..CodecConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_drops_unknown_bits() {
        assert_eq!(FunctionMask::from_bits(0xFF), FunctionMask::ALL);
        assert_eq!(FunctionMask::from_bits(0x103).bits(), 0x03);
    }

    #[test]
    fn test_mask_address_sorting_implied_by_difference() {
        assert!(FunctionMask::ADDRESS_DIFFERENCE.sorts_addresses());
        assert!(FunctionMask::ADDRESS_SORTING.sorts_addresses());
        assert!(!FunctionMask::LINE_SORTING.sorts_addresses());
    }

    #[test]
    fn test_invalid_base() {
        let config = CodecConfig {
            base: 62,
            ..CodecConfig::default()
        };
        assert!(matches!(config.validate(), Err(DnslzError::InvalidConfig(_))));
    }

    #[test]
    fn test_hiding_with_small_base_rejected() {
        let config = CodecConfig {
            base: 8,
            ..CodecConfig::default()
        };
        match config.validate() {
            Err(DnslzError::InvalidConfig(reason)) => {
                assert!(reason.contains("0x10"), "{}", reason);
                assert!(reason.contains("base 8"), "{}", reason);
            }
            other => panic!("expected InvalidConfig, got {:?}", other),
        }

        let config = CodecConfig {
            base: 8,
            functions: FunctionMask::ALL.without(FunctionMask::FIELD_HIDING),
            ..CodecConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_packed_delimiter_collision() {
        let config = CodecConfig {
            packed_delimiter: b'-',
            ..CodecConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CodecConfig {
            packed_delimiter: b' ',
            ..CodecConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = CodecConfig::from_json(r#"{"functions": 3, "base": 36}"#).unwrap();
        assert_eq!(config.functions.bits(), 0x03);
        assert_eq!(config.base, 36);
        assert_eq!(config.chunk_capacity, DEFAULT_CHUNK_CAPACITY);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{"chunk_capacity": 500, "functions": 255}"#)
            .unwrap();
        let config = CodecConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.chunk_capacity, 500);
        assert_eq!(config.functions, FunctionMask::ALL);

        assert!(matches!(
            CodecConfig::from_json_file("/nonexistent/dnslz.json"),
            Err(DnslzError::Io(_))
        ));
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(CodecConfig::from_json(r#"{"base": 1}"#).is_err());
        assert!(CodecConfig::from_json("not json").is_err());
    }
}
