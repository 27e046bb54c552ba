//! Manifest blocks written ahead of each chunk's records.
//!
//! The line manifest lists each emitted record's arrival index as fixed-width
//! base-N groups. The address manifest lists, for each A/AAAA set with more
//! than one element, the original positions of its sorted elements packed
//! into one base-N entry. Both blocks wrap at a configured width and end with
//! a [`MANIFEST_END`] line. Manifests use base-N whatever the numeric-encoding
//! setting.

use crate::codec::base_n;
use crate::config::MANIFEST_END;
use crate::error::{DnslzError, Result};
use crate::record::MAX_ALLOWED_RRSET_SIZE;

/// Largest set packed as 2-bit positions.
const TWO_BIT_MAX: usize = 4;

/// Largest set packed as 4-bit positions.
const FOUR_BIT_MAX: usize = 16;

/// Line-wrapping writer for one manifest block.
#[derive(Debug)]
pub struct ManifestWriter {
    wrap: usize,
    separator: Option<u8>,
    line_len: usize,
    entries: usize,
}

impl ManifestWriter {
    /// Entries are joined by `separator`, or concatenated when it is `None`.
    pub fn new(wrap: usize, separator: Option<u8>) -> Self {
        Self {
            wrap,
            separator,
            line_len: 0,
            entries: 0,
        }
    }

    /// Append one entry, breaking the line first if it would overflow.
    ///
    /// Entries are never split; an entry wider than the wrap gets a line of
    /// its own.
    pub fn push(&mut self, entry: &[u8], out: &mut Vec<u8>) {
        if self.line_len > 0 {
            let joint = usize::from(self.separator.is_some());
            if self.line_len + joint + entry.len() > self.wrap {
                out.push(b'\n');
                self.line_len = 0;
            } else if let Some(sep) = self.separator {
                out.push(sep);
                self.line_len += 1;
            }
        }
        out.extend_from_slice(entry);
        self.line_len += entry.len();
        self.entries += 1;
    }

    /// Close the block; returns the number of entries written.
    pub fn finish(self, out: &mut Vec<u8>) -> usize {
        if self.line_len > 0 {
            out.push(b'\n');
        }
        out.extend_from_slice(MANIFEST_END);
        out.push(b'\n');
        self.entries
    }
}

/// Append the arrival index `id` as one fixed-width line-manifest group.
pub fn write_sequence_id(id: u32, base: u8, width: usize, out: &mut Vec<u8>) {
    base_n::encode_fixed(id as u64, base, width, out);
}

/// Decode one line-manifest line into `ids`.
pub fn read_sequence_ids(text: &[u8], base: u8, width: usize, ids: &mut Vec<u32>) -> Result<()> {
    if text.is_empty() || text.len() % width != 0 {
        return Err(DnslzError::mismatch(format!(
            "line manifest line of {} characters is not a multiple of {}",
            text.len(),
            width
        )));
    }
    for group in text.chunks(width) {
        let id = base_n::decode(group, base)?;
        let id = u32::try_from(id)
            .map_err(|_| DnslzError::mismatch(format!("sequence id {} out of range", id)))?;
        ids.push(id);
    }
    Ok(())
}

/// Append the packed form of `positions`, the original index of each element
/// in sorted order.
pub fn pack_permutation(positions: &[u8], base: u8, out: &mut Vec<u8>) {
    let size = positions.len();
    if size <= FOUR_BIT_MAX {
        let bits = if size <= TWO_BIT_MAX { 2 } else { 4 };
        let packed = positions
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, &p)| acc | (p as u64) << (bits * i));
        base_n::encode(packed, base, out);
    } else {
        let width = base_n::digit_count(size as u64, base);
        for &p in positions {
            base_n::encode_fixed(p as u64, base, width, out);
        }
    }
}

/// Decode a packed permutation for a set of `size` elements into `positions`.
///
/// Fails unless the result is a permutation of `0..size`.
pub fn unpack_permutation(
    text: &[u8],
    size: usize,
    base: u8,
    positions: &mut Vec<u8>,
) -> Result<()> {
    positions.clear();
    if size == 0 || size > MAX_ALLOWED_RRSET_SIZE {
        return Err(DnslzError::mismatch(format!(
            "no permutation for a set of {} elements",
            size
        )));
    }

    if size <= FOUR_BIT_MAX {
        let bits = if size <= TWO_BIT_MAX { 2 } else { 4 };
        let mask = (1u64 << bits) - 1;
        let packed = base_n::decode(text, base)?;
        if packed.checked_shr((bits * size) as u32).unwrap_or(0) != 0 {
            return Err(DnslzError::mismatch(format!(
                "permutation entry {} too wide for {} elements",
                packed, size
            )));
        }
        positions.extend((0..size).map(|i| ((packed >> (bits * i)) & mask) as u8));
    } else {
        let width = base_n::digit_count(size as u64, base);
        if text.len() != width * size {
            return Err(DnslzError::mismatch(format!(
                "permutation entry of {} characters, expected {}",
                text.len(),
                width * size
            )));
        }
        for group in text.chunks(width) {
            let p = base_n::decode(group, base)?;
            positions.push(u8::try_from(p).unwrap_or(u8::MAX));
        }
    }

    let mut seen = [false; MAX_ALLOWED_RRSET_SIZE];
    for &p in positions.iter() {
        let p = p as usize;
        if p >= size || seen[p] {
            return Err(DnslzError::mismatch(format!(
                "permutation entry is not a permutation of {} elements",
                size
            )));
        }
        seen[p] = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(positions: &[u8], base: u8) -> Vec<u8> {
        let mut out = Vec::new();
        pack_permutation(positions, base, &mut out);
        out
    }

    fn unpacked(text: &[u8], size: usize, base: u8) -> Result<Vec<u8>> {
        let mut positions = Vec::new();
        unpack_permutation(text, size, base, &mut positions)?;
        Ok(positions)
    }

    #[test]
    fn test_two_bit_packing() {
        // 2 | 0 << 2 | 1 << 4 = 18
        assert_eq!(packed(&[2, 0, 1], 10), b"81");
        assert_eq!(unpacked(b"81", 3, 10).unwrap(), vec![2, 0, 1]);
    }

    #[test]
    fn test_four_bit_packing_sixteen_elements() {
        let positions: Vec<u8> = (0..16).rev().collect();
        let text = packed(&positions, 61);
        assert_eq!(unpacked(&text, 16, 61).unwrap(), positions);
    }

    #[test]
    fn test_fixed_width_packing() {
        let positions: Vec<u8> = (0..82).map(|i| (i * 5 % 82) as u8).collect();
        let text = packed(&positions, 32);
        assert_eq!(text.len(), 82 * 2);
        assert_eq!(unpacked(&text, 82, 32).unwrap(), positions);
    }

    #[test]
    fn test_rejects_non_permutation() {
        // positions [1, 1]
        assert!(unpacked(&packed(&[1, 1], 32), 2, 32).is_err());
        // value wider than two elements allow
        assert!(unpacked(b"v", 2, 32).is_err());
        assert!(unpacked(b"0", 0, 32).is_err());
    }

    #[test]
    fn test_writer_wraps_between_entries() {
        let mut out = Vec::new();
        let mut writer = ManifestWriter::new(8, Some(b'\t'));
        for entry in [&b"abc"[..], b"de", b"fghij", b"k"] {
            writer.push(entry, &mut out);
        }
        assert_eq!(writer.finish(&mut out), 4);
        assert_eq!(out, b"abc\tde\nfghij\tk\n-end-\n");
    }

    #[test]
    fn test_writer_concatenates_groups() {
        let mut out = Vec::new();
        let mut writer = ManifestWriter::new(6, None);
        let mut group = Vec::new();
        for id in [3u32, 0, 1, 2] {
            group.clear();
            write_sequence_id(id, 10, 2, &mut group);
            writer.push(&group, &mut out);
        }
        writer.finish(&mut out);
        assert_eq!(out, b"300010\n20\n-end-\n");

        let mut ids = Vec::new();
        read_sequence_ids(b"300010", 10, 2, &mut ids).unwrap();
        read_sequence_ids(b"20", 10, 2, &mut ids).unwrap();
        assert_eq!(ids, vec![3, 0, 1, 2]);
    }

    #[test]
    fn test_empty_block_has_no_blank_line() {
        let mut out = Vec::new();
        assert_eq!(ManifestWriter::new(8, None).finish(&mut out), 0);
        assert_eq!(out, b"-end-\n");
    }

    #[test]
    fn test_ragged_line_manifest_rejected() {
        let mut ids = Vec::new();
        assert!(read_sequence_ids(b"300", 10, 2, &mut ids).is_err());
    }
}
