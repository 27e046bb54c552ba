//! Inverse transforms run once per chunk, and raw line emission.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::codec::{
    parse_ip, parse_ipv4, parse_ipv6, write_decimal, write_ip, write_ipv4, NumberFormat,
};
use crate::error::{DnslzError, Result};
use crate::manifest::unpack_permutation;
use crate::pool::RecordPool;
use crate::record::{AddressRrSet, DecompressionRecord};

/// Address family of a staged set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    V4,
    V6,
}

/// Turn every staged address text of the chunk into a binary address.
pub(super) fn resolve_addresses(
    records: &[DecompressionRecord],
    pool: &mut RecordPool,
    format: NumberFormat,
    differences: bool,
) -> Result<()> {
    for record in records {
        resolve_set(&record.base.addr4, Family::V4, pool, format, differences)?;
        resolve_set(&record.base.addr6, Family::V6, pool, format, differences)?;
    }
    Ok(())
}

fn resolve_set(
    set: &AddressRrSet,
    family: Family,
    pool: &mut RecordPool,
    format: NumberFormat,
    differences: bool,
) -> Result<()> {
    let mut last: Option<IpAddr> = None;
    for answer in set.elements_mut(pool) {
        let text = answer.text_staging.as_slice();
        let literal = match family {
            Family::V4 => parse_ipv4(text).map(IpAddr::V4),
            Family::V6 => parse_ipv6(text).map(IpAddr::V6),
        };
        let address = match (literal, last) {
            (Some(address), _) => address,
            (None, Some(prev)) if differences => {
                let delta = format.read_bounded(text, u32::MAX as u64, "address delta")? as u32;
                apply_delta(prev, delta)
            }
            (None, _) if family == Family::V4 && format.is_base_n() => {
                let value = format.read_bounded(text, u32::MAX as u64, "IPv4 address")?;
                IpAddr::V4(Ipv4Addr::from(value as u32))
            }
            (None, _) => {
                return Err(DnslzError::mismatch(format!(
                    "{:?} is neither an address nor a delta from one",
                    String::from_utf8_lossy(text)
                )))
            }
        };
        answer.address = address;
        last = Some(address);
    }
    Ok(())
}

fn apply_delta(prev: IpAddr, delta: u32) -> IpAddr {
    match prev {
        IpAddr::V4(p) => IpAddr::V4(Ipv4Addr::from(u32::from(p).wrapping_add(delta))),
        IpAddr::V6(p) => {
            let bits = u128::from(p);
            let low = (bits as u32).wrapping_add(delta);
            IpAddr::V6(Ipv6Addr::from((bits & !0xffff_ffff) | low as u128))
        }
    }
}

/// Address-manifest entries in emission order.
#[derive(Debug, Default)]
pub(super) struct PermutationQueue {
    text: Vec<u8>,
    ends: Vec<usize>,
}

impl PermutationQueue {
    pub(super) fn push(&mut self, entry: &[u8]) {
        self.text.extend_from_slice(entry);
        self.ends.push(self.text.len());
    }

    pub(super) fn len(&self) -> usize {
        self.ends.len()
    }

    pub(super) fn clear(&mut self) {
        self.text.clear();
        self.ends.clear();
    }

    fn entry(&self, index: usize) -> Option<&[u8]> {
        let end = *self.ends.get(index)?;
        let start = index.checked_sub(1).map_or(0, |i| self.ends[i]);
        Some(&self.text[start..end])
    }

    /// Reorder every multi-element address set of `records`, taken in read
    /// order, by the queued entries; all entries must be used.
    pub(super) fn apply(
        &self,
        records: &[DecompressionRecord],
        pool: &mut RecordPool,
        base: u8,
    ) -> Result<()> {
        let mut next = 0;
        let mut positions = Vec::new();
        for record in records {
            for set in [&record.base.addr4, &record.base.addr6] {
                if set.size() < 2 {
                    continue;
                }
                let entry = self.entry(next).ok_or_else(|| {
                    DnslzError::mismatch(format!("address manifest ends after {} entries", next))
                })?;
                next += 1;
                unpack_permutation(entry, set.size(), base, &mut positions)?;
                for (answer, &position) in set.elements_mut(pool).iter_mut().zip(&positions) {
                    answer.original_position = position;
                }
                set.sort_by_original_position(pool);
            }
        }
        if next != self.len() {
            return Err(DnslzError::mismatch(format!(
                "address manifest has {} entries, chunk used {}",
                self.len(),
                next
            )));
        }
        Ok(())
    }
}

/// Write `record` in the raw column layout.
pub(super) fn emit_raw(
    record: &DecompressionRecord,
    pool: &RecordPool,
    format: NumberFormat,
    delimiter: u8,
    out: &mut Vec<u8>,
) -> Result<()> {
    let base = &record.base;
    write_decimal(base.timestamp as u64, out);
    out.push(delimiter);
    write_endpoint(&record.client_text, format, out)?;
    out.push(delimiter);
    write_endpoint(&record.server_text, format, out)?;

    out.push(delimiter);
    write_number_or(&record.qtype_text, 1, u16::MAX as u64, "query type", format, out)?;
    out.push(delimiter);
    write_number_or(&record.rcode_text, 0, u8::MAX as u64, "response code", format, out)?;
    out.push(delimiter);
    out.extend_from_slice(&base.qname);

    if !base.cnames.is_empty() {
        write_group_head(base.cnames.rtype(), base.cnames.size(), delimiter, out);
        for name in base.cnames.elements(pool) {
            out.push(delimiter);
            out.extend_from_slice(name);
        }
    }
    for set in [&base.addr4, &base.addr6] {
        if set.is_empty() {
            continue;
        }
        write_group_head(set.rtype(), set.size(), delimiter, out);
        for answer in set.elements(pool) {
            out.push(delimiter);
            write_ip(answer.address, out);
        }
    }
    out.push(b'\n');
    Ok(())
}

fn write_group_head(rtype: u8, size: usize, delimiter: u8, out: &mut Vec<u8>) {
    out.push(delimiter);
    write_decimal(rtype as u64, out);
    out.push(delimiter);
    write_decimal(size as u64, out);
}

/// Client or server text: a literal address, or a base-N IPv4 number.
fn write_endpoint(text: &[u8], format: NumberFormat, out: &mut Vec<u8>) -> Result<()> {
    if let Some(address) = parse_ip(text) {
        write_ip(address, out);
        return Ok(());
    }
    if format.is_base_n() && !text.contains(&b':') {
        let value = format.read_bounded(text, u32::MAX as u64, "IPv4 address")?;
        write_ipv4(Ipv4Addr::from(value as u32), out);
        return Ok(());
    }
    Err(DnslzError::mismatch(format!(
        "{:?} is not an address",
        String::from_utf8_lossy(text)
    )))
}

/// Hidden numeric fields are empty and take `default`.
fn write_number_or(
    text: &[u8],
    default: u64,
    max: u64,
    what: &str,
    format: NumberFormat,
    out: &mut Vec<u8>,
) -> Result<()> {
    let value = if text.is_empty() {
        default
    } else {
        format.read_bounded(text, max, what)?
    };
    write_decimal(value, out);
    Ok(())
}
