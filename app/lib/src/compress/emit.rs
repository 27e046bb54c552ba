//! Compressed line writer.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::codec::{write_ip, write_ipv6, NumberFormat};
use crate::config::{CodecConfig, FunctionMask, HIDDEN_FIELD_MAX_WIDTH, REPLACEMENT_MARKER};
use crate::pool::RecordPool;
use crate::record::{AddressRrSet, CompressionRecord, RrElement, RrSet, StringRrSet};

/// Low 32 bits of an IPv6 address that may be written as a delta.
const LOW_BITS: u128 = 0xffff_ffff;

/// Writes one compressed line per record.
#[derive(Debug, Clone, Copy)]
pub(super) struct RecordEmitter {
    functions: FunctionMask,
    format: NumberFormat,
    delimiter: u8,
}

impl RecordEmitter {
    pub(super) fn new(config: &CodecConfig) -> Self {
        Self {
            functions: config.functions,
            format: NumberFormat::for_config(config),
            delimiter: config.packed_delimiter,
        }
    }

    /// Append `record`; `previous` is the record emitted just before it.
    pub(super) fn emit(
        &self,
        record: &CompressionRecord,
        previous: Option<&CompressionRecord>,
        pool: &RecordPool,
        out: &mut Vec<u8>,
    ) {
        let replace = if self.functions.field_replacement() {
            previous
        } else {
            None
        };
        let base = &record.base;

        let timestamp = if self.functions.time_difference() {
            record.timestamp_delta
        } else {
            base.timestamp
        };
        self.format.write(timestamp as u64, out);

        out.push(self.delimiter);
        match replace {
            Some(prev) if prev.client == record.client => out.push(REPLACEMENT_MARKER),
            _ => self.write_endpoint(record.client, out),
        }
        out.push(self.delimiter);
        match replace {
            Some(prev) if prev.server == record.server => out.push(REPLACEMENT_MARKER),
            _ => self.write_endpoint(record.server, out),
        }

        let hide = self.functions.field_hiding()
            && base.qname.len() > HIDDEN_FIELD_MAX_WIDTH
            && record.rcode == 0;
        if !(hide && record.qtype == 1) {
            out.push(self.delimiter);
            self.format.write(record.qtype as u64, out);
        }
        if !hide {
            out.push(self.delimiter);
            self.format.write(record.rcode as u64, out);
        }

        out.push(self.delimiter);
        match replace {
            Some(prev) if prev.base.qname == base.qname => out.push(REPLACEMENT_MARKER),
            _ => out.extend_from_slice(&base.qname),
        }

        let prev_base = replace.map(|p| &p.base);
        self.write_cnames(&base.cnames, prev_base.map(|p| &p.cnames), pool, out);
        self.write_addresses(&base.addr4, prev_base.map(|p| &p.addr4), pool, out);
        self.write_addresses(&base.addr6, prev_base.map(|p| &p.addr6), pool, out);
        out.push(b'\n');
    }

    /// Client or server address: IPv4 as a number under numeric encoding.
    fn write_endpoint(&self, addr: IpAddr, out: &mut Vec<u8>) {
        match addr {
            IpAddr::V4(v4) if self.format.is_base_n() => {
                self.format.write(u32::from(v4) as u64, out)
            }
            _ => write_ip(addr, out),
        }
    }

    /// Write the type tag; returns false when the set was replaced by the
    /// marker and its values must not follow.
    fn write_group_head<T: RrElement>(
        &self,
        set: &RrSet<T>,
        previous: Option<&RrSet<T>>,
        pool: &RecordPool,
        out: &mut Vec<u8>,
    ) -> bool {
        out.push(self.delimiter);
        self.format.write(set.rtype() as u64, out);
        out.push(self.delimiter);
        if previous.is_some_and(|prev| set.same_content(prev, pool)) {
            out.push(REPLACEMENT_MARKER);
            return false;
        }
        self.format.write(set.size() as u64, out);
        true
    }

    fn write_cnames(
        &self,
        set: &StringRrSet,
        previous: Option<&StringRrSet>,
        pool: &RecordPool,
        out: &mut Vec<u8>,
    ) {
        if set.is_empty() || !self.write_group_head(set, previous, pool, out) {
            return;
        }
        for name in set.elements(pool) {
            out.push(self.delimiter);
            out.extend_from_slice(name);
        }
    }

    fn write_addresses(
        &self,
        set: &AddressRrSet,
        previous: Option<&AddressRrSet>,
        pool: &RecordPool,
        out: &mut Vec<u8>,
    ) {
        if set.is_empty() || !self.write_group_head(set, previous, pool, out) {
            return;
        }
        let mut last: Option<IpAddr> = None;
        for answer in set.elements(pool) {
            out.push(self.delimiter);
            let delta_base = if self.functions.address_difference() {
                last
            } else {
                None
            };
            self.write_answer(answer.address, delta_base, out);
            last = Some(answer.address);
        }
    }

    /// One rrset address, as a delta from `prev` when one applies.
    fn write_answer(&self, addr: IpAddr, prev: Option<IpAddr>, out: &mut Vec<u8>) {
        match (prev, addr) {
            (Some(IpAddr::V4(p)), IpAddr::V4(a)) => {
                self.format.write(ipv4_delta(p, a) as u64, out);
            }
            (Some(IpAddr::V6(p)), IpAddr::V6(a)) => match ipv6_delta(p, a) {
                Some(delta) => self.format.write(delta as u64, out),
                None => write_ipv6(a, out),
            },
            _ => self.write_endpoint(addr, out),
        }
    }
}

fn ipv4_delta(prev: Ipv4Addr, addr: Ipv4Addr) -> u32 {
    u32::from(addr).wrapping_sub(u32::from(prev))
}

/// Low-32-bit difference, defined only when the high 96 bits agree.
fn ipv6_delta(prev: Ipv6Addr, addr: Ipv6Addr) -> Option<u32> {
    let (p, a) = (u128::from(prev), u128::from(addr));
    if p & !LOW_BITS != a & !LOW_BITS {
        return None;
    }
    Some((a as u32).wrapping_sub(p as u32))
}
