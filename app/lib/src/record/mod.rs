//! Record model shared by both pipeline directions.
//!
//! A [`DnsRecord`] holds the fields both directions need: sequence id,
//! timestamp, query name and the three rrsets. The compressor and the
//! decompressor extend it with their own field representations and reach the
//! shared part through [`ChunkRecord`].

mod chunk;
mod rrset;

use std::net::{IpAddr, Ipv4Addr};

pub use chunk::{Chunk, Slot};
pub use rrset::{
    AddressRrSet, RrElement, RrSet, StringRrSet, GROUP_TYPE_LIMIT, MAX_ALLOWED_RRSET_SIZE,
    TYPE_A, TYPE_AAAA, TYPE_CNAME,
};

/// Fields common to compression and decompression records.
#[derive(Debug, Clone, Default)]
pub struct DnsRecord {
    /// Arrival index within the chunk.
    pub sequence_id: u32,
    /// Seconds; a delta while time differencing is pending.
    pub timestamp: u32,
    pub qname: Vec<u8>,
    pub cnames: StringRrSet,
    pub addr4: AddressRrSet,
    pub addr6: AddressRrSet,
}

impl DnsRecord {
    /// Zero the rrsets and clear the name, keeping its allocation.
    pub fn clear(&mut self) {
        self.sequence_id = 0;
        self.timestamp = 0;
        self.qname.clear();
        self.cnames.clear();
        self.addr4.clear();
        self.addr6.clear();
    }
}

/// A record type that can live in a [`Chunk`].
pub trait ChunkRecord: Default {
    fn base(&self) -> &DnsRecord;

    fn base_mut(&mut self) -> &mut DnsRecord;

    /// Prepare a reused slot for parsing.
    fn reinitialize(&mut self) {
        self.base_mut().clear();
    }
}

/// Parsed raw log line.
#[derive(Debug, Clone)]
pub struct CompressionRecord {
    pub base: DnsRecord,
    /// Difference to the previous arrival's timestamp, or the absolute value
    /// for the first record of a chunk.
    pub timestamp_delta: u32,
    pub client: IpAddr,
    pub server: IpAddr,
    pub qtype: u16,
    pub rcode: u8,
}

impl Default for CompressionRecord {
    fn default() -> Self {
        Self {
            base: DnsRecord::default(),
            timestamp_delta: 0,
            client: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            server: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            qtype: 0,
            rcode: 0,
        }
    }
}

impl ChunkRecord for CompressionRecord {
    fn base(&self) -> &DnsRecord {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DnsRecord {
        &mut self.base
    }
}

/// Parsed compressed line; numeric and address fields stay as text until
/// emission.
#[derive(Debug, Clone, Default)]
pub struct DecompressionRecord {
    pub base: DnsRecord,
    /// Empty when hidden.
    pub qtype_text: Vec<u8>,
    /// Empty when hidden.
    pub rcode_text: Vec<u8>,
    pub client_text: Vec<u8>,
    pub server_text: Vec<u8>,
}

impl ChunkRecord for DecompressionRecord {
    fn base(&self) -> &DnsRecord {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DnsRecord {
        &mut self.base
    }

    fn reinitialize(&mut self) {
        self.base.clear();
        self.qtype_text.clear();
        self.rcode_text.clear();
        self.client_text.clear();
        self.server_text.clear();
    }
}
