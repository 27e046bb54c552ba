//! Resource-record sets backed by the chunk pool.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use crate::error::Result;
use crate::pool::{AddressRecord, PoolSpan, Pooled, RecordPool};

/// Largest rrset a record may carry.
pub const MAX_ALLOWED_RRSET_SIZE: usize = 82;

/// Group type of IPv4 answers.
pub const TYPE_A: u8 = 1;

/// Group type of IPv6 answers.
pub const TYPE_AAAA: u8 = 28;

/// Group type conventionally used for CNAME answers.
pub const TYPE_CNAME: u8 = 5;

/// Group types must be below this value.
pub const GROUP_TYPE_LIMIT: u8 = 47;

/// Pooled rrset element with a notion of answer equality.
pub trait RrElement: Pooled {
    /// Check whether two elements carry the same answer.
    fn same_answer(&self, other: &Self) -> bool;
}

impl RrElement for Vec<u8> {
    fn same_answer(&self, other: &Self) -> bool {
        self == other
    }
}

impl RrElement for AddressRecord {
    fn same_answer(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

/// A typed run of pooled elements: `{type, size}` plus a pool handle.
pub struct RrSet<T> {
    rtype: u8,
    span: PoolSpan,
    _marker: PhantomData<fn() -> T>,
}

/// CNAME values.
pub type StringRrSet = RrSet<Vec<u8>>;

/// A or AAAA values.
pub type AddressRrSet = RrSet<AddressRecord>;

impl<T> Clone for RrSet<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RrSet<T> {}

impl<T> Default for RrSet<T> {
    fn default() -> Self {
        Self {
            rtype: 0,
            span: PoolSpan::default(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for RrSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RrSet")
            .field("type", &self.rtype)
            .field("size", &self.span.len())
            .finish()
    }
}

impl<T: RrElement> RrSet<T> {
    /// Acquire `size` fresh pool slots for a set of type `rtype`.
    pub fn allocate(pool: &mut RecordPool, rtype: u8, size: u8) -> Result<Self> {
        debug_assert!(size as usize <= MAX_ALLOWED_RRSET_SIZE);
        Ok(Self {
            rtype,
            span: pool.acquire::<T>(size)?,
            _marker: PhantomData,
        })
    }

    /// Deep copy into fresh slots of the current pool generation.
    pub fn duplicate(&self, pool: &mut RecordPool) -> Result<Self> {
        Ok(Self {
            rtype: self.rtype,
            span: pool.duplicate::<T>(self.span)?,
            _marker: PhantomData,
        })
    }

    pub fn rtype(&self) -> u8 {
        self.rtype
    }

    pub fn size(&self) -> usize {
        self.span.len()
    }

    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }

    /// Drop the elements; the slots stay in the pool until its reset.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn elements<'p>(&self, pool: &'p RecordPool) -> &'p [T] {
        pool.get::<T>(self.span)
    }

    pub fn elements_mut<'p>(&self, pool: &'p mut RecordPool) -> &'p mut [T] {
        pool.get_mut::<T>(self.span)
    }

    /// Same type, size and answers in the same order.
    pub fn same_content(&self, other: &Self, pool: &RecordPool) -> bool {
        self.rtype == other.rtype
            && self.size() == other.size()
            && self
                .elements(pool)
                .iter()
                .zip(other.elements(pool))
                .all(|(a, b)| a.same_answer(b))
    }
}

impl AddressRrSet {
    /// Sort ascending by raw address bytes; positions travel with elements.
    pub fn sort_by_address(&self, pool: &mut RecordPool) {
        self.elements_mut(pool)
            .sort_by(|a, b| compare_address_bytes(a, b));
    }

    /// Restore the order recorded in `original_position`.
    pub fn sort_by_original_position(&self, pool: &mut RecordPool) {
        self.elements_mut(pool)
            .sort_unstable_by_key(|r| r.original_position);
    }
}

fn compare_address_bytes(a: &AddressRecord, b: &AddressRecord) -> Ordering {
    // IpAddr orders IPv4 before IPv6 and each family by network byte order.
    a.address.cmp(&b.address)
}
