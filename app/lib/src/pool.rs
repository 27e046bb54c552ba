//! Chunk-scoped arena for rrset elements.
//!
//! Address records and CNAME strings are handed out as contiguous runs of
//! pre-allocated slots. Nothing is freed individually: [`RecordPool::reset`]
//! rewinds both cursors at chunk flush and bumps the generation, which
//! invalidates every span issued before it. Slot buffers are reused across
//! chunks, so steady-state operation does not allocate.

use std::net::{IpAddr, Ipv4Addr};

use crate::error::{DnslzError, Result};

/// One A/AAAA answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    /// Index of the element in its rrset before any reordering.
    pub original_position: u8,
    /// Binary address.
    pub address: IpAddr,
    /// Compressed text awaiting resolution; decompression side only.
    pub text_staging: Vec<u8>,
}

impl Default for AddressRecord {
    fn default() -> Self {
        Self {
            original_position: 0,
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            text_staging: Vec::new(),
        }
    }
}

/// Types storable in a [`RecordPool`].
pub trait Pooled: Clone + Default {
    /// Pool name used in error messages.
    const KIND: &'static str;

    /// Reinitialize a slot handed out at `index` within its run.
    fn refresh(&mut self, index: u8);

    fn arena(pool: &RecordPool) -> &Arena<Self>;

    fn arena_mut(pool: &mut RecordPool) -> &mut Arena<Self>;
}

impl Pooled for AddressRecord {
    const KIND: &'static str = "address";

    fn refresh(&mut self, index: u8) {
        self.original_position = index;
        self.address = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        self.text_staging.clear();
    }

    fn arena(pool: &RecordPool) -> &Arena<Self> {
        &pool.addresses
    }

    fn arena_mut(pool: &mut RecordPool) -> &mut Arena<Self> {
        &mut pool.addresses
    }
}

impl Pooled for Vec<u8> {
    const KIND: &'static str = "string";

    fn refresh(&mut self, _index: u8) {
        self.clear();
    }

    fn arena(pool: &RecordPool) -> &Arena<Self> {
        &pool.strings
    }

    fn arena_mut(pool: &mut RecordPool) -> &mut Arena<Self> {
        &mut pool.strings
    }
}

/// Handle to a run of pooled slots, valid for one pool generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolSpan {
    start: u32,
    len: u8,
    generation: u32,
}

impl PoolSpan {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn range(&self) -> std::ops::Range<usize> {
        let start = self.start as usize;
        start..start + self.len as usize
    }
}

/// Fixed-capacity slot storage for one element type.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<T>,
    cursor: usize,
}

impl<T: Pooled> Arena<T> {
    fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, T::default);
        Self { slots, cursor: 0 }
    }

    fn claim(&mut self, n: usize) -> Result<usize> {
        if self.cursor + n > self.slots.len() {
            return Err(DnslzError::PoolExhausted {
                kind: T::KIND,
                requested: n,
                capacity: self.slots.len() - self.cursor,
            });
        }
        let start = self.cursor;
        self.cursor += n;
        Ok(start)
    }

    /// Slots currently handed out.
    pub fn in_use(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Arena pair backing every rrset of one chunk.
#[derive(Debug)]
pub struct RecordPool {
    addresses: Arena<AddressRecord>,
    strings: Arena<Vec<u8>>,
    generation: u32,
}

impl RecordPool {
    /// Create a pool with `slots` address records and `slots` strings.
    pub fn with_capacity(slots: usize) -> Self {
        Self {
            addresses: Arena::with_capacity(slots),
            strings: Arena::with_capacity(slots),
            generation: 0,
        }
    }

    /// Current generation; spans from older generations are stale.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Hand out `n` fresh contiguous slots.
    pub fn acquire<T: Pooled>(&mut self, n: u8) -> Result<PoolSpan> {
        let generation = self.generation;
        let arena = T::arena_mut(self);
        let start = arena.claim(n as usize)?;
        for (i, slot) in arena.slots[start..start + n as usize].iter_mut().enumerate() {
            slot.refresh(i as u8);
        }
        Ok(PoolSpan {
            start: start as u32,
            len: n,
            generation,
        })
    }

    /// Copy the slots of `span` into a fresh run.
    pub fn duplicate<T: Pooled>(&mut self, span: PoolSpan) -> Result<PoolSpan> {
        self.check(span);
        let generation = self.generation;
        let arena = T::arena_mut(self);
        let start = arena.claim(span.len())?;
        // fresh runs always lie past every issued one
        let (issued, fresh) = arena.slots.split_at_mut(start);
        for (dst, src) in fresh.iter_mut().zip(&issued[span.range()]) {
            dst.clone_from(src);
        }
        Ok(PoolSpan {
            start: start as u32,
            len: span.len,
            generation,
        })
    }

    /// Slots of `span`.
    pub fn get<T: Pooled>(&self, span: PoolSpan) -> &[T] {
        self.check(span);
        &T::arena(self).slots[span.range()]
    }

    /// Mutable slots of `span`.
    pub fn get_mut<T: Pooled>(&mut self, span: PoolSpan) -> &mut [T] {
        self.check(span);
        &mut T::arena_mut(self).slots[span.range()]
    }

    pub fn addresses_in_use(&self) -> usize {
        self.addresses.in_use()
    }

    pub fn strings_in_use(&self) -> usize {
        self.strings.in_use()
    }

    /// Rewind both arenas; every previously issued span becomes invalid.
    pub fn reset(&mut self) {
        self.addresses.cursor = 0;
        self.strings.cursor = 0;
        self.generation = self.generation.wrapping_add(1);
    }

    #[inline]
    fn check(&self, span: PoolSpan) {
        debug_assert!(
            span.is_empty() || span.generation == self.generation,
            "stale pool span from generation {} (current {})",
            span.generation,
            self.generation
        );
    }
}
