//! Fixed-capacity record batch.

use crate::config::CodecConfig;
use crate::pool::RecordPool;

use super::ChunkRecord;

/// Records buffered between flushes, plus the pool backing their rrsets.
///
/// The record array is allocated once; slots are reinitialized on reuse.
#[derive(Debug)]
pub struct Chunk<R> {
    records: Vec<R>,
    len: usize,
    pool: RecordPool,
}

/// The next free record together with its predecessor in arrival order.
pub struct Slot<'a, R> {
    pub previous: Option<&'a R>,
    pub current: &'a mut R,
    pub pool: &'a mut RecordPool,
}

impl<R: ChunkRecord> Chunk<R> {
    pub fn new(config: &CodecConfig) -> Self {
        let mut records = Vec::with_capacity(config.chunk_capacity);
        records.resize_with(config.chunk_capacity, R::default);
        Self {
            records,
            len: 0,
            pool: RecordPool::with_capacity(config.pool_slots()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.records.len()
    }

    /// Reinitialize the next free slot and hand it out.
    ///
    /// The slot only becomes part of the chunk after [`Chunk::commit`].
    pub fn next_slot(&mut self) -> Slot<'_, R> {
        debug_assert!(!self.is_full(), "next_slot on a full chunk");
        let (done, rest) = self.records.split_at_mut(self.len);
        let current = &mut rest[0];
        current.reinitialize();
        current.base_mut().sequence_id = self.len as u32;
        Slot {
            previous: done.last(),
            current,
            pool: &mut self.pool,
        }
    }

    pub fn commit(&mut self) {
        self.len += 1;
    }

    /// Committed records.
    pub fn records(&self) -> &[R] {
        &self.records[..self.len]
    }

    /// Committed records and the pool, borrowed together.
    pub fn parts_mut(&mut self) -> (&mut [R], &mut RecordPool) {
        (&mut self.records[..self.len], &mut self.pool)
    }

    pub fn pool(&self) -> &RecordPool {
        &self.pool
    }

    /// Forget every record and invalidate every pooled element.
    pub fn reset(&mut self) {
        self.len = 0;
        self.pool.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CompressionRecord, StringRrSet, TYPE_CNAME};

    fn small_config() -> CodecConfig {
        CodecConfig {
            chunk_capacity: 3,
            ..CodecConfig::default()
        }
    }

    #[test]
    fn test_slots_chain_previous() {
        let mut chunk: Chunk<CompressionRecord> = Chunk::new(&small_config());
        assert_eq!(chunk.capacity(), 3);

        let slot = chunk.next_slot();
        assert!(slot.previous.is_none());
        slot.current.base.qname.extend_from_slice(b"example.com");
        chunk.commit();

        let slot = chunk.next_slot();
        assert_eq!(slot.previous.unwrap().base.qname, b"example.com");
        assert_eq!(slot.current.base.sequence_id, 1);
        chunk.commit();

        assert_eq!(chunk.len(), 2);
        assert!(!chunk.is_full());
    }

    #[test]
    fn test_reset_reinitializes_slots() {
        let mut chunk: Chunk<CompressionRecord> = Chunk::new(&small_config());
        let slot = chunk.next_slot();
        slot.current.base.qname.extend_from_slice(b"stale.example");
        slot.current.base.cnames = StringRrSet::allocate(slot.pool, TYPE_CNAME, 2).unwrap();
        chunk.commit();
        assert_eq!(chunk.pool().strings_in_use(), 2);

        chunk.reset();
        assert!(chunk.is_empty());
        assert_eq!(chunk.pool().strings_in_use(), 0);

        let slot = chunk.next_slot();
        assert!(slot.current.base.qname.is_empty());
        assert!(slot.current.base.cnames.is_empty());
    }

    #[test]
    fn test_uncommitted_slot_is_not_visible() {
        let mut chunk: Chunk<CompressionRecord> = Chunk::new(&small_config());
        chunk.next_slot().current.base.timestamp = 7;
        assert!(chunk.records().is_empty());
    }
}
