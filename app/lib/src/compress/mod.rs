//! Compression direction: raw log lines in, manifests and compressed lines out.
//!
//! Records accumulate in a [`Chunk`] until it is full or the stream ends.
//! Address sets are sorted and time deltas computed while parsing; the line
//! sort, both manifests and the record lines are produced at flush.

mod emit;
mod parse;

use std::cmp::Ordering;
use std::io::Write;

use log::debug;

use crate::config::CodecConfig;
use crate::error::Result;
use crate::manifest::{pack_permutation, write_sequence_id, ManifestWriter};
use crate::pipeline::{Pipeline, PipelineStats};
use crate::record::{Chunk, CompressionRecord};
use crate::tokenizer::Row;

use emit::RecordEmitter;
use parse::parse_record;

/// Rows with fewer columns are keep-alives and are skipped.
pub const MIN_RECORD_COLUMNS: usize = 3;

/// Streaming compressor writing to `W`.
pub struct Compressor<W: Write> {
    config: CodecConfig,
    chunk: Chunk<CompressionRecord>,
    emitter: RecordEmitter,
    writer: W,
    buf: Vec<u8>,
    scratch: Vec<u8>,
    positions: Vec<u8>,
    stats: PipelineStats,
}

impl<W: Write> Compressor<W> {
    /// Validate `config` and allocate the chunk.
    pub fn new(config: &CodecConfig, writer: W) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: *config,
            chunk: Chunk::new(config),
            emitter: RecordEmitter::new(config),
            writer,
            buf: Vec::new(),
            scratch: Vec::new(),
            positions: Vec::new(),
            stats: PipelineStats::default(),
        })
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn flush_chunk(&mut self) -> Result<()> {
        let functions = self.config.functions;
        let (records, pool) = self.chunk.parts_mut();
        if functions.line_sorting() {
            records.sort_by(line_order);
        }
        let records: &[CompressionRecord] = records;
        let pool = &*pool;
        self.buf.clear();

        let mut line_entries = 0;
        if functions.line_sorting() {
            let width = self.config.line_manifest_width();
            let mut manifest = ManifestWriter::new(self.config.manifest_wrap(), None);
            for record in records {
                self.scratch.clear();
                let id = record.base.sequence_id;
                write_sequence_id(id, self.config.base, width, &mut self.scratch);
                manifest.push(&self.scratch, &mut self.buf);
            }
            line_entries = manifest.finish(&mut self.buf);
        }

        let mut address_entries = 0;
        if functions.sorts_addresses() {
            let separator = Some(self.config.packed_delimiter);
            let mut manifest = ManifestWriter::new(self.config.manifest_wrap(), separator);
            for record in records {
                for set in [&record.base.addr4, &record.base.addr6] {
                    if set.size() < 2 {
                        continue;
                    }
                    self.positions.clear();
                    self.positions
                        .extend(set.elements(pool).iter().map(|a| a.original_position));
                    self.scratch.clear();
                    pack_permutation(&self.positions, self.config.base, &mut self.scratch);
                    manifest.push(&self.scratch, &mut self.buf);
                }
            }
            address_entries = manifest.finish(&mut self.buf);
        }

        let mut previous = None;
        for record in records {
            self.emitter.emit(record, previous, pool, &mut self.buf);
            previous = Some(record);
        }

        self.writer.write_all(&self.buf)?;
        self.stats.chunks += 1;
        self.stats.bytes_written += self.buf.len() as u64;
        debug!(
            "chunk {}: {} records, {} line-manifest and {} address-manifest entries, \
             {} bytes, {} address / {} string slots",
            self.stats.chunks,
            records.len(),
            line_entries,
            address_entries,
            self.buf.len(),
            pool.addresses_in_use(),
            pool.strings_in_use()
        );
        self.chunk.reset();
        Ok(())
    }
}

/// Reversed query name, then query type, then server address.
fn line_order(a: &CompressionRecord, b: &CompressionRecord) -> Ordering {
    a.base
        .qname
        .iter()
        .rev()
        .cmp(b.base.qname.iter().rev())
        .then(a.qtype.cmp(&b.qtype))
        .then_with(|| a.server.cmp(&b.server))
}

impl<W: Write> Pipeline for Compressor<W> {
    fn process(&mut self, row: &Row<'_>) -> Result<()> {
        self.stats.rows += 1;
        if row.len() < MIN_RECORD_COLUMNS {
            return Ok(());
        }
        parse_record(row, self.chunk.next_slot(), &self.config)?;
        self.chunk.commit();
        self.stats.records += 1;
        if self.chunk.is_full() {
            self.flush_chunk()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<PipelineStats> {
        if !self.chunk.is_empty() {
            self.flush_chunk()?;
        }
        self.writer.flush()?;
        Ok(self.stats)
    }
}
