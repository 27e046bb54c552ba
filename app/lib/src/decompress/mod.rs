//! Decompression direction: manifests and compressed lines in, raw log lines
//! out.
//!
//! Each chunk is read as up to two manifest blocks followed by its records.
//! Once the chunk is complete its staged addresses are resolved, address sets
//! and lines are put back in their original order, timestamps are rebuilt and
//! the records are written in the raw layout.

mod parse;
mod restore;

use std::io::Write;

use log::{debug, trace};

use crate::codec::NumberFormat;
use crate::compress::MIN_RECORD_COLUMNS;
use crate::config::{CodecConfig, MANIFEST_END};
use crate::error::{DnslzError, Result};
use crate::manifest::read_sequence_ids;
use crate::pipeline::{Pipeline, PipelineStats};
use crate::record::{Chunk, DecompressionRecord};
use crate::tokenizer::Row;

use parse::RecordParser;
use restore::{emit_raw, resolve_addresses, PermutationQueue};

/// Where the decompressor is within the current chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    LineManifest,
    AddressManifest,
    Records,
}

/// Streaming decompressor writing to `W`.
pub struct Decompressor<W: Write> {
    config: CodecConfig,
    format: NumberFormat,
    parser: RecordParser,
    chunk: Chunk<DecompressionRecord>,
    stage: Stage,
    /// A manifest block was completed for the pending chunk.
    manifest_read: bool,
    /// Rows consumed by an unfinished manifest block.
    manifest_rows: u64,
    sequence_ids: Vec<u32>,
    permutations: PermutationQueue,
    writer: W,
    buf: Vec<u8>,
    stats: PipelineStats,
}

impl<W: Write> Decompressor<W> {
    /// Validate `config` and allocate the chunk.
    pub fn new(config: &CodecConfig, writer: W) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: *config,
            format: NumberFormat::for_config(config),
            parser: RecordParser::new(config),
            chunk: Chunk::new(config),
            stage: Self::first_stage(config),
            manifest_read: false,
            manifest_rows: 0,
            sequence_ids: Vec::new(),
            permutations: PermutationQueue::default(),
            writer,
            buf: Vec::new(),
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

    fn first_stage(config: &CodecConfig) -> Stage {
        if config.functions.line_sorting() {
            Stage::LineManifest
        } else if config.functions.sorts_addresses() {
            Stage::AddressManifest
        } else {
            Stage::Records
        }
    }

    /// Records the pending chunk holds once complete.
    fn expected_records(&self) -> usize {
        if self.config.functions.line_sorting() {
            self.sequence_ids.len()
        } else {
            self.chunk.capacity()
        }
    }

    fn read_line_manifest(&mut self, row: &Row<'_>) -> Result<()> {
        if !row.is_single(MANIFEST_END) {
            self.manifest_rows += 1;
            let width = self.config.line_manifest_width();
            for column in row.columns() {
                read_sequence_ids(column, self.config.base, width, &mut self.sequence_ids)?;
            }
            return Ok(());
        }

        let count = self.sequence_ids.len();
        if count == 0 || count > self.chunk.capacity() {
            return Err(DnslzError::mismatch(format!(
                "line manifest lists {} records, chunk capacity is {}",
                count,
                self.chunk.capacity()
            )));
        }
        trace!("line manifest: {} entries", count);
        self.finish_manifest(if self.config.functions.sorts_addresses() {
            Stage::AddressManifest
        } else {
            Stage::Records
        });
        Ok(())
    }

    fn read_address_manifest(&mut self, row: &Row<'_>) -> Result<()> {
        if !row.is_single(MANIFEST_END) {
            self.manifest_rows += 1;
            for column in row.columns() {
                if column.is_empty() {
                    return Err(DnslzError::mismatch(format!(
                        "line {}: empty address-manifest entry",
                        row.line_number()
                    )));
                }
                self.permutations.push(column);
            }
            return Ok(());
        }
        trace!("address manifest: {} entries", self.permutations.len());
        self.finish_manifest(Stage::Records);
        Ok(())
    }

    fn finish_manifest(&mut self, next: Stage) {
        self.manifest_read = true;
        self.manifest_rows = 0;
        self.stage = next;
    }

    fn read_record(&mut self, row: &Row<'_>) -> Result<()> {
        if row.is_single(MANIFEST_END) {
            return Err(DnslzError::mismatch(format!(
                "line {}: manifest terminator among records",
                row.line_number()
            )));
        }
        if row.len() < MIN_RECORD_COLUMNS {
            return Ok(());
        }
        self.parser.parse(row, self.chunk.next_slot())?;
        self.chunk.commit();
        self.stats.records += 1;
        if self.chunk.len() == self.expected_records() {
            self.flush_chunk()?;
        }
        Ok(())
    }

    fn flush_chunk(&mut self) -> Result<()> {
        let functions = self.config.functions;
        let (records, pool) = self.chunk.parts_mut();

        resolve_addresses(records, pool, self.format, functions.address_difference())?;
        if functions.sorts_addresses() {
            self.permutations.apply(records, pool, self.config.base)?;
        }

        if functions.line_sorting() {
            if self.sequence_ids.len() != records.len() {
                return Err(DnslzError::mismatch(format!(
                    "line manifest lists {} records, chunk has {}",
                    self.sequence_ids.len(),
                    records.len()
                )));
            }
            let mut seen = vec![false; records.len()];
            for (record, &id) in records.iter_mut().zip(&self.sequence_ids) {
                match seen.get_mut(id as usize) {
                    Some(slot) if !*slot => *slot = true,
                    _ => {
                        return Err(DnslzError::mismatch(format!(
                            "line manifest sequence id {} repeated or out of range",
                            id
                        )))
                    }
                }
                record.base.sequence_id = id;
            }
            records.sort_unstable_by_key(|r| r.base.sequence_id);
        }

        if functions.time_difference() {
            let mut clock: u32 = 0;
            for record in records.iter_mut() {
                clock = clock.checked_add(record.base.timestamp).ok_or_else(|| {
                    DnslzError::mismatch("timestamp deltas overflow 32 bits")
                })?;
                record.base.timestamp = clock;
            }
        }

        self.buf.clear();
        for record in records.iter() {
            emit_raw(record, pool, self.format, self.config.raw_delimiter, &mut self.buf)?;
        }
        self.writer.write_all(&self.buf)?;
        self.stats.chunks += 1;
        self.stats.bytes_written += self.buf.len() as u64;
        debug!(
            "chunk {}: {} records, {} line-manifest and {} address-manifest entries, {} bytes",
            self.stats.chunks,
            records.len(),
            self.sequence_ids.len(),
            self.permutations.len(),
            self.buf.len()
        );

        self.chunk.reset();
        self.sequence_ids.clear();
        self.permutations.clear();
        self.manifest_read = false;
        self.stage = Self::first_stage(&self.config);
        Ok(())
    }
}

impl<W: Write> Pipeline for Decompressor<W> {
    fn process(&mut self, row: &Row<'_>) -> Result<()> {
        self.stats.rows += 1;
        match self.stage {
            Stage::LineManifest => self.read_line_manifest(row),
            Stage::AddressManifest => self.read_address_manifest(row),
            Stage::Records => self.read_record(row),
        }
    }

    fn finish(&mut self) -> Result<PipelineStats> {
        match self.stage {
            Stage::Records if !self.chunk.is_empty() => self.flush_chunk()?,
            Stage::Records if self.manifest_read => {
                return Err(DnslzError::mismatch(
                    "stream ends after a manifest without records",
                ))
            }
            Stage::Records => {}
            _ if self.manifest_read || self.manifest_rows > 0 => {
                return Err(DnslzError::mismatch("stream ends inside a manifest"))
            }
            _ => {}
        }
        self.writer.flush()?;
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FunctionMask;
    use crate::pipeline::run;
    use crate::tokenizer::Tokenizer;

    fn decompress_with(config: &CodecConfig, input: &str) -> Result<String> {
        let mut decompressor = Decompressor::new(config, Vec::new())?;
        let mut tokenizer =
            Tokenizer::new(input.as_bytes(), b'\t', config.packed_line_buffer_size());
        run(&mut decompressor, &mut tokenizer)?;
        Ok(String::from_utf8(decompressor.into_inner()).unwrap())
    }

    fn line_sorting(capacity: usize) -> CodecConfig {
        CodecConfig {
            functions: FunctionMask::LINE_SORTING,
            base: 10,
            chunk_capacity: capacity,
            ..CodecConfig::default()
        }
    }

    #[test]
    fn test_undo_line_sort() {
        let out = decompress_with(
            &line_sorting(100),
            "200000100\n-end-\n\
             15\t10.0.0.1\t10.0.0.53\t28\t0\tapi.example.org\n\
             10\t10.0.0.1\t10.0.0.53\t1\t0\twww.example.org\t1\t2\t192.0.2.7\t192.0.2.3\n\
             12\t10.0.0.2\t10.0.0.53\t1\t0\tmail.example.com\n",
        )
        .unwrap();
        assert_eq!(
            out,
            "10\t10.0.0.1\t10.0.0.53\t1\t0\twww.example.org\t1\t2\t192.0.2.7\t192.0.2.3\n\
             12\t10.0.0.2\t10.0.0.53\t1\t0\tmail.example.com\n\
             15\t10.0.0.1\t10.0.0.53\t28\t0\tapi.example.org\n"
        );
    }

    #[test]
    fn test_undo_address_sort_and_time_deltas() {
        let config = CodecConfig {
            functions: FunctionMask::ADDRESS_SORTING | FunctionMask::TIME_DIFFERENCE,
            ..CodecConfig::default()
        };
        let out = decompress_with(
            &config,
            "1\n-end-\n\
             10\t10.0.0.1\t10.0.0.53\t1\t0\twww.example.org\t1\t2\t192.0.2.3\t192.0.2.7\n\
             2\t10.0.0.2\t10.0.0.53\t1\t0\tmail.example.com\n\
             3\t10.0.0.1\t10.0.0.53\t28\t0\tapi.example.org\n",
        )
        .unwrap();
        assert_eq!(
            out,
            "10\t10.0.0.1\t10.0.0.53\t1\t0\twww.example.org\t1\t2\t192.0.2.7\t192.0.2.3\n\
             12\t10.0.0.2\t10.0.0.53\t1\t0\tmail.example.com\n\
             15\t10.0.0.1\t10.0.0.53\t28\t0\tapi.example.org\n"
        );
    }

    #[test]
    fn test_manifest_count_mismatch() {
        // manifest announces three records, stream holds two
        let err = decompress_with(
            &line_sorting(100),
            "200000100\n-end-\n1\ta\tb\t1\t0\tx.org\n2\ta\tb\t1\t0\tx.org\n",
        )
        .unwrap_err();
        assert!(matches!(err, DnslzError::ConfigMismatch { .. }));

        // more ids than the chunk can hold
        assert!(decompress_with(&line_sorting(2), "000102\n-end-\n").is_err());
    }

    #[test]
    fn test_repeated_sequence_id() {
        assert!(decompress_with(
            &line_sorting(100),
            "000000\n-end-\n1\t1.1.1.1\tb\t1\t0\tx.org\n2\t1.1.1.1\t1.1.1.1\t1\t0\tx.org\n"
        )
        .is_err());
    }

    #[test]
    fn test_stream_ending_after_manifest() {
        let err = decompress_with(&line_sorting(100), "000\n-end-\n").unwrap_err();
        assert!(err.to_string().contains("without records"));

        let err = decompress_with(&line_sorting(100), "000\n").unwrap_err();
        assert!(err.to_string().contains("inside a manifest"));

        assert_eq!(decompress_with(&line_sorting(100), "").unwrap(), "");
    }

    #[test]
    fn test_unused_address_manifest_entries() {
        let config = CodecConfig::with_functions(FunctionMask::ADDRESS_SORTING);
        let err = decompress_with(&config, "1\t4\n-end-\n1\t1.1.1.1\t1.1.1.1\t1\t0\tx.org\n")
            .unwrap_err();
        assert!(matches!(err, DnslzError::ConfigMismatch { .. }));
    }

    #[test]
    fn test_terminator_among_records() {
        let config = CodecConfig::with_functions(FunctionMask::NONE);
        assert!(decompress_with(&config, "1\t1.1.1.1\t1.1.1.1\t1\t0\tx.org\n-end-\n").is_err());
    }

    #[test]
    fn test_chunks_follow_capacity() {
        let config = CodecConfig {
            functions: FunctionMask::TIME_DIFFERENCE,
            chunk_capacity: 2,
            ..CodecConfig::default()
        };
        let out = decompress_with(
            &config,
            "10\t1.1.1.1\t1.1.1.1\t1\t0\tx.org\n5\t1.1.1.1\t1.1.1.1\t1\t0\tx.org\n\
             20\t1.1.1.1\t1.1.1.1\t1\t0\tx.org\n",
        )
        .unwrap();
        assert_eq!(
            out,
            "10\t1.1.1.1\t1.1.1.1\t1\t0\tx.org\n15\t1.1.1.1\t1.1.1.1\t1\t0\tx.org\n\
             20\t1.1.1.1\t1.1.1.1\t1\t0\tx.org\n"
        );
    }
}
