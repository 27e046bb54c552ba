//! Pull loop shared by both directions.

use std::io::Read;

use log::info;
use serde::Serialize;

use crate::error::Result;
use crate::tokenizer::{Row, Tokenizer};

/// Counters reported when a stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Rows handed to the pipeline, including skipped ones.
    pub rows: u64,
    /// Records parsed.
    pub records: u64,
    /// Chunks flushed.
    pub chunks: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl PipelineStats {
    /// Output size relative to input size; zero for empty input.
    pub fn ratio(&self) -> f64 {
        if self.bytes_read == 0 {
            0.0
        } else {
            self.bytes_written as f64 / self.bytes_read as f64
        }
    }
}

/// A direction of the codec, fed one row at a time.
pub trait Pipeline {
    /// Consume one row; may flush a full chunk.
    fn process(&mut self, row: &Row<'_>) -> Result<()>;

    /// Flush the pending chunk and the writer.
    fn finish(&mut self) -> Result<PipelineStats>;
}

/// Drive `pipeline` with every row of `tokenizer` until end of stream.
pub fn run<R: Read, P: Pipeline + ?Sized>(
    pipeline: &mut P,
    tokenizer: &mut Tokenizer<R>,
) -> Result<PipelineStats> {
    while let Some(row) = tokenizer.next_row()? {
        pipeline.process(&row)?;
    }
    let mut stats = pipeline.finish()?;
    stats.bytes_read = tokenizer.bytes_read();
    info!(
        "{} rows, {} records in {} chunks, {} -> {} bytes",
        stats.rows, stats.records, stats.chunks, stats.bytes_read, stats.bytes_written
    );
    Ok(stats)
}
