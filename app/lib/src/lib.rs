//! # DNSLZ Compression Library
//!
//! Lossless pre-compressor for tab-delimited DNS query logs.
//!
//! Each log line carries a timestamp, client and server addresses, query type,
//! response code, query name and optional CNAME/A/AAAA answer groups. The
//! compressor batches lines into chunks, reorders records and answers to
//! improve locality, and rewrites fields as deltas, markers or base-N text.
//! Manifests written ahead of every chunk let the decompressor restore the
//! original order. The output is meant to be fed to a general-purpose
//! compressor.
//!
//! ```
//! use dnslz_compression::{compress_bytes, decompress_bytes, CodecConfig};
//!
//! let config = CodecConfig::default();
//! let log = b"1700000000\t10.0.0.1\t10.0.0.53\t1\t0\twww.example.com\t1\t1\t192.0.2.1\n";
//! let packed = compress_bytes(&config, log).unwrap();
//! assert_eq!(decompress_bytes(&config, &packed).unwrap(), log);
//! ```

#![warn(clippy::all)]

pub mod codec;
pub mod compress;
pub mod config;
pub mod decompress;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod pool;
pub mod record;
pub mod tokenizer;

use std::io::{Read, Write};

pub use compress::Compressor;
pub use config::{CodecConfig, FunctionMask};
pub use decompress::Decompressor;
pub use error::{DnslzError, Result};
pub use pipeline::{run, Pipeline, PipelineStats};
pub use tokenizer::{Row, Tokenizer};

/// Compress a raw log from `reader` into `writer`.
pub fn compress<R: Read, W: Write>(
    config: &CodecConfig,
    reader: R,
    writer: W,
) -> Result<PipelineStats> {
    let mut compressor = Compressor::new(config, writer)?;
    let mut tokenizer = Tokenizer::new(reader, config.raw_delimiter, config.line_buffer_size);
    run(&mut compressor, &mut tokenizer)
}

/// Restore a raw log from the compressed stream in `reader`.
pub fn decompress<R: Read, W: Write>(
    config: &CodecConfig,
    reader: R,
    writer: W,
) -> Result<PipelineStats> {
    let mut decompressor = Decompressor::new(config, writer)?;
    let mut tokenizer = Tokenizer::new(
        reader,
        config.packed_delimiter,
        config.packed_line_buffer_size(),
    );
    run(&mut decompressor, &mut tokenizer)
}

/// Compress an in-memory log.
pub fn compress_bytes(config: &CodecConfig, input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    compress(config, input, &mut out)?;
    Ok(out)
}

/// Decompress an in-memory stream.
pub fn decompress_bytes(config: &CodecConfig, input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 2);
    decompress(config, input, &mut out)?;
    Ok(out)
}
