//! Example compressing a DNS query log and checking the result restores it.
//!
//! Run with: cargo run --example log_compression --release -- datasets/queries.log

use std::fs;
use std::time::Instant;

use dnslz_compression::{compress, compress_bytes, decompress_bytes, CodecConfig, FunctionMask};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "datasets/queries.log".to_string());
    let log = fs::read(&path)?;

    println!("=== DNS Log Pre-compression ===\n");
    println!("Input: {} ({} bytes)", path, log.len());

    // with every transform off the output is the input with canonical addresses
    let canonical = compress_bytes(&CodecConfig::with_functions(FunctionMask::NONE), &log)?;
    let mut mismatches = 0;

    for (name, functions) in [
        ("none", FunctionMask::NONE),
        ("line sorting", FunctionMask::LINE_SORTING),
        ("address transforms", FunctionMask::ADDRESS_SORTING | FunctionMask::ADDRESS_DIFFERENCE),
        ("field transforms", FunctionMask::FIELD_HIDING | FunctionMask::FIELD_REPLACEMENT),
        ("all", FunctionMask::ALL),
    ] {
        let config = CodecConfig::with_functions(functions);

        let start = Instant::now();
        let mut packed = Vec::with_capacity(log.len());
        let stats = compress(&config, &log[..], &mut packed)?;
        let compress_time = start.elapsed();

        let start = Instant::now();
        let restored = decompress_bytes(&config, &packed)?;
        let decompress_time = start.elapsed();

        println!("\n--- {} ({:?}) ---", name, functions);
        println!("Records: {} in {} chunks", stats.records, stats.chunks);
        println!("Output: {} bytes, ratio {:.3}", packed.len(), stats.ratio());
        println!("Compress: {:?}, decompress: {:?}", compress_time, decompress_time);
        if restored == canonical {
            println!("Restored {} bytes: OK", restored.len());
        } else {
            mismatches += 1;
            println!(
                "Restored {} bytes: MISMATCH (expected {} bytes)",
                restored.len(),
                canonical.len()
            );
        }
    }

    if mismatches > 0 {
        return Err(format!("{} configurations did not restore the input", mismatches).into());
    }
    Ok(())
}
