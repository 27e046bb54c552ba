//! Benchmarks for compression and decompression throughput.
//!
//! Run with: `cargo bench -p dnslz-compression`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use dnslz_compression::{compress_bytes, decompress_bytes, CodecConfig, FunctionMask};

const QNAMES: &[&str] = &[
    "www.example.com",
    "api.example.org",
    "mail.example.com",
    "cdn.example.net",
    "x.io",
];

/// Synthetic resolver log: a few clients, repeated names, mixed answer sets.
fn generate_log(lines: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(lines * 96);
    let mut state: u32 = 0x2545_f491;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };
    let mut clock = 1_700_000_000u32;
    for _ in 0..lines {
        let r = next();
        clock += r % 3;
        let qname = QNAMES[(r as usize >> 4) % QNAMES.len()];
        let line = match r % 4 {
            0 => format!(
                "{}\t10.0.{}.{}\t10.0.0.53\t1\t0\t{}\t1\t2\t192.0.2.{}\t192.0.2.{}\n",
                clock,
                (r >> 8) % 4,
                (r >> 10) % 64,
                qname,
                (r >> 12) % 256,
                (r >> 20) % 256
            ),
            1 => format!(
                "{}\t10.0.{}.{}\t2001:db8::53\t28\t0\t{}\t5\t1\tedge.example.net\t28\t1\t2001:db8::{:x}\n",
                clock,
                (r >> 8) % 4,
                (r >> 10) % 64,
                qname,
                (r >> 16) & 0xffff
            ),
            2 => format!("{}\t10.0.0.{}\t10.0.0.53\t16\t3\t{}\n", clock, (r >> 8) % 64, qname),
            _ => format!("{}\t10.0.0.{}\t10.0.0.53\t1\t0\t{}\n", clock, (r >> 8) % 64, qname),
        };
        out.extend_from_slice(line.as_bytes());
    }
    out
}

fn bench_compress(c: &mut Criterion) {
    let log = generate_log(50_000);
    let mut group = c.benchmark_group("compress");
    group.throughput(Throughput::Bytes(log.len() as u64));

    for (name, functions) in [
        ("none", FunctionMask::NONE),
        ("sorting", FunctionMask::LINE_SORTING | FunctionMask::ADDRESS_SORTING),
        ("all", FunctionMask::ALL),
    ] {
        let config = CodecConfig::with_functions(functions);
        group.bench_with_input(BenchmarkId::from_parameter(name), &log, |b, log| {
            b.iter(|| compress_bytes(&config, black_box(log)))
        });
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let log = generate_log(50_000);
    let mut group = c.benchmark_group("decompress");
    group.throughput(Throughput::Bytes(log.len() as u64));

    for chunk_capacity in [1_000, 30_000] {
        let config = CodecConfig {
            chunk_capacity,
            ..CodecConfig::default()
        };
        let packed = match compress_bytes(&config, &log) {
            Ok(packed) => packed,
            Err(e) => panic!("compressing the benchmark log failed: {}", e),
        };
        group.bench_with_input(
            BenchmarkId::new("chunk", chunk_capacity),
            &packed,
            |b, packed| b.iter(|| decompress_bytes(&config, black_box(packed))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);
criterion_main!(benches);
