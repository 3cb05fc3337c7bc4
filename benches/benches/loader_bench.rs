//! # Loader Benchmarks
//!
//! Measures program parsing and label resolution.
//!
//! Run: `cargo bench --bench loader_bench`

use asim_core::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Program of `blocks` labelled blocks, each jumping to the next
fn generated_program(blocks: usize) -> String {
    let mut source = String::new();
    for i in 0..blocks {
        source.push_str(&format!("block_{i}:\n"));
        source.push_str("    MOV r0, [r1+4]   ; load\n");
        source.push_str("    ADD r0, 0x10\n");
        source.push_str("    CMP r0, r2\n");
        source.push_str(&format!("    JGE block_{}\n", (i + 1) % blocks));
        source.push('\n');
    }
    source.push_str("END\n");
    source
}

/// Benchmark parsing programs of increasing size
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("program_parse");

    for blocks in [10, 100, 1000] {
        let source = generated_program(blocks);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &source, |b, source| {
            b.iter(|| black_box(Program::parse(source).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark label lookups
fn bench_labels(c: &mut Criterion) {
    let mut group = c.benchmark_group("label_resolve");
    let program = Program::parse(&generated_program(1000)).unwrap();

    group.bench_function("hit", |b| {
        b.iter(|| black_box(program.labels().resolve("block_500").unwrap()))
    });

    group.bench_function("miss", |b| {
        b.iter(|| black_box(program.labels().resolve("nowhere").is_err()))
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_labels);

criterion_main!(benches);
