//! # Engine Benchmarks
//!
//! Measures instruction throughput of the execution engine: scalar loops,
//! subroutine calls, stack traffic and vector operations.
//!
//! Run: `cargo bench --bench engine_bench`

use std::time::Duration;

use asim_core::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const COUNTDOWN: &str = "
        MOV r0, 10000
    loop:
        DEC r0
        JNZ loop
    END";

const CALLS: &str = "
        MOV r1, 1000
    again:
        CALL work
        DEC r1
        JNZ again
    END
    work:
        ADD r0, 3
        MUL r0, 2
        AND r0, 0xFFFF
        RET";

const STACK: &str = "
        MOV r1, 1000
    again:
        PUSH r1
        PUSH 2
        PUSH 3
        ROT
        SWAP
        DUP
        POP r2
        POP r3
        POP r4
        POP r5
        DEC r1
        JNZ again
    END";

const VECTORS: &str = "
        MOV [0], 1
        MOV [1], 2
        MOV [2], 3
        MOV [3], 4
        VLOAD v1, [0]
        VLOAD v2, [0]
        MOV r1, 1000
    again:
        VADD v0, v1, v2
        VMUL v3, v0, v1
        VDIV v2, v3, v1
        VSTORE v0, [4]
        DEC r1
        JNZ again
    END";

fn engine() -> Engine {
    Engine::with_config(
        EngineConfig::default()
            .with_memory_size(1024)
            .with_bit_width(BitWidth::W32)
            .with_run_interval(Duration::ZERO)
            .with_max_steps(0)
            .with_event_history(0),
    )
}

/// Executed instruction count for a program, used for throughput
fn executed(source: &str) -> u64 {
    let mut engine = engine();
    engine.load_program(source).unwrap();
    engine.run().unwrap();
    engine.stats().executed
}

/// Benchmark complete program runs
fn bench_programs(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_run");

    for (name, source) in [
        ("countdown", COUNTDOWN),
        ("calls", CALLS),
        ("stack", STACK),
        ("vectors", VECTORS),
    ] {
        group.throughput(Throughput::Elements(executed(source)));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, source| {
            b.iter(|| {
                let mut engine = engine();
                engine.load_program(source).unwrap();
                black_box(engine.run().unwrap())
            })
        });
    }

    group.finish();
}

/// Benchmark single steps, with and without subscribers
fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_step");
    let spin = "spin:\n  INC r0\n  JMP spin";

    group.bench_function("no_subscribers", |b| {
        let mut engine = engine();
        engine.load_program(spin).unwrap();
        b.iter(|| black_box(engine.step().unwrap()))
    });

    group.bench_function("all_events_subscribed", |b| {
        let mut engine = engine();
        engine.subscribe(EventFilter::All, |event| {
            black_box(event);
        });
        engine.load_program(spin).unwrap();
        b.iter(|| black_box(engine.step().unwrap()))
    });

    group.bench_function("breakpoint_hook", |b| {
        let mut engine = engine();
        let breakpoints = Breakpoints::new();
        breakpoints.add(100);
        engine.set_breakpoint_hook(breakpoints.hook());
        engine.load_program(spin).unwrap();
        b.iter(|| black_box(engine.step().unwrap()))
    });

    group.finish();
}

/// Benchmark arithmetic across register widths
fn bench_widths(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_width");
    let source = "
            MOV r1, 2000
        again:
            ADD r0, 0xFFFF
            SUB r2, 7
            XOR r3, r0
            DEC r1
            JNZ again
        END";

    for width in [BitWidth::W8, BitWidth::W16, BitWidth::W32] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| {
                let mut engine = Engine::with_config(
                    EngineConfig::default()
                        .with_memory_size(64)
                        .with_bit_width(width)
                        .with_run_interval(Duration::ZERO)
                        .with_max_steps(0),
                );
                engine.load_program(source).unwrap();
                black_box(engine.run().unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_programs, bench_step, bench_widths);

criterion_main!(benches);
