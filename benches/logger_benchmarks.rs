//! Criterion benchmarks for shiplog

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use shiplog::core::EncoderCore;
use shiplog::encoders::{EncoderConfig, JsonEncoder};
use shiplog::prelude::field;
use shiplog::{AtomicLevel, Level, Logger, Result, WriteSyncer};
use std::sync::Arc;

struct NullSyncer;

impl WriteSyncer for NullSyncer {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        Ok(buf.len())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

fn json_logger(level: Level) -> Logger {
    let cfg = EncoderConfig {
        time_key: "generated_time".to_string(),
        level_key: "level".to_string(),
        message_key: "msg".to_string(),
        ..EncoderConfig::default()
    };
    let core = EncoderCore::new(
        Box::new(JsonEncoder::new(cfg)),
        Arc::new(NullSyncer),
        Arc::new(AtomicLevel::new(level)),
    );
    Logger::with_core(core, [])
}

// ============================================================================
// Gate Benchmarks
// ============================================================================

fn bench_level_gate(c: &mut Criterion) {
    let mut group = c.benchmark_group("level_gate");
    group.throughput(Throughput::Elements(1));

    let logger = json_logger(Level::Error);

    group.bench_function("rejected_debug", |b| {
        b.iter(|| {
            logger.debug(black_box("never written"), &[]);
        });
    });

    let sugar = logger.sugar();
    group.bench_function("rejected_debugf", |b| {
        b.iter(|| {
            sugar.debugf(format_args!("never formatted {}", black_box(42)));
        });
    });

    group.finish();
}

// ============================================================================
// Encoding Benchmarks
// ============================================================================

fn bench_json_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_encoding");
    group.throughput(Throughput::Elements(1));

    let logger = json_logger(Level::Debug);

    group.bench_function("message_only", |b| {
        b.iter(|| {
            logger.info(black_box("plain message"), &[]);
        });
    });

    group.bench_function("five_fields", |b| {
        b.iter(|| {
            logger.info(
                black_box("request finished"),
                &[
                    field::string("method", "GET"),
                    field::string("path", "/api/v1/users"),
                    field::int("status", 200),
                    field::int("bytes", 4096),
                    field::boolean("cached", false),
                ],
            );
        });
    });

    let scoped = logger.with(&[
        field::string("service", "api"),
        field::string("az", "eu-1"),
    ]);
    group.bench_function("with_context", |b| {
        b.iter(|| {
            scoped.info(black_box("tick"), &[field::int("seq", 7)]);
        });
    });

    group.finish();
}

// ============================================================================
// Field Construction Benchmarks
// ============================================================================

fn bench_field_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_construction");
    group.throughput(Throughput::Elements(1));

    group.bench_function("int", |b| {
        b.iter(|| black_box(field::int("key", black_box(42))));
    });

    group.bench_function("string", |b| {
        b.iter(|| black_box(field::string("key", black_box("value"))));
    });

    group.bench_function("stack_capture", |b| {
        b.iter(|| black_box(field::stack("stk")));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_level_gate,
    bench_json_encoding,
    bench_field_construction
);
criterion_main!(benches);
