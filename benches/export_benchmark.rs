//! Benchmarks for table-export operations.

use chrono::NaiveDate;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use table_export::artifact::write_csv;
use table_export::checkpoint::{format_timestamp, parse_timestamp};
use table_export::{ExportBatch, ExportRecord};

fn sample_batch(rows: usize) -> ExportBatch {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let mut batch = ExportBatch::new(
        "orders",
        vec!["id".into(), "customer".into(), "note".into(), "updated_at".into()],
    );
    for i in 0..rows {
        let ts = base + chrono::Duration::seconds(i as i64);
        batch
            .push(ExportRecord::new(
                vec![
                    Some(i.to_string()),
                    Some(format!("customer {}", i % 97)),
                    (i % 5 == 0).then(|| "needs \"quoting\", sometimes".to_string()),
                    Some(format_timestamp(&ts)),
                ],
                ts,
            ))
            .unwrap();
    }
    batch
}

/// Benchmark CSV serialization of a batch.
fn bench_write_csv(c: &mut Criterion) {
    let batch = sample_batch(10_000);

    c.bench_function("write_csv_10k_rows", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(1 << 20);
            write_csv(black_box(&batch), &mut out).unwrap();
            black_box(out)
        })
    });
}

/// Benchmark the high-water mark scan.
fn bench_high_water_mark(c: &mut Criterion) {
    let batch = sample_batch(10_000);

    c.bench_function("high_water_mark_10k_rows", |b| {
        b.iter(|| black_box(batch.high_water_mark()))
    });
}

/// Benchmark checkpoint parsing.
fn bench_parse_checkpoint(c: &mut Criterion) {
    let inputs = [
        "2024-01-03T00:00:00",
        "2024-01-03T12:34:56.789123",
        "2024-01-03 12:34:56",
        "2024-01-03T12:34:56+02:00",
    ];

    c.bench_function("parse_checkpoint", |b| {
        b.iter(|| {
            for raw in &inputs {
                black_box(parse_timestamp(raw));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_write_csv,
    bench_high_water_mark,
    bench_parse_checkpoint
);
criterion_main!(benches);
