//! Benchmarks for the Burrow storage core.
//!
//! Run with: cargo bench --package burrow
//!
//! ## Benchmark Categories
//!
//! - **Codecs**: delta-of-delta and bit-packing encode/decode
//! - **Archive I/O**: full write and read cycles over in-memory sinks
//! - **Trigram Index**: document indexing and phrase search

use burrow::codec::boolean::{decode_bit_packing, encode_bit_packing};
use burrow::codec::delta::{decode_delta_of_delta, encode_delta_of_delta};
use burrow::{ArchiveReader, ArchiveWriter, ColumnDef, ColumnType, MemoryIndex, Row, Value};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::io::Cursor;

/// Generate typical event rows (monotone timestamps, drifting values,
/// formatted messages, alternating flags).
fn generate_rows(count: usize) -> Vec<Row> {
    (0..count)
        .map(|i| {
            vec![
                Value::from(1_700_000_000_000 + i as i64 * 250),
                Value::from(50.0 + (i as f64 * 0.1).sin() * 5.0),
                Value::from(format!("request handled in {}ms", i % 100)),
                Value::from(i % 2 == 0),
            ]
        })
        .collect()
}

fn event_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("ts", ColumnType::Int64),
        ColumnDef::new("value", ColumnType::Float64),
        ColumnDef::new("msg", ColumnType::String),
        ColumnDef::new("ok", ColumnType::Bool),
    ]
}

fn write_archive(rows: Vec<Row>) -> (Vec<u8>, Vec<u8>) {
    let mut data = Vec::new();
    let mut metadata = Vec::new();
    let mut writer = ArchiveWriter::new(event_columns(), &mut data, &mut metadata).unwrap();
    writer.write(rows).unwrap();
    writer.close().unwrap();
    (data, metadata)
}

fn bench_delta_of_delta(c: &mut Criterion) {
    let values: Vec<i64> = (0..10_000).map(|i| 1_700_000_000_000 + i * 250).collect();
    let encoded = encode_delta_of_delta(&values);

    let mut group = c.benchmark_group("delta_of_delta");
    group.throughput(Throughput::Elements(values.len() as u64));
    group.bench_function("encode_10k", |b| {
        b.iter(|| encode_delta_of_delta(black_box(&values)))
    });
    group.bench_function("decode_10k", |b| {
        b.iter(|| decode_delta_of_delta(black_box(&encoded)).unwrap())
    });
    group.finish();
}

fn bench_bit_packing(c: &mut Criterion) {
    let values: Vec<bool> = (0..10_000).map(|i| i % 3 == 0).collect();
    let encoded = encode_bit_packing(&values);

    let mut group = c.benchmark_group("bit_packing");
    group.throughput(Throughput::Elements(values.len() as u64));
    group.bench_function("encode_10k", |b| {
        b.iter(|| encode_bit_packing(black_box(&values)))
    });
    group.bench_function("decode_10k", |b| {
        b.iter(|| decode_bit_packing(black_box(&encoded)).unwrap())
    });
    group.finish();
}

fn bench_archive_write(c: &mut Criterion) {
    let rows = generate_rows(100_000);

    let mut group = c.benchmark_group("archive");
    group.throughput(Throughput::Elements(rows.len() as u64));
    group.sample_size(10);
    group.bench_function("write_100k_rows", |b| {
        b.iter(|| write_archive(black_box(rows.clone())))
    });
    group.finish();
}

fn bench_archive_read(c: &mut Criterion) {
    let (data, metadata) = write_archive(generate_rows(100_000));

    let mut group = c.benchmark_group("archive");
    group.throughput(Throughput::Elements(100_000));
    group.sample_size(10);
    group.bench_function("read_100k_rows", |b| {
        b.iter(|| {
            let mut reader = ArchiveReader::new(
                Cursor::new(black_box(&data)),
                Cursor::new(black_box(&metadata)),
            )
            .unwrap();
            reader.rows().map(|r| r.unwrap()).count()
        })
    });
    group.finish();
}

fn bench_trigram(c: &mut Criterion) {
    let documents: Vec<String> = (0..1000)
        .map(|i| format!("server {} reported status {} while syncing", i % 50, i % 7))
        .collect();

    let mut index = MemoryIndex::new();
    for (i, text) in documents.iter().enumerate() {
        index.add(i as i64, text);
    }

    let mut group = c.benchmark_group("trigram");
    group.bench_function("index_1k_documents", |b| {
        b.iter(|| {
            let mut index = MemoryIndex::new();
            for (i, text) in documents.iter().enumerate() {
                index.add(i as i64, black_box(text));
            }
            index
        })
    });
    group.bench_function("phrase_search", |b| {
        b.iter(|| black_box(&index).search("reported status"))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_delta_of_delta,
    bench_bit_packing,
    bench_archive_write,
    bench_archive_read,
    bench_trigram
);
criterion_main!(benches);
