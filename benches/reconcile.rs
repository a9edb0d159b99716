//! Benchmarks for the import and export hot paths.
//!
//! Benchmark targets:
//! - Row flatten/unflatten: <20us per row
//! - Change detection: <5us per record
//! - Query parameter parsing: <50us
//! - In-memory reconcile of 1000 unchanged rows: <50ms

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::{Value, json};
use sheetbridge::config::CodecConfig;
use sheetbridge::io::RowCodec;
use sheetbridge::models::{Cardinality, DataType, FieldSpec, ImportBatch, Record, RecordType};
use sheetbridge::services::{BulkReconciler, DiffEngine, ReconcileOptions, parse_query};
use sheetbridge::{MemoryRepository, SchemaRegistry, StaticSchemaRegistry};
use std::hint::black_box;
use std::time::Duration;

const COMPANY: &str = "api::company.company";

fn registry() -> StaticSchemaRegistry {
    StaticSchemaRegistry::new(vec![
        RecordType::new("shared.address")
            .with_field("city", FieldSpec::primitive(DataType::String))
            .with_field("zip", FieldSpec::primitive(DataType::String)),
        RecordType::new(COMPANY)
            .with_field("name", FieldSpec::primitive(DataType::String))
            .with_field("employees", FieldSpec::primitive(DataType::Integer))
            .with_field("tagList", FieldSpec::custom_list())
            .with_field("address", FieldSpec::component("shared.address", Cardinality::One)),
    ])
    .unwrap()
}

fn company(i: usize) -> Record {
    json!({
        "name": format!("Company {i}"),
        "employees": i * 10,
        "tagList": ["red", "blue", "green"],
        "address": {"city": "Berlin", "zip": format!("{:05}", i % 100_000)},
    })
    .as_object()
    .cloned()
    .unwrap()
}

// ============================================================================
// Codec Benchmarks
// ============================================================================

fn bench_codec(c: &mut Criterion) {
    let registry = registry();
    let config = CodecConfig::default();
    let codec = RowCodec::new(&registry, &config);
    let record_type = registry.require(COMPANY).unwrap();
    let record = company(42);
    let row = codec.flatten(&record, record_type);

    let mut group = c.benchmark_group("codec");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("flatten", |b| {
        b.iter(|| codec.flatten(black_box(&record), record_type));
    });
    group.bench_function("unflatten", |b| {
        b.iter(|| codec.unflatten(black_box(&row), record_type));
    });

    group.finish();
}

// ============================================================================
// Diff Benchmarks
// ============================================================================

fn bench_diff(c: &mut Criterion) {
    let config = CodecConfig::default();
    let diff = DiffEngine::new(&config.system_keys);
    let stored = company(7);
    let mut changed = stored.clone();
    changed.insert("employees".to_string(), Value::from(1));

    let mut group = c.benchmark_group("diff");
    group.bench_function("unchanged", |b| {
        b.iter(|| diff.has_changes(black_box(&stored), black_box(&stored)));
    });
    group.bench_function("changed", |b| {
        b.iter(|| diff.has_changes(black_box(&stored), black_box(&changed)));
    });
    group.finish();
}

// ============================================================================
// Query Parsing Benchmarks
// ============================================================================

fn bench_query(c: &mut Criterion) {
    let simple = [("filters[name][$eq]", "Acme")];
    let grouped = [
        ("filters[$or][0][name][$containsi]", "acme"),
        ("filters[$or][1][owner][email][$eq]", "ann@x.com"),
        ("filters[employees][$gte]", "10"),
        ("filters[tagList][$in]", "red,blue,green"),
        ("_q", "acme"),
    ];

    let mut group = c.benchmark_group("query_parsing");
    group.bench_function("simple", |b| {
        b.iter(|| parse_query(black_box(simple)));
    });
    group.bench_function("grouped", |b| {
        b.iter(|| parse_query(black_box(grouped)));
    });
    group.finish();
}

// ============================================================================
// Reconcile Benchmarks
// ============================================================================

fn bench_reconcile(c: &mut Criterion) {
    let registry = registry();
    let config = CodecConfig::default();

    let mut group = c.benchmark_group("reconcile");
    group.sample_size(20);

    for count in [100usize, 1000] {
        let repo = MemoryRepository::new();
        let rows: Vec<Record> = (0..count)
            .map(|i| {
                let mut row = company(i);
                let id = repo.seed(COMPANY, row.clone());
                row.insert("id".to_string(), id.to_value());
                row
            })
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("unchanged_rows", count), &rows, |b, rows| {
            b.iter(|| {
                let batch = ImportBatch::new().with(COMPANY, rows.clone());
                BulkReconciler::new(&registry, &repo, &config)
                    .reconcile(batch, &ReconcileOptions::default())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codec, bench_diff, bench_query, bench_reconcile);
criterion_main!(benches);
