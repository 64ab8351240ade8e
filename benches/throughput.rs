//! Throughput Benchmark for ttlstore
//!
//! This benchmark measures the performance of the stores under various
//! workloads.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use ttlstore::{CacheConfig, ExpiryHeap, IndexedTable, Shards, Ttl};

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let table = IndexedTable::new(Duration::from_secs(3600));

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            table.set(key, Bytes::from("small_value"), Ttl::Default);
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024)); // 1KB value
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            table.set(key, value.clone(), Ttl::Default);
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let table = IndexedTable::new(Duration::ZERO);

    // Pre-populate with data
    for i in 0..100_000 {
        table.set(format!("key:{}", i), i, Ttl::Never);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(table.get(key.as_str()));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(table.get(key.as_str()));
            i += 1;
        });
    });

    group.bench_function("get_and_renew", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(table.get_and_renew(key.as_str()));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_mixed(c: &mut Criterion) {
    let table = IndexedTable::new(Duration::ZERO);

    // Pre-populate
    for i in 0..10_000u64 {
        table.set(format!("key:{}", i), i, Ttl::Never);
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                // 20% writes
                table.set(format!("key:{}", i % 10_000), i, Ttl::Never);
            } else {
                // 80% reads
                let key = format!("key:{}", i % 10_000);
                black_box(table.get(key.as_str()));
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access: one table versus sharded tables
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_single_table", |b| {
        b.iter(|| {
            let table = Arc::new(IndexedTable::new(Duration::ZERO));
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let table = Arc::clone(&table);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key:{}:{}", t, i);
                            table.set(key.clone(), i, Ttl::Never);
                            table.get(key.as_str());
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(table.len());
        });
    });

    group.bench_function("4_threads_16_shards", |b| {
        b.iter(|| {
            let config = CacheConfig::default().with_shards(16);
            let shards = Arc::new(Shards::new(&config).unwrap());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let shards = Arc::clone(&shards);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key:{}:{}", t, i);
                            shards.set(key.clone(), i, Ttl::Never);
                            shards.get(key.as_str());
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(shards.len());
        });
    });

    group.finish();
}

/// Benchmark sweeps: full table scan versus heap root pops
fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");

    // 100k long-lived entries and nothing expired: the table scans them all,
    // the heap looks at the root once.
    let table = IndexedTable::new(Duration::ZERO);
    let heap = ExpiryHeap::new(Duration::ZERO);
    for i in 0..100_000u64 {
        table.set(i, i, Ttl::After(Duration::from_secs(3600)));
        heap.insert(i, i, Ttl::After(Duration::from_secs(3600)));
    }

    group.bench_function("table_nothing_expired", |b| {
        b.iter(|| black_box(table.sweep_expired()));
    });

    group.bench_function("heap_nothing_expired", |b| {
        b.iter(|| black_box(heap.sweep_expired()));
    });

    group.bench_function("heap_insert", |b| {
        let heap = ExpiryHeap::new(Duration::from_secs(3600));
        let mut i = 0u64;
        b.iter(|| {
            heap.insert(i, i, Ttl::Default);
            i += 1;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_mixed,
    bench_concurrent,
    bench_sweep,
);

criterion_main!(benches);
