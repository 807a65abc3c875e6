//! Benchmarks for HashLog engine operations

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use hashlog::{Config, Engine, SyncStrategy};
use tempfile::TempDir;

fn open_engine(dir: &TempDir) -> Engine {
    let config = Config::builder()
        .data_dir(dir.path())
        .sync_strategy(SyncStrategy::OsBuffered)
        .segment_size_limit(4 * 1024 * 1024)
        .build();
    Engine::open(config).unwrap()
}

fn engine_benchmarks(c: &mut Criterion) {
    let value = vec![b'x'; 128];

    let mut group = c.benchmark_group("engine");
    group.throughput(Throughput::Elements(1));

    // Single key write throughput (through the writer thread)
    {
        let dir = TempDir::new().unwrap();
        let engine = open_engine(&dir);
        let mut i = 0u64;
        group.bench_function("put_128b", |b| {
            b.iter(|| {
                i += 1;
                engine.put(format!("key{}", i), &value).unwrap();
            })
        });
        engine.close().unwrap();
    }

    // Random read throughput across several segments
    {
        let dir = TempDir::new().unwrap();
        let engine = open_engine(&dir);
        for i in 0..10_000 {
            engine.put(format!("key{}", i), &value).unwrap();
        }
        let mut i = 0u64;
        group.bench_function("get_hit", |b| {
            b.iter(|| {
                i = (i * 7919 + 1) % 10_000;
                engine.get(format!("key{}", i)).unwrap();
            })
        });
        group.bench_function("get_miss", |b| {
            b.iter(|| engine.get(b"absent").unwrap_err())
        });
        engine.close().unwrap();
    }

    // Recovery time for a populated directory
    {
        let dir = TempDir::new().unwrap();
        {
            let engine = open_engine(&dir);
            for i in 0..10_000 {
                engine.put(format!("key{}", i % 2_000), &value).unwrap();
            }
            engine.close().unwrap();
        }
        group.throughput(Throughput::Elements(10_000));
        group.bench_function("reopen_10k_records", |b| {
            b.iter_batched(
                || (),
                |_| open_engine(&dir).close().unwrap(),
                BatchSize::PerIteration,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, engine_benchmarks);
criterion_main!(benches);
