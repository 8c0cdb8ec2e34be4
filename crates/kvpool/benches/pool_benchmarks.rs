// Record pool benchmarks.
//
// Compares pooled acquire/release against plain boxing, and measures the
// retain/release fast path on a shared record.

use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use kvpool::{KeyValue, PoolConfig};

fn acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquire_release");

    let pool = KeyValue::pool(PoolConfig::bounded(64).with_name("bench")).expect("valid config");
    group.bench_function("pooled", |b| {
        b.iter(|| {
            let record = KeyValue::acquire_from(&pool, black_box(1), black_box(2)).unwrap();
            black_box(record.read());
        });
    });

    group.bench_function("thread_local", |b| {
        b.iter(|| {
            let record = KeyValue::acquire_new(black_box(1), black_box(2)).unwrap();
            black_box(record.read());
        });
    });

    group.bench_function("boxed", |b| {
        b.iter(|| {
            let record = Box::new((black_box(1u64), black_box(2u64)));
            black_box(record);
        });
    });

    group.finish();
}

fn retain_release(c: &mut Criterion) {
    let record = KeyValue::acquire_new(1, 2).unwrap();

    c.bench_function("retain_release", |b| {
        b.iter(|| {
            let extra = KeyValue::retain(&record);
            KeyValue::release(black_box(extra));
        });
    });

    c.bench_function("arc_clone_drop", |b| {
        let arc = Arc::new((1u64, 2u64));
        b.iter(|| {
            let extra = Arc::clone(&arc);
            drop(black_box(extra));
        });
    });
}

fn cross_thread_return(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_thread_return");

    for batch in [16usize, 256] {
        let pool = KeyValue::pool(PoolConfig::unbounded(batch).with_name("bench-xt"))
            .expect("valid config");

        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter(|| {
                let records: Vec<_> = (0..batch as u64)
                    .map(|i| KeyValue::acquire_from(&pool, i, i).unwrap())
                    .collect();
                thread::spawn(move || drop(records)).join().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, acquire_release, retain_release, cross_thread_return);
criterion_main!(benches);
