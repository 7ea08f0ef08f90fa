use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use store::Store;
use tempfile::tempdir;

const N_KEYS: usize = 10_000;
const VALUE_SIZE: usize = 100;

fn build_store() -> (tempfile::TempDir, Store) {
    let dir = tempdir().unwrap();
    let store = Store::new(dir.path(), "bench").unwrap();
    let value = "x".repeat(VALUE_SIZE);
    for i in 0..N_KEYS {
        store.put(&format!("key{}", i), &value).unwrap();
    }
    (dir, store)
}

fn put_benchmark(c: &mut Criterion) {
    c.bench_function("store_put_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let store = Store::new(dir.path(), "bench").unwrap();
                (dir, store, "x".repeat(VALUE_SIZE))
            },
            |(_dir, store, value)| {
                for i in 0..N_KEYS {
                    store.put(&format!("key{}", i), &value).unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn get_hit_benchmark(c: &mut Criterion) {
    c.bench_function("store_get_hit_10k", |b| {
        b.iter_batched(
            build_store,
            |(_dir, store)| {
                for i in 0..N_KEYS {
                    let v = store.get(&format!("key{}", i)).unwrap();
                    assert_eq!(v.len(), VALUE_SIZE);
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn get_miss_benchmark(c: &mut Criterion) {
    c.bench_function("store_get_miss_10k", |b| {
        b.iter_batched(
            build_store,
            |(_dir, store)| {
                for i in 0..N_KEYS {
                    assert!(store.get(&format!("missing{}", i)).is_err());
                }
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, put_benchmark, get_hit_benchmark, get_miss_benchmark);
criterion_main!(benches);
