//! Key wrapping and cache benchmarks.

use colkms_bench::store_for_columns;
use colkms_core::{
    CacheKey, CachedKey, DataKey, EncryptionRole, KeyCache, KeyLength, KeyWrapper, KmsResult,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

/// Benchmark wrapping a data key.
fn bench_wrap(c: &mut Criterion) {
    let mut group = c.benchmark_group("wrap");
    let wrapper = KeyWrapper::new(Arc::new(store_for_columns(1)));

    for length in [KeyLength::Bits128, KeyLength::Bits256] {
        let dek = DataKey::generate(length);
        group.bench_with_input(BenchmarkId::from_parameter(length.bits()), &dek, |b, dek| {
            b.iter(|| black_box(wrapper.wrap(black_box(dek), "key_0").unwrap()));
        });
    }

    group.finish();
}

/// Benchmark unwrapping a data key.
fn bench_unwrap(c: &mut Criterion) {
    let mut group = c.benchmark_group("unwrap");
    let wrapper = KeyWrapper::new(Arc::new(store_for_columns(1)));

    for length in [KeyLength::Bits128, KeyLength::Bits256] {
        let wrapped = wrapper.wrap(&DataKey::generate(length), "key_0").unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(length.bits()),
            &wrapped,
            |b, wrapped| {
                b.iter(|| black_box(wrapper.unwrap(black_box(wrapped), "key_0").unwrap()));
            },
        );
    }

    group.finish();
}

/// Benchmark cache lookups against fresh generation.
fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");
    let wrapper = KeyWrapper::new(Arc::new(store_for_columns(1)));
    let generate = || -> KmsResult<CachedKey> {
        let dek = DataKey::generate(KeyLength::Bits128);
        let wrapped = wrapper.wrap(&dek, "key_0")?;
        Ok(CachedKey::new(dek, wrapped))
    };

    let cache = KeyCache::new(Duration::from_secs(3600));
    let role = EncryptionRole::column("col_0");
    cache.get_or_create(&role, "key_0", KeyLength::Bits128, generate).unwrap();
    group.bench_function("hit", |b| {
        b.iter(|| {
            black_box(
                cache
                    .get_or_create(&role, "key_0", KeyLength::Bits128, generate)
                    .unwrap(),
            )
        });
    });

    group.bench_function("miss", |b| {
        let cache = KeyCache::new(Duration::from_secs(3600));
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            let key = CacheKey::wrap(
                EncryptionRole::column(format!("col_{n}")),
                "key_0",
                KeyLength::Bits128,
            );
            black_box(cache.get_or_create_with(key, cache.lifetime(), generate).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_wrap, bench_unwrap, bench_cache);

criterion_main!(benches);
