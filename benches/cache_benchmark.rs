use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use adsense_gateway::cache::{earnings_key, CacheKey, ResponseCache, TtlCache};
use adsense_gateway::DateQuery;
use serde_json::json;
use std::time::Duration;

fn setup_cache(entries: usize) -> TtlCache {
    let cache = TtlCache::new(Duration::from_secs(300));

    // Populate with report-shaped payloads
    for i in 0..entries {
        cache.set(
            &format!("report{}", i),
            json!({
                "account_key": format!("site{}", i),
                "earnings": i as f64 * 1.5,
                "clicks": i,
                "impressions": i * 100,
            }),
            None,
        );
    }

    cache
}

fn bench_cache_get(c: &mut Criterion) {
    let cache = setup_cache(1000);

    c.bench_function("cache_get_hit", |b| {
        b.iter(|| black_box(cache.get("report500")));
    });

    c.bench_function("cache_get_miss", |b| {
        b.iter(|| black_box(cache.get("nonexistent")));
    });
}

fn bench_cache_set(c: &mut Criterion) {
    let cache = TtlCache::default();
    let value = json!({"earnings": 3.23, "clicks": 9, "impressions": 930});

    c.bench_function("cache_set", |b| {
        b.iter(|| cache.set(black_box("summary"), value.clone(), None));
    });
}

fn bench_cache_maintenance(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_maintenance");

    for size in [100, 1000] {
        let cache = setup_cache(size);
        group.bench_with_input(BenchmarkId::new("stats", size), &cache, |b, cache| {
            b.iter(|| black_box(cache.stats()));
        });
        group.bench_with_input(BenchmarkId::new("cache_info", size), &cache, |b, cache| {
            b.iter(|| black_box(cache.cache_info()));
        });
        group.bench_with_input(BenchmarkId::new("cleanup_expired", size), &cache, |b, cache| {
            b.iter(|| black_box(cache.cleanup_expired()));
        });
    }

    group.finish();
}

fn bench_key_building(c: &mut Criterion) {
    let query = DateQuery::range("2025-10-01", "2025-10-07");

    c.bench_function("earnings_key", |b| {
        b.iter(|| black_box(earnings_key(black_box("perpustakaan"), &query)));
    });

    c.bench_function("cache_key_many_params", |b| {
        b.iter(|| {
            let key = (0..10).fold(CacheKey::new("bench"), |key, i| {
                key.param(format!("param{}", i), format!("value{}", i))
            });
            black_box(key.build())
        });
    });
}

criterion_group!(
    benches,
    bench_cache_get,
    bench_cache_set,
    bench_cache_maintenance,
    bench_key_building
);
criterion_main!(benches);
