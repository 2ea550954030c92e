//! Benchmarks for the hot paths of call execution.

use std::time::Duration;

use callflow::context::{AttributeContext, AttributeKey};
use callflow::retry::{backoff_bound, RetryStrategyOptions};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn context_benchmark(c: &mut Criterion) {
    let key = AttributeKey::<String>::from_static("bench.value");

    c.bench_function("context_set_get", |b| {
        b.iter(|| {
            let mut ctx = AttributeContext::new();
            ctx.set(&key, "value".to_string());
            black_box(ctx.get(&key))
        })
    });
}

fn backoff_benchmark(c: &mut Criterion) {
    let options = RetryStrategyOptions::new()
        .with_base_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(20));

    c.bench_function("backoff_bound", |b| {
        b.iter(|| {
            for attempt in 1..=5 {
                black_box(backoff_bound(&options, attempt, false));
            }
        })
    });
}

criterion_group!(benches, context_benchmark, backoff_benchmark);
criterion_main!(benches);
