use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use klve::{RecordConfig, record_sync, transform};

const LOOP_SNIPPET: &str = "\
let total = 0;
for (let i = 0; i < 100; i++) {
  total = total + i * 2;
}
";

const CALL_SNIPPET: &str = "\
function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); }
let out = fib(12);
";

fn bench_transform(c: &mut Criterion) {
    c.bench_function("transform_loop", |b| {
        b.iter(|| transform(black_box(LOOP_SNIPPET)).expect("transform failed"));
    });
}

fn bench_record(c: &mut Criterion) {
    let config = RecordConfig::default();
    c.bench_function("record_loop", |b| {
        b.iter(|| record_sync(black_box(LOOP_SNIPPET), &config).expect("trace failed"));
    });
    c.bench_function("record_calls", |b| {
        b.iter(|| record_sync(black_box(CALL_SNIPPET), &config).expect("trace failed"));
    });
}

criterion_group!(benches, bench_transform, bench_record);
criterion_main!(benches);
