//! Benchmarks for batch folding and commit message synthesis.
//!
//! **Benchmarks Included:**
//! - `coalesce`: folding noisy batches of 100, 1000 and 10000 raw events
//! - `generate_message`: message synthesis for short and itemised batches
//!
//! **Run benchmarks:**
//! ```bash
//! cargo bench                       # Run all benchmarks
//! cargo bench -- coalesce           # Coalescer only
//! ```

use bolthole::git::generate_message;
use bolthole::watcher::{coalesce, Event};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// An editor-like batch: saves through temp files, repeated writes, a few
/// renames and deletes, spread over `files` distinct paths.
fn noisy_batch(len: usize, files: usize) -> Vec<Event> {
    (0..len)
        .map(|i| {
            let path = format!("src/module{:04}/file.rs", i % files);
            match i % 7 {
                0 => Event::created(&path),
                1 | 2 | 3 => Event::modified(&path),
                4 => Event::renamed(&path, format!("{path}.bak")),
                5 => Event::deleted(format!("{path}.bak")),
                _ => Event::created(format!("{path}.swp")),
            }
        })
        .collect()
}

fn bench_coalesce(c: &mut Criterion) {
    let mut group = c.benchmark_group("coalesce");

    for len in [100, 1000, 10_000] {
        let batch = noisy_batch(len, len / 10);
        group.bench_with_input(BenchmarkId::from_parameter(len), &batch, |b, batch| {
            b.iter(|| coalesce(black_box(batch)));
        });
    }

    group.finish();
}

fn bench_generate_message(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_message");

    let short = vec![Event::created("a.txt"), Event::created("b.txt")];
    group.bench_function("sentence", |b| {
        b.iter(|| generate_message(black_box(&short)));
    });

    let long = coalesce(&noisy_batch(1000, 200));
    group.bench_function("itemised", |b| {
        b.iter(|| generate_message(black_box(&long)));
    });

    group.finish();
}

criterion_group!(benches, bench_coalesce, bench_generate_message);
criterion_main!(benches);
