//! Benchmarks for buffer engine operations.
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lineed_buffer::{Buffer, BufferConfig};

/// Generates a large text for benchmarking.
fn generate_large_text(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("Line {}: This is a sample line of text for benchmarking purposes.\n", i))
        .collect()
}

fn buffer_in(dir: &std::path::Path) -> Buffer {
    let config = BufferConfig {
        scratch_dir: Some(dir.to_path_buf()),
        ..BufferConfig::default()
    };
    Buffer::initialize(&config).unwrap()
}

/// Benchmarks loading text into a fresh document.
fn bench_put_lines(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut buffer = buffer_in(dir.path());
    let mut group = c.benchmark_group("put_lines");

    for size in [100, 1000, 10000].iter() {
        let text = generate_large_text(*size);

        group.bench_with_input(BenchmarkId::new("fresh_store", size), &text, |b, text| {
            b.iter(|| {
                buffer.open().unwrap();
                black_box(buffer.put_lines(black_box(text.as_bytes())).unwrap())
            })
        });
    }

    group.finish();
}

/// Benchmarks line access patterns.
fn bench_line_access(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut buffer = buffer_in(dir.path());
    buffer
        .put_lines(generate_large_text(100000).as_bytes())
        .unwrap();
    let last = buffer.last_line();

    let mut group = c.benchmark_group("line_access");

    group.bench_function("sequential_read", |b| {
        b.iter(|| {
            let mut bytes = 0;
            for n in 1..=last {
                bytes += buffer.get_line(n).unwrap().map_or(0, |line| line.len());
            }
            black_box(bytes)
        })
    });

    group.bench_function("node_at_near_cache", |b| {
        let mut n = last / 2;
        b.iter(|| {
            n = if n >= last { 1 } else { n + 1 };
            black_box(buffer.node_at(black_box(n)).unwrap())
        })
    });

    group.bench_function("node_at_alternating_ends", |b| {
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            let n = if flip { 2 } else { last - 1 };
            black_box(buffer.node_at(black_box(n)).unwrap())
        })
    });

    group.finish();
}

/// Benchmarks transliteration over a long span.
fn bench_transliterate(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut buffer = buffer_in(dir.path());
    let mut text = generate_large_text(1000).into_bytes();

    c.bench_function("transliterate_64k", |b| {
        b.iter(|| {
            let out = buffer.transliterate(black_box(text.as_mut_slice()), b' ', b'_');
            black_box(out.len())
        })
    });
}

criterion_group!(
    benches,
    bench_put_lines,
    bench_line_access,
    bench_transliterate,
);

criterion_main!(benches);
