//! Criterion benchmarks for the output relay hot path.
//!
//! Run with: `cargo bench -p session`
//!
//! Every chunk a process writes goes through UTF-8 decoding, the listing
//! highlight and, when speech is armed, escape stripping.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use session::listing::highlight;
use session::relay::{speakable, strip_ansi, Utf8Carry};

fn listing_output(lines: usize) -> String {
    let mut text = String::from("total 64\r\n");
    for i in 0..lines {
        let kind = match i % 3 {
            0 => "drwxr-xr-x",
            1 => "-rw-r--r--",
            _ => "lrwxrwxrwx",
        };
        text.push_str(&format!(
            "{kind} 1 user staff {} Jan 1 12:00 entry{i}\r\n",
            i * 512
        ));
    }
    text
}

fn colored_output(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("\x1b[1;3{}mline {i}\x1b[0m plain text after color\r\n", i % 8))
        .collect()
}

// ============================================================================
// Listing highlight
// ============================================================================

fn bench_highlight(c: &mut Criterion) {
    let mut group = c.benchmark_group("listing_highlight");

    for lines in [10, 100, 1000] {
        let text = listing_output(lines);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("enabled", lines), &text, |b, text| {
            b.iter(|| highlight(black_box(text), true))
        });
    }

    // Most output is not a listing
    let text = colored_output(100);
    group.bench_function("no_listing_lines", |b| {
        b.iter(|| highlight(black_box(&text), true))
    });
    group.bench_function("disabled", |b| {
        b.iter(|| highlight(black_box(&text), false))
    });

    group.finish();
}

// ============================================================================
// Speech text
// ============================================================================

fn bench_strip_ansi(c: &mut Criterion) {
    let mut group = c.benchmark_group("strip_ansi");

    for lines in [1, 50, 500] {
        let text = colored_output(lines);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("colored", lines), &text, |b, text| {
            b.iter(|| strip_ansi(black_box(text)))
        });
    }

    let plain = "plain output without any escapes\r\n".repeat(50);
    group.bench_function("plain", |b| b.iter(|| strip_ansi(black_box(&plain))));
    group.bench_function("speakable", |b| {
        let text = colored_output(50);
        b.iter(|| speakable(black_box(&text)))
    });

    group.finish();
}

// ============================================================================
// UTF-8 decoding
// ============================================================================

fn bench_utf8_carry(c: &mut Criterion) {
    let mut group = c.benchmark_group("utf8_carry");

    let text = "ascii, café, naïve, 日本語, emoji 🎉\r\n".repeat(100);
    let bytes = text.as_bytes();
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("whole", |b| {
        b.iter(|| Utf8Carry::default().decode(black_box(bytes)))
    });

    // Odd chunk sizes split multi-byte sequences
    for chunk in [7, 64, 4096] {
        group.bench_with_input(BenchmarkId::new("chunked", chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut carry = Utf8Carry::default();
                let mut out = String::with_capacity(bytes.len());
                for part in bytes.chunks(chunk) {
                    out.push_str(&carry.decode(black_box(part)));
                }
                out
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_highlight, bench_strip_ansi, bench_utf8_carry);
criterion_main!(benches);
