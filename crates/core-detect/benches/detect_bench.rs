use core_config::BulkDetectionConfig;
use core_detect::{ChangeTracker, detect};
use core_text::{Edit, Position, TextRange};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::{Duration, Instant};

fn batch(edits: usize, chars: usize) -> Vec<Edit> {
    let text = "x".repeat(chars);
    (0..edits)
        .map(|i| Edit::new(TextRange::caret(Position::new(i, 0)), 0, 0, text.clone()))
        .collect()
}

fn bench_keystroke(c: &mut Criterion) {
    let cfg = BulkDetectionConfig::default();
    let keystroke = batch(1, 1);
    c.bench_function("detect_single_keystroke", |b| {
        let mut tracker = ChangeTracker::new();
        let mut now = Instant::now();
        b.iter(|| {
            now += Duration::from_millis(120);
            black_box(detect(black_box(&keystroke), &mut tracker, &cfg, now))
        })
    });
}

fn bench_multi_cursor(c: &mut Criterion) {
    let cfg = BulkDetectionConfig {
        max_changes: 0,
        ..BulkDetectionConfig::default()
    };
    let wide = batch(500, 4);
    c.bench_function("detect_multi_cursor_500", |b| {
        let mut tracker = ChangeTracker::new();
        let mut now = Instant::now();
        b.iter(|| {
            now += Duration::from_millis(5);
            black_box(detect(black_box(&wide), &mut tracker, &cfg, now))
        })
    });
}

criterion_group!(benches, bench_keystroke, bench_multi_cursor);
criterion_main!(benches);
