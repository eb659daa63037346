//! Criterion benchmarks for recognition hot paths
//!
//! Covers: feature extraction, DTW template matching at several library
//! sizes, and nearest-neighbor prediction.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trackpad_glyphs::classifier::dtw::{dtw_distance, DtwModel, Template};
use trackpad_glyphs::classifier::knn::KnnModel;
use trackpad_glyphs::geometry::{extract_features, Point, Stroke};

/// Circle-ish stroke with `n` raw samples, offset by `phase`
fn arc(n: usize, phase: f64) -> Stroke {
    (0..n)
        .map(|i| {
            let a = phase + i as f64 / n as f64 * std::f64::consts::TAU;
            Point::new(100.0 * a.cos(), 100.0 * a.sin(), i as f64 * 8.0)
        })
        .collect()
}

fn drawing(strokes: usize, phase: f64) -> Vec<Stroke> {
    (0..strokes).map(|s| arc(60, phase + s as f64 * 0.7)).collect()
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

fn bench_extract_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_features");

    for strokes in [1, 3, 5, 8] {
        let input = drawing(strokes, 0.0);
        group.bench_with_input(BenchmarkId::new("strokes", strokes), &input, |b, input| {
            b.iter(|| black_box(extract_features(black_box(input))));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Elastic matching
// ---------------------------------------------------------------------------

fn bench_dtw_distance(c: &mut Criterion) {
    let model = DtwModel::new(5);
    let a = model.sequence(&drawing(2, 0.0));
    let b = model.sequence(&drawing(2, 0.3));

    c.bench_function("dtw_distance_40x40", |bench| {
        bench.iter(|| black_box(dtw_distance(black_box(&a), black_box(&b))));
    });
}

fn bench_dtw_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("dtw_predict");
    let query = drawing(2, 0.15);

    for templates in [10, 50, 200] {
        let mut model = DtwModel::new(5);
        let library = (0..templates)
            .map(|i| Template {
                label: format!("s{}", i % 10),
                sequence: model.sequence(&drawing(2, i as f64 * 0.01)),
            })
            .collect();
        model.fit(library);

        group.bench_with_input(BenchmarkId::new("templates", templates), &model, |b, model| {
            b.iter(|| black_box(model.predict(black_box(&query))));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Nearest neighbors
// ---------------------------------------------------------------------------

fn bench_knn_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn_predict");
    let query = extract_features(&drawing(2, 0.15));

    for examples in [20, 100, 500] {
        let mut model = KnnModel::new(3);
        let features = (0..examples)
            .map(|i| extract_features(&drawing(1 + i % 3, i as f64 * 0.01)))
            .collect();
        let labels = (0..examples).map(|i| format!("s{}", i % 10)).collect();
        model.fit(features, labels);

        group.bench_with_input(BenchmarkId::new("examples", examples), &model, |b, model| {
            b.iter(|| black_box(model.predict(black_box(&query))));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_extract_features,
    bench_dtw_distance,
    bench_dtw_predict,
    bench_knn_predict
);
criterion_main!(benches);
