//! End-to-end classifier tests
//!
//! Jittered synthetic symbols are trained and recognized through
//! `SymbolClassifier` for every strategy, including persistence, incremental
//! learning and reset.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;
use trackpad_glyphs::classifier::{ModelKind, Prediction, SymbolClassifier};
use trackpad_glyphs::geometry::{Drawing, Point, Stroke};

const SIZE: f64 = 100.0;
const JITTER: f64 = 0.05 * SIZE;

/// Straight segment in unit coordinates, scaled, jittered and timestamped
fn segment(rng: &mut StdRng, from: (f64, f64), to: (f64, f64), t0: f64) -> Stroke {
    (0..12)
        .map(|i| {
            let f = i as f64 / 11.0;
            Point::new(
                (from.0 + (to.0 - from.0) * f) * SIZE + rng.gen_range(-JITTER..JITTER),
                (from.1 + (to.1 - from.1) * f) * SIZE + rng.gen_range(-JITTER..JITTER),
                t0 + i as f64 * 10.0,
            )
        })
        .collect()
}

/// "A": two diagonals and a crossbar
fn letter_a(rng: &mut StdRng) -> Drawing {
    Drawing::new(vec![
        segment(rng, (0.0, 1.0), (0.5, 0.0), 0.0),
        segment(rng, (0.5, 0.0), (1.0, 1.0), 500.0),
        segment(rng, (0.25, 0.5), (0.75, 0.5), 1000.0),
    ])
}

/// Jittered polyline through `vertices`, sampled evenly per edge
fn polyline(rng: &mut StdRng, vertices: &[(f64, f64)], t0: f64) -> Stroke {
    let mut stroke = Vec::new();
    let mut t = t0;
    for pair in vertices.windows(2) {
        let edge = segment(rng, pair[0], pair[1], t);
        t = edge.last().map_or(t, |p| p.t);
        // Consecutive edges share their joining vertex
        let skip = usize::from(!stroke.is_empty());
        stroke.extend(edge.into_iter().skip(skip));
    }
    stroke
}

/// "B": stem, then one stroke with two bumps
fn letter_b(rng: &mut StdRng) -> Drawing {
    Drawing::new(vec![
        segment(rng, (0.0, 0.0), (0.0, 1.0), 0.0),
        polyline(
            rng,
            &[(0.0, 0.0), (0.7, 0.1), (0.7, 0.4), (0.0, 0.5), (0.8, 0.6), (0.8, 0.9), (0.0, 1.0)],
            500.0,
        ),
    ])
}

fn training_set(rng: &mut StdRng, per_class: usize) -> (Vec<Drawing>, Vec<String>) {
    let mut drawings = Vec::new();
    let mut labels = Vec::new();
    for _ in 0..per_class {
        drawings.push(letter_a(rng));
        labels.push("A".to_string());
        drawings.push(letter_b(rng));
        labels.push("B".to_string());
    }
    (drawings, labels)
}

#[test]
fn test_every_strategy_recognizes_jittered_symbols() {
    let dir = TempDir::new().unwrap();
    let mut rng = StdRng::seed_from_u64(2024);
    let (drawings, labels) = training_set(&mut rng, 10);

    for kind in ModelKind::ALL {
        let classifier = SymbolClassifier::new(kind, dir.path().join("glyphs"));
        assert_eq!(classifier.train(&drawings, &labels).unwrap(), 20);

        for _ in 0..10 {
            let a = classifier.predict(&letter_a(&mut rng));
            assert_eq!(a[0].label, "A", "{} misread A: {:?}", kind, a);
            let b = classifier.predict(&letter_b(&mut rng));
            assert_eq!(b[0].label, "B", "{} misread B: {:?}", kind, b);
        }
    }
}

#[test]
fn test_confidences_are_probabilities() {
    let dir = TempDir::new().unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let (drawings, labels) = training_set(&mut rng, 5);

    for kind in [ModelKind::Knn, ModelKind::RandomForest] {
        let classifier = SymbolClassifier::new(kind, dir.path().join("glyphs"));
        classifier.train(&drawings, &labels).unwrap();

        let ranked = classifier.predict(&letter_a(&mut rng));
        assert_eq!(ranked.len(), 2);
        let total: f64 = ranked.iter().map(|p| p.confidence).sum();
        assert!((total - 1.0).abs() < 1e-9, "{}: {}", kind, total);
        assert!(ranked.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }
}

#[test]
fn test_saved_models_are_per_strategy() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("glyphs");
    let mut rng = StdRng::seed_from_u64(9);
    let (drawings, labels) = training_set(&mut rng, 3);

    SymbolClassifier::new(ModelKind::Knn, &base).train(&drawings, &labels).unwrap();
    assert!(dir.path().join("glyphs_knn.json").exists());
    assert!(!dir.path().join("glyphs_dtw.json").exists());

    // A fresh DTW classifier finds nothing to load
    let dtw = SymbolClassifier::new(ModelKind::Dtw, &base);
    assert!(!dtw.load());
    assert_eq!(dtw.predict(&letter_b(&mut rng)), vec![Prediction::uninitialized()]);

    let knn = SymbolClassifier::new(ModelKind::Knn, &base);
    assert!(knn.load());
    assert_eq!(knn.predict(&letter_b(&mut rng))[0].label, "B");
}

#[test]
fn test_dtw_add_example_matches_itself() {
    let dir = TempDir::new().unwrap();
    let mut rng = StdRng::seed_from_u64(77);
    let classifier = SymbolClassifier::new(ModelKind::Dtw, dir.path().join("glyphs"));

    let sample = letter_a(&mut rng);
    assert!(classifier.add_example(&sample, "A"));
    assert!(classifier.add_example(&letter_b(&mut rng), "B"));
    assert!(classifier.model_path().exists());

    let ranked = classifier.predict(&sample);
    assert_eq!(ranked[0].label, "A");
    assert!(ranked[0].distance.unwrap() < 1e-9);
    assert!((ranked[0].confidence - 1.0).abs() < 1e-9);
    assert!(ranked[1].confidence < 1.0);
}

#[test]
fn test_dtw_single_point_is_empty() {
    let dir = TempDir::new().unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let classifier = SymbolClassifier::new(ModelKind::Dtw, dir.path().join("glyphs"));
    classifier.add_example(&letter_a(&mut rng), "A");

    let dot = Drawing::new(vec![vec![Point::new(4.0, 4.0, 0.0)]]);
    assert_eq!(classifier.predict(&dot), vec![Prediction::empty()]);
}

#[test]
fn test_knn_add_example_extends_loaded_model() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("glyphs");
    let mut rng = StdRng::seed_from_u64(13);
    let (drawings, labels) = training_set(&mut rng, 4);
    SymbolClassifier::new(ModelKind::Knn, &base).train(&drawings, &labels).unwrap();

    // A new process adds to the saved model instead of starting over
    let knn = SymbolClassifier::new(ModelKind::Knn, &base);
    assert!(knn.add_example(&letter_a(&mut rng), "A"));
    assert_eq!(knn.example_count(), 9);

    let reloaded = SymbolClassifier::new(ModelKind::Knn, &base);
    assert!(reloaded.load());
    assert_eq!(reloaded.example_count(), 9);
}

#[test]
fn test_forest_needs_full_retrain() {
    let dir = TempDir::new().unwrap();
    let mut rng = StdRng::seed_from_u64(17);
    let (drawings, labels) = training_set(&mut rng, 4);
    let forest = SymbolClassifier::new(ModelKind::RandomForest, dir.path().join("glyphs"));
    forest.train(&drawings, &labels).unwrap();

    assert!(!forest.add_example(&letter_a(&mut rng), "A"));
    assert_eq!(forest.example_count(), 8);
}

#[test]
fn test_reset_forgets_everything() {
    let dir = TempDir::new().unwrap();
    let mut rng = StdRng::seed_from_u64(21);
    let (drawings, labels) = training_set(&mut rng, 3);

    for kind in ModelKind::ALL {
        let classifier = SymbolClassifier::new(kind, dir.path().join("glyphs"));
        classifier.train(&drawings, &labels).unwrap();
        assert!(classifier.model_path().exists());

        classifier.reset().unwrap();
        assert!(!classifier.is_trained());
        assert!(!classifier.model_path().exists());
        assert_eq!(classifier.example_count(), 0);
        assert_eq!(classifier.predict(&letter_a(&mut rng)), vec![Prediction::uninitialized()]);

        // Resetting twice is harmless
        classifier.reset().unwrap();
    }
}

#[test]
fn test_lazy_load_racing_add_example_keeps_the_example() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("glyphs");
    let mut rng = StdRng::seed_from_u64(31);
    let (drawings, labels) = training_set(&mut rng, 20);
    SymbolClassifier::new(ModelKind::Knn, &base).train(&drawings, &labels).unwrap();
    let query = letter_a(&mut rng);
    let extra = letter_b(&mut rng);

    for round in 0..50 {
        // Every round starts from a file holding 40 + round examples
        let expected = 40 + round + 1;
        let classifier = Arc::new(SymbolClassifier::new(ModelKind::Knn, &base));
        let barrier = Arc::new(Barrier::new(2));

        let writer = {
            let (classifier, barrier, extra) = (classifier.clone(), barrier.clone(), extra.clone());
            thread::spawn(move || {
                barrier.wait();
                assert!(classifier.add_example(&extra, "B"));
            })
        };
        let reader = {
            let (classifier, barrier, query) = (classifier.clone(), barrier.clone(), query.clone());
            thread::spawn(move || {
                barrier.wait();
                assert!(!classifier.predict(&query)[0].is_sentinel());
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();

        assert_eq!(classifier.example_count(), expected, "round {}", round);
        let reloaded = SymbolClassifier::new(ModelKind::Knn, &base);
        assert!(reloaded.load());
        assert_eq!(reloaded.example_count(), expected, "round {}", round);
    }
}

#[test]
fn test_predict_during_train_and_teach() {
    let dir = TempDir::new().unwrap();
    let mut rng = StdRng::seed_from_u64(37);
    let (drawings, labels) = training_set(&mut rng, 10);
    let extras: Vec<Drawing> = (0..10).map(|_| letter_a(&mut rng)).collect();
    let query = letter_b(&mut rng);

    for kind in [ModelKind::Knn, ModelKind::Dtw] {
        let classifier = Arc::new(SymbolClassifier::new(kind, dir.path().join(kind.name())));
        let barrier = Arc::new(Barrier::new(3));

        let writer = {
            let (classifier, barrier) = (classifier.clone(), barrier.clone());
            let (drawings, labels, extras) = (drawings.clone(), labels.clone(), extras.clone());
            thread::spawn(move || {
                barrier.wait();
                classifier.train(&drawings, &labels).unwrap();
                for drawing in &extras {
                    assert!(classifier.add_example(drawing, "A"));
                }
            })
        };
        let readers: Vec<_> = (0..2)
            .map(|_| {
                let (classifier, barrier, query) = (classifier.clone(), barrier.clone(), query.clone());
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..50 {
                        let ranked = classifier.predict(&query);
                        assert!(!ranked.is_empty());
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(classifier.example_count(), 30, "{}", kind);
        let reloaded = SymbolClassifier::new(kind, dir.path().join(kind.name()));
        assert!(reloaded.load());
        assert_eq!(reloaded.example_count(), 30, "{}", kind);
    }
}
