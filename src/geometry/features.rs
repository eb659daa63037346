//! Feature assembly
//!
//! Two representations feed the classifiers:
//! - `extract_features`: fixed-length vector for the discriminative models
//! - `alignment_sequence`: variable-length (x, y) sequence for elastic matching

use super::transform::{normalize, resample_drawing, BoundingBox};
use super::types::Stroke;
use tracing::debug;

/// Strokes serialized into the feature vector; later strokes are dropped
pub const MAX_STROKES: usize = 5;

/// Resampled points per stroke
pub const POINTS_PER_STROKE: usize = 20;

/// Global scalars appended after the coordinates (stroke count, aspect ratio)
pub const GLOBAL_FEATURES: usize = 2;

/// Length of every vector produced by `extract_features`
pub const FEATURE_LEN: usize = MAX_STROKES * POINTS_PER_STROKE * 2 + GLOBAL_FEATURES;

/// Build the fixed-length feature vector for a drawing.
///
/// Layout: the first `MAX_STROKES` normalized, resampled strokes as
/// `(x, y)` pairs (stroke-major, zero-padded), then the raw stroke count and
/// the pre-normalization aspect ratio.
pub fn extract_features(strokes: &[Stroke]) -> Vec<f64> {
    let stroke_count = strokes.len() as f64;
    let aspect_ratio = BoundingBox::of_strokes(strokes)
        .map(|b| b.aspect_ratio())
        .unwrap_or(0.0);

    if strokes.len() > MAX_STROKES {
        debug!(
            strokes = strokes.len(),
            kept = MAX_STROKES,
            "Truncating drawing for feature extraction"
        );
    }

    // Normalize over the whole drawing, then keep the first strokes
    let normalized = normalize(strokes);
    let kept = &normalized[..normalized.len().min(MAX_STROKES)];
    let resampled = resample_drawing(kept, POINTS_PER_STROKE);

    let mut features = Vec::with_capacity(FEATURE_LEN);
    for i in 0..MAX_STROKES {
        match resampled.get(i) {
            Some(stroke) if !stroke.is_empty() => {
                for p in stroke {
                    features.push(p.x);
                    features.push(p.y);
                }
            }
            _ => features.extend(std::iter::repeat(0.0).take(POINTS_PER_STROKE * 2)),
        }
    }

    features.push(stroke_count);
    features.push(aspect_ratio);
    features
}

/// Normalize, resample and concatenate every stroke into one (x, y) sequence
pub fn alignment_sequence(strokes: &[Stroke], points_per_stroke: usize) -> Vec<(f64, f64)> {
    resample_drawing(&normalize(strokes), points_per_stroke)
        .iter()
        .flatten()
        .map(|p| (p.x, p.y))
        .collect()
}
