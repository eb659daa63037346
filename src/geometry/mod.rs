//! Geometry utilities
//!
//! Stateless functions that turn a raw, noisy pointer trace into a
//! comparable representation:
//! - Timing-gap stroke segmentation (adaptive, median based)
//! - Bounding-box normalization to a unit square
//! - Arc-length resampling to a fixed point count per stroke
//! - Fixed-length feature vectors and flattened alignment sequences

pub mod types;
pub mod transform;
pub mod segmentation;
pub mod features;

pub use types::{Drawing, Point, Stroke};
pub use transform::{normalize, resample_drawing, resample_stroke, BoundingBox};
pub use segmentation::{flatten_strokes, segment_strokes};
pub use features::{alignment_sequence, extract_features, FEATURE_LEN, MAX_STROKES, POINTS_PER_STROKE};
