//! Normalization and arc-length resampling
//!
//! Normalization removes position and size: the drawing's bounding box is
//! centered on the origin and its larger side scaled to one unit, keeping
//! the aspect ratio. Resampling removes drawing speed: each stroke is
//! re-parametrized by arc length and sampled at `n` evenly spaced positions.

use super::types::{Point, Stroke};

/// Floor for the scaled extent of degenerate drawings
pub const NORMALIZE_EPSILON: f64 = 1e-6;

/// Axis-aligned bounding box over every point of every stroke
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Compute the box, or `None` when there are no points at all
    pub fn of_strokes(strokes: &[Stroke]) -> Option<Self> {
        let mut points = strokes.iter().flatten();
        let first = points.next()?;

        let mut bbox = BoundingBox {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in points {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Larger of width and height
    pub fn max_extent(&self) -> f64 {
        self.width().max(self.height())
    }

    /// Width over height, 0 when the box has no height
    pub fn aspect_ratio(&self) -> f64 {
        let height = self.height();
        if height > 0.0 {
            self.width() / height
        } else {
            0.0
        }
    }
}

/// Center the drawing on the origin and scale its larger side to 1.
///
/// Timestamps pass through unchanged. A zero-extent drawing keeps the
/// epsilon scale, which leaves every point at the origin.
pub fn normalize(strokes: &[Stroke]) -> Vec<Stroke> {
    let Some(bbox) = BoundingBox::of_strokes(strokes) else {
        return strokes.to_vec();
    };

    let scale = 1.0 / bbox.max_extent().max(NORMALIZE_EPSILON);
    let (cx, cy) = bbox.center();

    strokes
        .iter()
        .map(|stroke| {
            stroke
                .iter()
                .map(|p| Point {
                    x: (p.x - cx) * scale,
                    y: (p.y - cy) * scale,
                    t: p.t,
                })
                .collect()
        })
        .collect()
}

/// Resample a stroke to exactly `n` points evenly spaced along its path.
///
/// Single-point and zero-length strokes yield `n` copies of the first point.
/// An empty stroke yields an empty stroke.
pub fn resample_stroke(stroke: &[Point], n: usize) -> Stroke {
    let Some(first) = stroke.first() else {
        return Vec::new();
    };
    if n == 0 {
        return Vec::new();
    }
    if stroke.len() == 1 {
        return vec![*first; n];
    }

    let mut cumulative = Vec::with_capacity(stroke.len());
    cumulative.push(0.0);
    for pair in stroke.windows(2) {
        let last = cumulative[cumulative.len() - 1];
        cumulative.push(last + pair[0].distance_to(&pair[1]));
    }
    let total = cumulative[cumulative.len() - 1];

    if total <= 0.0 {
        return vec![*first; n];
    }
    if n == 1 {
        return vec![*first];
    }

    let last_index = stroke.len() - 1;
    let mut resampled = Vec::with_capacity(n);
    let mut segment = 0;

    for i in 0..n {
        let target = total * i as f64 / (n - 1) as f64;

        // Advance to the segment containing the target distance
        while segment < last_index - 1 && cumulative[segment + 1] < target {
            segment += 1;
        }

        let start = cumulative[segment];
        let length = cumulative[segment + 1] - start;
        let frac = if length > 0.0 {
            ((target - start) / length).clamp(0.0, 1.0)
        } else {
            0.0
        };
        resampled.push(stroke[segment].lerp(&stroke[segment + 1], frac));
    }

    // Pin the end exactly; accumulated float error must not move it
    resampled[n - 1] = stroke[last_index];
    resampled
}

/// Resample every stroke independently
pub fn resample_drawing(strokes: &[Stroke], points_per_stroke: usize) -> Vec<Stroke> {
    strokes
        .iter()
        .map(|s| resample_stroke(s, points_per_stroke))
        .collect()
}
