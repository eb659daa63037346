//! Core geometric types
//!
//! A `Drawing` is an ordered list of strokes; a stroke is an ordered list
//! of timestamped points. Drawings serialize as the flat point list and are
//! re-segmented on load, so both forms stay interchangeable.

use super::segmentation::{flatten_strokes, segment_strokes};
use serde::{Deserialize, Serialize};

/// A pointer sample. `t` is milliseconds since the session origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub t: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64, t: f64) -> Self {
        Self { x, y, t }
    }

    /// Euclidean distance in the x/y plane
    #[inline]
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Linear interpolation of all three coordinates
    #[inline]
    pub fn lerp(&self, other: &Point, frac: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * frac,
            y: self.y + (other.y - self.y) * frac,
            t: self.t + (other.t - self.t) * frac,
        }
    }
}

/// Contiguous pointer trajectory between two pauses
pub type Stroke = Vec<Point>;

/// One full gesture: every stroke of a single symbol attempt
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Point>", into = "Vec<Point>")]
pub struct Drawing {
    strokes: Vec<Stroke>,
}

impl Drawing {
    /// Build from explicit strokes. Empty strokes are dropped so that every
    /// stored stroke holds at least one point.
    pub fn new(strokes: Vec<Stroke>) -> Self {
        Self {
            strokes: strokes.into_iter().filter(|s| !s.is_empty()).collect(),
        }
    }

    /// Build from a flat, time-ordered point list using gap segmentation
    pub fn from_points(points: &[Point]) -> Self {
        Self {
            strokes: segment_strokes(points),
        }
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn into_strokes(self) -> Vec<Stroke> {
        self.strokes
    }

    /// Flattened point list in stroke order
    pub fn points(&self) -> Vec<Point> {
        flatten_strokes(&self.strokes)
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

impl From<Vec<Point>> for Drawing {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(&points)
    }
}

impl From<Drawing> for Vec<Point> {
    fn from(drawing: Drawing) -> Self {
        drawing.points()
    }
}
