//! Timing-gap stroke segmentation
//!
//! A flat point list carries no explicit pen-up events, so stroke breaks are
//! inferred from pauses. A fixed pause threshold breaks down across drawing
//! speeds, so the threshold adapts to the trace itself:
//!
//! ```text
//! threshold = max(10 × median(Δt), 150 ms)
//! ```
//!
//! Any consecutive pair separated by more than the threshold starts a new
//! stroke. Segmenting and flattening again is lossless.

use super::types::{Point, Stroke};

/// Multiple of the median inter-sample delta that counts as a pen lift
pub const GAP_MEDIAN_MULTIPLIER: f64 = 10.0;

/// Lower bound on the pen-lift threshold (milliseconds)
pub const MIN_GAP_THRESHOLD_MS: f64 = 150.0;

/// Median of a slice, averaging the two middle values for even lengths
fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Pen-lift threshold for a point list, `None` with fewer than two points
pub fn gap_threshold(points: &[Point]) -> Option<f64> {
    let deltas: Vec<f64> = points.windows(2).map(|w| w[1].t - w[0].t).collect();
    median(&deltas).map(|m| (m * GAP_MEDIAN_MULTIPLIER).max(MIN_GAP_THRESHOLD_MS))
}

/// Split a time-ordered point list into strokes at pauses
pub fn segment_strokes(points: &[Point]) -> Vec<Stroke> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let Some(threshold) = gap_threshold(points) else {
        return vec![vec![*first]];
    };

    let mut strokes = Vec::new();
    let mut current = vec![*first];

    for pair in points.windows(2) {
        if pair[1].t - pair[0].t > threshold {
            strokes.push(std::mem::take(&mut current));
        }
        current.push(pair[1]);
    }
    strokes.push(current);

    strokes
}

/// Concatenate strokes back into one ordered point list
pub fn flatten_strokes(strokes: &[Stroke]) -> Vec<Point> {
    strokes.iter().flatten().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed(ts: &[f64]) -> Vec<Point> {
        ts.iter()
            .enumerate()
            .map(|(i, &t)| Point::new(i as f64, (i * 2) as f64, t))
            .collect()
    }

    #[test]
    fn test_empty_and_single() {
        assert!(segment_strokes(&[]).is_empty());

        let single = timed(&[5.0]);
        assert_eq!(segment_strokes(&single), vec![single.clone()]);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_threshold_floor() {
        // 8 ms sampling: 10 × 8 = 80 < 150
        let points = timed(&[0.0, 8.0, 16.0, 24.0]);
        assert_eq!(gap_threshold(&points), Some(MIN_GAP_THRESHOLD_MS));
    }

    #[test]
    fn test_threshold_scales_with_slow_drawing() {
        let points = timed(&[0.0, 40.0, 80.0, 120.0]);
        assert_eq!(gap_threshold(&points), Some(400.0));
    }

    #[test]
    fn test_splits_on_pause() {
        let points = timed(&[0.0, 10.0, 20.0, 30.0, 400.0, 410.0, 420.0, 900.0, 910.0]);
        let strokes = segment_strokes(&points);
        assert_eq!(strokes.len(), 3);
        assert_eq!(strokes[0].len(), 4);
        assert_eq!(strokes[1].len(), 3);
        assert_eq!(strokes[2].len(), 2);
    }

    #[test]
    fn test_gap_equal_to_threshold_does_not_split() {
        let points = timed(&[0.0, 10.0, 20.0, 170.0, 180.0]);
        // median 10 → threshold 150; the 150 ms gap is not strictly greater
        assert_eq!(segment_strokes(&points).len(), 1);
    }

    #[test]
    fn test_flatten_roundtrip() {
        let points = timed(&[0.0, 10.0, 20.0, 500.0, 510.0, 1200.0]);
        let strokes = segment_strokes(&points);
        assert_eq!(flatten_strokes(&strokes), points);
    }
}
