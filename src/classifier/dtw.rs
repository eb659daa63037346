//! Elastic template matching
//!
//! Every example is kept as a template: the drawing normalized, resampled to
//! a fixed number of points per stroke and concatenated into one (x, y)
//! sequence. A query is compared against every template with dynamic time
//! warping, so strokes drawn faster or slower still line up.

use super::Prediction;
use crate::geometry::{alignment_sequence, normalize, Stroke, POINTS_PER_STROKE};
use serde::{Deserialize, Serialize};

/// Labels reported per query
pub const DEFAULT_MAX_CANDIDATES: usize = 5;

/// One stored example
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub label: String,
    pub sequence: Vec<(f64, f64)>,
}

/// Template library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DtwModel {
    points_per_stroke: usize,
    max_candidates: usize,
    templates: Vec<Template>,
}

impl DtwModel {
    pub fn new(max_candidates: usize) -> Self {
        Self {
            points_per_stroke: POINTS_PER_STROKE,
            max_candidates: max_candidates.max(1),
            templates: Vec::new(),
        }
    }

    /// Sequence representation used for both templates and queries
    pub fn sequence(&self, strokes: &[Stroke]) -> Vec<(f64, f64)> {
        alignment_sequence(strokes, self.points_per_stroke)
    }

    /// Replace the library
    pub fn fit(&mut self, templates: Vec<Template>) {
        self.templates = templates;
    }

    pub fn push(&mut self, template: Template) {
        self.templates.push(template);
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// Best match per label, closest first, at most `max_candidates` labels.
    ///
    /// A drawing with fewer than two points after normalization yields the
    /// `Empty` sentinel.
    pub fn predict(&self, strokes: &[Stroke]) -> Vec<Prediction> {
        let point_count: usize = normalize(strokes).iter().map(Vec::len).sum();
        if point_count < 2 {
            return vec![Prediction::empty()];
        }

        let query = self.sequence(strokes);
        let mut matches: Vec<(f64, &str)> = self
            .templates
            .iter()
            .map(|t| (dtw_distance(&query, &t.sequence), t.label.as_str()))
            .collect();
        matches.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut ranked: Vec<Prediction> = Vec::new();
        for (distance, label) in matches {
            if ranked.len() == self.max_candidates {
                break;
            }
            if ranked.iter().any(|p| p.label == label) {
                continue;
            }
            ranked.push(Prediction::from_distance(label, distance));
        }
        ranked
    }
}

/// Cumulative Euclidean cost of the optimal monotonic alignment.
///
/// Each step advances one sequence, the other or both. Empty input has no
/// alignment and yields infinity.
pub fn dtw_distance(a: &[(f64, f64)], b: &[(f64, f64)]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return f64::INFINITY;
    }

    // Two rows of the cost matrix, indexed by position in `b` (+1 for the border)
    let mut previous = vec![f64::INFINITY; b.len() + 1];
    let mut current = vec![f64::INFINITY; b.len() + 1];
    previous[0] = 0.0;

    for &(ax, ay) in a {
        current[0] = f64::INFINITY;
        for (j, &(bx, by)) in b.iter().enumerate() {
            let cost = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();
            let best = previous[j].min(previous[j + 1]).min(current[j]);
            current[j + 1] = cost + best;
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn line(dx: f64, dy: f64) -> Vec<Stroke> {
        vec![(0..10)
            .map(|i| Point::new(i as f64 * dx, i as f64 * dy, i as f64 * 10.0))
            .collect()]
    }

    fn model_with(shapes: &[(&str, Vec<Stroke>)]) -> DtwModel {
        let mut model = DtwModel::new(DEFAULT_MAX_CANDIDATES);
        for (label, strokes) in shapes {
            let sequence = model.sequence(strokes);
            model.push(Template {
                label: label.to_string(),
                sequence,
            });
        }
        model
    }

    #[test]
    fn test_identical_sequences_have_zero_distance() {
        let seq = vec![(0.0, 0.0), (0.5, 0.5), (1.0, 1.0)];
        assert_eq!(dtw_distance(&seq, &seq), 0.0);
    }

    #[test]
    fn test_warping_absorbs_repeated_points() {
        let a = vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)];
        let b = vec![(0.0, 0.0), (0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 0.0)];
        assert_eq!(dtw_distance(&a, &b), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = vec![(0.0, 0.0), (1.0, 2.0), (3.0, 1.0)];
        let b = vec![(0.5, 0.0), (2.0, 2.0)];
        assert!((dtw_distance(&a, &b) - dtw_distance(&b, &a)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sequence_is_infinitely_far() {
        assert!(dtw_distance(&[], &[(0.0, 0.0)]).is_infinite());
    }

    #[test]
    fn test_best_match_first_and_deduplicated() {
        let model = model_with(&[
            ("-", line(1.0, 0.0)),
            ("|", line(0.0, 1.0)),
            ("-", line(1.0, 0.05)),
            ("\\", line(1.0, 1.0)),
        ]);

        let ranked = model.predict(&line(1.0, 0.0));
        assert_eq!(ranked[0].label, "-");
        assert_eq!(ranked[0].distance, Some(0.0));
        assert_eq!(ranked[0].confidence, 1.0);
        assert_eq!(ranked.iter().filter(|p| p.label == "-").count(), 1);
        assert_eq!(ranked.len(), 3);
        assert!(ranked.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn test_candidates_capped() {
        let shapes: Vec<(String, Vec<Stroke>)> = (0..8)
            .map(|i| (format!("s{}", i), line(1.0, i as f64 * 0.2)))
            .collect();
        let borrowed: Vec<(&str, Vec<Stroke>)> =
            shapes.iter().map(|(l, s)| (l.as_str(), s.clone())).collect();
        let model = model_with(&borrowed);
        assert_eq!(model.predict(&line(1.0, 0.0)).len(), DEFAULT_MAX_CANDIDATES);
    }

    #[test]
    fn test_degenerate_query_is_empty_sentinel() {
        let model = model_with(&[("-", line(1.0, 0.0))]);
        let single = vec![vec![Point::new(3.0, 3.0, 0.0)]];
        assert_eq!(model.predict(&single), vec![Prediction::empty()]);
        assert_eq!(model.predict(&[]), vec![Prediction::empty()]);
    }
}
