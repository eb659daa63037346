//! k-Nearest-Neighbor strategy
//!
//! Instance-based: the model is the indexed table of training feature
//! vectors. Adding an example appends a row, so incremental learning needs
//! no refit beyond the append.

use super::{rank, Prediction};
use serde::{Deserialize, Serialize};

/// Default neighbor count
pub const DEFAULT_NEIGHBORS: usize = 3;

/// Retained training table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnModel {
    k: usize,
    features: Vec<Vec<f64>>,
    labels: Vec<String>,
}

impl KnnModel {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            features: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Replace the table with a new training set
    pub fn fit(&mut self, features: Vec<Vec<f64>>, labels: Vec<String>) {
        debug_assert_eq!(features.len(), labels.len());
        self.features = features;
        self.labels = labels;
    }

    /// Append one example to the table
    pub fn push(&mut self, features: Vec<f64>, label: &str) {
        self.features.push(features);
        self.labels.push(label.to_string());
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Distinct labels, sorted
    pub fn classes(&self) -> Vec<String> {
        let mut classes = self.labels.clone();
        classes.sort();
        classes.dedup();
        classes
    }

    /// Class likelihoods from uniform neighbor votes.
    ///
    /// Every known class is returned, including those with no votes, sorted by
    /// descending confidence (ties alphabetical). When fewer than `k` examples
    /// exist, all of them vote.
    pub fn predict(&self, query: &[f64]) -> Vec<Prediction> {
        if self.features.is_empty() {
            return Vec::new();
        }

        let mut neighbors: Vec<(f64, usize)> = self
            .features
            .iter()
            .enumerate()
            .map(|(i, row)| (euclidean(row, query), i))
            .collect();
        // Ties resolved by insertion order
        neighbors.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let k = self.k.min(neighbors.len());
        let weight = 1.0 / k as f64;

        let mut scored: Vec<Prediction> = self
            .classes()
            .into_iter()
            .map(|label| Prediction::new(label, 0.0))
            .collect();

        for &(distance, index) in &neighbors[..k] {
            let label = &self.labels[index];
            if let Some(p) = scored.iter_mut().find(|p| &p.label == label) {
                p.confidence += weight;
                if p.distance.map_or(true, |d| distance < d) {
                    p.distance = Some(distance);
                }
            }
        }

        rank(scored)
    }
}

pub(crate) fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
