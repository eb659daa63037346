//! Random forest strategy
//!
//! Bagged CART trees with Gini impurity and a random feature subset at every
//! split. Trees are grown from a seeded RNG so the same training set always
//! yields the same forest. The ensemble cannot absorb a single new example;
//! callers retrain with the full set instead.

use super::{rank, Prediction};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_TREES: usize = 100;
pub const DEFAULT_MAX_DEPTH: usize = 24;
pub const DEFAULT_SEED: u64 = 42;

/// Smallest node that may still be split
const MIN_SAMPLES_SPLIT: usize = 2;

/// Forest hyperparameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ForestParams {
    pub trees: usize,
    pub max_depth: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            trees: DEFAULT_TREES,
            max_depth: DEFAULT_MAX_DEPTH,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    /// Class distribution of the training samples that reached this leaf
    Leaf { distribution: Vec<f64> },
    /// `value <= threshold` goes left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn distribution(&self, sample: &[f64]) -> Option<&[f64]> {
        let mut index = 0;
        loop {
            match self.nodes.get(index)? {
                Node::Leaf { distribution } => return Some(distribution),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = sample.get(*feature).copied().unwrap_or(0.0);
                    index = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Training data view shared by every tree builder
struct Dataset<'a> {
    features: &'a [Vec<f64>],
    targets: &'a [usize],
    n_classes: usize,
    n_features: usize,
}

struct TreeBuilder<'a, 'r> {
    data: &'a Dataset<'a>,
    rng: &'r mut StdRng,
    max_depth: usize,
    features_per_split: usize,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_, '_> {
    fn build(mut self, samples: Vec<usize>) -> DecisionTree {
        self.grow(samples, 0);
        DecisionTree { nodes: self.nodes }
    }

    /// Append the subtree for `samples` and return its root index
    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let counts = self.class_counts(&samples);
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;

        if pure || depth >= self.max_depth || samples.len() < MIN_SAMPLES_SPLIT {
            return self.leaf(&counts, samples.len());
        }

        let Some((feature, threshold)) = self.best_split(&samples, &counts) else {
            return self.leaf(&counts, samples.len());
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&s| self.data.features[s][feature] <= threshold);

        // Reserve this node's slot before its children
        let index = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        let left = self.grow(left, depth + 1);
        let right = self.grow(right, depth + 1);
        self.nodes[index] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        index
    }

    fn leaf(&mut self, counts: &[usize], total: usize) -> usize {
        let total = total.max(1) as f64;
        self.nodes.push(Node::Leaf {
            distribution: counts.iter().map(|&c| c as f64 / total).collect(),
        });
        self.nodes.len() - 1
    }

    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.data.n_classes];
        for &s in samples {
            counts[self.data.targets[s]] += 1;
        }
        counts
    }

    /// Lowest weighted Gini split over a random feature subset
    fn best_split(&mut self, samples: &[usize], counts: &[usize]) -> Option<(usize, f64)> {
        let n = samples.len() as f64;
        let parent = gini(counts, samples.len());
        let mut best: Option<(usize, f64, f64)> = None;

        // Random feature order; keep looking past the subset size until some split is valid
        let order = index::sample(&mut *self.rng, self.data.n_features, self.data.n_features);
        for (examined, feature) in order.iter().enumerate() {
            if examined >= self.features_per_split && best.is_some() {
                break;
            }
            let mut sorted: Vec<(f64, usize)> = samples
                .iter()
                .map(|&s| (self.data.features[s][feature], self.data.targets[s]))
                .collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0usize; self.data.n_classes];
            let mut right = counts.to_vec();

            for i in 0..sorted.len() - 1 {
                let (value, target) = sorted[i];
                left[target] += 1;
                right[target] -= 1;

                let next = sorted[i + 1].0;
                if next <= value {
                    continue;
                }

                let n_left = i + 1;
                let n_right = sorted.len() - n_left;
                let impurity = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n;

                if impurity < parent && best.map_or(true, |(_, _, b)| impurity < b) {
                    best = Some((feature, (value + next) / 2.0, impurity));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

/// Trained ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    classes: Vec<String>,
    trees: Vec<DecisionTree>,
    samples: usize,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            classes: Vec::new(),
            trees: Vec::new(),
            samples: 0,
        }
    }

    /// Grow the ensemble from scratch
    pub fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) {
        let mut classes = labels.to_vec();
        classes.sort();
        classes.dedup();

        let targets: Vec<usize> = labels
            .iter()
            .filter_map(|l| classes.binary_search(l).ok())
            .collect();

        let n_features = features.first().map_or(0, Vec::len);
        let data = Dataset {
            features,
            targets: &targets,
            n_classes: classes.len(),
            n_features,
        };
        let features_per_split = ((n_features as f64).sqrt() as usize).clamp(1, n_features.max(1));

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let n = features.len();
        let mut trees = Vec::with_capacity(self.params.trees);

        if n > 0 && n_features > 0 {
            for _ in 0..self.params.trees {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let builder = TreeBuilder {
                    data: &data,
                    rng: &mut rng,
                    max_depth: self.params.max_depth,
                    features_per_split,
                    nodes: Vec::new(),
                };
                trees.push(builder.build(bootstrap));
            }
        }

        debug!(
            trees = trees.len(),
            classes = classes.len(),
            samples = n,
            "Random forest grown"
        );

        self.classes = classes;
        self.trees = trees;
        self.samples = n;
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }

    /// Examples the current ensemble was grown from
    pub fn sample_count(&self) -> usize {
        self.samples
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Mean leaf distribution across trees, every class ranked
    pub fn predict(&self, query: &[f64]) -> Vec<Prediction> {
        if self.trees.is_empty() {
            return Vec::new();
        }

        let mut totals = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            if let Some(distribution) = tree.distribution(query) {
                for (total, p) in totals.iter_mut().zip(distribution) {
                    *total += p;
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        rank(
            self.classes
                .iter()
                .zip(totals)
                .map(|(label, total)| Prediction::new(label.clone(), total / n_trees))
                .collect(),
        )
    }
}
