//! Symbol classification
//!
//! Three interchangeable strategies behind one facade:
//! - [`knn`]: nearest neighbors over fixed-length feature vectors
//! - [`forest`]: random forest over the same vectors (no incremental updates)
//! - [`dtw`]: elastic matching against stored templates
//!
//! The strategy is chosen once, at construction. Model state sits behind a
//! read-write lock so recognition can run while another caller teaches a new
//! example; writers are serialized.

pub mod knn;
pub mod forest;
pub mod dtw;
mod persist;

use crate::geometry::{alignment_sequence, extract_features, Drawing, POINTS_PER_STROKE};
use dtw::{DtwModel, Template};
use forest::{ForestParams, RandomForest};
use knn::KnnModel;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Label returned when no model could be trained or loaded
pub const UNINITIALIZED_LABEL: &str = "Uninitialized";

/// Label returned for drawings too small to match
pub const EMPTY_LABEL: &str = "Empty";

/// Available strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "knn")]
    Knn,
    #[serde(rename = "rf")]
    RandomForest,
    #[serde(rename = "dtw")]
    Dtw,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Knn, ModelKind::RandomForest, ModelKind::Dtw];

    /// Short name, also used in the model file name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Knn => "knn",
            Self::RandomForest => "rf",
            Self::Dtw => "dtw",
        }
    }

    /// Whether `add_example` updates the model in place
    pub const fn supports_incremental(&self) -> bool {
        !matches!(self, Self::RandomForest)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "knn" => Ok(Self::Knn),
            "rf" | "random_forest" | "forest" => Ok(Self::RandomForest),
            "dtw" => Ok(Self::Dtw),
            other => Err(crate::Error::UnknownModel(other.to_string())),
        }
    }
}

/// One ranked recognition candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// In `[0, 1]`, higher is better
    pub confidence: f64,
    /// Match distance, for strategies that measure one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            distance: None,
        }
    }

    /// Confidence approximated as `1 / (1 + distance)`
    pub fn from_distance(label: impl Into<String>, distance: f64) -> Self {
        Self {
            label: label.into(),
            confidence: 1.0 / (1.0 + distance),
            distance: Some(distance),
        }
    }

    pub fn uninitialized() -> Self {
        Self::new(UNINITIALIZED_LABEL, 0.0)
    }

    pub fn empty() -> Self {
        Self::new(EMPTY_LABEL, 0.0)
    }

    /// True for the `Uninitialized` and `Empty` results
    pub fn is_sentinel(&self) -> bool {
        self.confidence == 0.0 && (self.label == UNINITIALIZED_LABEL || self.label == EMPTY_LABEL)
    }
}

/// Sort by descending confidence, ties alphabetical
pub(crate) fn rank(mut predictions: Vec<Prediction>) -> Vec<Prediction> {
    predictions.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.label.cmp(&b.label))
    });
    predictions
}

/// Strategy hyperparameters
#[derive(Debug, Clone, Copy)]
pub struct ClassifierSettings {
    pub knn_neighbors: usize,
    pub forest: ForestParams,
    pub dtw_max_candidates: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            knn_neighbors: knn::DEFAULT_NEIGHBORS,
            forest: ForestParams::default(),
            dtw_max_candidates: dtw::DEFAULT_MAX_CANDIDATES,
        }
    }
}

/// The closed set of model states
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model")]
pub(crate) enum Model {
    #[serde(rename = "knn")]
    Knn(KnnModel),
    #[serde(rename = "rf")]
    RandomForest(RandomForest),
    #[serde(rename = "dtw")]
    Dtw(DtwModel),
}

impl Model {
    fn fresh(kind: ModelKind, settings: &ClassifierSettings) -> Self {
        match kind {
            ModelKind::Knn => Self::Knn(KnnModel::new(settings.knn_neighbors)),
            ModelKind::RandomForest => Self::RandomForest(RandomForest::new(settings.forest)),
            ModelKind::Dtw => Self::Dtw(DtwModel::new(settings.dtw_max_candidates)),
        }
    }

    pub(crate) fn kind(&self) -> ModelKind {
        match self {
            Self::Knn(_) => ModelKind::Knn,
            Self::RandomForest(_) => ModelKind::RandomForest,
            Self::Dtw(_) => ModelKind::Dtw,
        }
    }

    fn example_count(&self) -> usize {
        match self {
            Self::Knn(m) => m.len(),
            Self::RandomForest(m) => m.sample_count(),
            Self::Dtw(m) => m.len(),
        }
    }

    fn predict(&self, drawing: &Drawing) -> Vec<Prediction> {
        match self {
            Self::Knn(m) => m.predict(&extract_features(drawing.strokes())),
            Self::RandomForest(m) => m.predict(&extract_features(drawing.strokes())),
            Self::Dtw(m) => m.predict(drawing.strokes()),
        }
    }
}

struct ModelState {
    model: Model,
    trained: bool,
}

/// Symbol classifier facade
pub struct SymbolClassifier {
    kind: ModelKind,
    settings: ClassifierSettings,
    model_path: PathBuf,
    state: RwLock<ModelState>,
}

impl SymbolClassifier {
    /// Untrained classifier persisting to `<base_path>_<kind>.json`
    pub fn new(kind: ModelKind, base_path: impl AsRef<Path>) -> Self {
        Self::with_settings(kind, base_path, ClassifierSettings::default())
    }

    pub fn with_settings(
        kind: ModelKind,
        base_path: impl AsRef<Path>,
        settings: ClassifierSettings,
    ) -> Self {
        let model_path = persist::model_path(base_path.as_ref(), kind);
        debug!(kind = %kind, path = %model_path.display(), "Classifier created");
        Self {
            kind,
            settings,
            model_path,
            state: RwLock::new(ModelState {
                model: Model::fresh(kind, &settings),
                trained: false,
            }),
        }
    }

    /// Construct from a strategy name; unknown names fail immediately
    pub fn from_name(name: &str, base_path: impl AsRef<Path>) -> crate::Result<Self> {
        Ok(Self::new(name.parse()?, base_path))
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn is_trained(&self) -> bool {
        self.state.read().trained
    }

    /// Examples the current model was built from
    pub fn example_count(&self) -> usize {
        self.state.read().model.example_count()
    }

    /// Fit a fresh model on the full example set, replace the current one and save it.
    ///
    /// Returns the number of examples trained on.
    pub fn train(&self, drawings: &[Drawing], labels: &[String]) -> crate::Result<usize> {
        if drawings.len() != labels.len() {
            return Err(crate::Error::Training(format!(
                "{} drawings but {} labels",
                drawings.len(),
                labels.len()
            )));
        }
        if drawings.is_empty() {
            return Err(crate::Error::Training("No data to train".into()));
        }

        let mut model = Model::fresh(self.kind, &self.settings);
        match &mut model {
            Model::Knn(m) => m.fit(
                drawings.iter().map(|d| extract_features(d.strokes())).collect(),
                labels.to_vec(),
            ),
            Model::RandomForest(m) => {
                let features: Vec<Vec<f64>> =
                    drawings.iter().map(|d| extract_features(d.strokes())).collect();
                m.fit(&features, labels);
            }
            Model::Dtw(m) => {
                let templates = drawings
                    .iter()
                    .zip(labels)
                    .map(|(d, label)| Template {
                        label: label.clone(),
                        sequence: m.sequence(d.strokes()),
                    })
                    .collect();
                m.fit(templates);
            }
        }

        let mut state = self.state.write();
        state.model = model;
        state.trained = true;
        info!(kind = %self.kind, examples = drawings.len(), "Model trained");
        persist::save(&self.model_path, &state.model)?;
        Ok(drawings.len())
    }

    /// Ranked candidates for a drawing.
    ///
    /// Never fails: an untrained classifier first tries to load its saved
    /// model and answers `Uninitialized` if that fails too.
    pub fn predict(&self, drawing: &Drawing) -> Vec<Prediction> {
        if !self.ensure_loaded() {
            return vec![Prediction::uninitialized()];
        }

        let state = self.state.read();
        let ranked = state.model.predict(drawing);
        if let Some(top) = ranked.first() {
            debug!(
                label = %top.label,
                confidence = top.confidence,
                candidates = ranked.len(),
                "Prediction"
            );
        }
        ranked
    }

    /// Learn one example without retraining.
    ///
    /// Returns false for strategies that cannot learn incrementally; those
    /// need a full `train`. The updated model is saved; save failures are
    /// logged.
    pub fn add_example(&self, drawing: &Drawing, label: &str) -> bool {
        if !self.kind.supports_incremental() {
            info!(kind = %self.kind, "Incremental learning not supported; retrain instead");
            return false;
        }

        // Geometry runs before the write lock is taken
        let features = match self.kind {
            ModelKind::Knn => extract_features(drawing.strokes()),
            _ => Vec::new(),
        };
        let sequence = match self.kind {
            ModelKind::Dtw => alignment_sequence(drawing.strokes(), POINTS_PER_STROKE),
            _ => Vec::new(),
        };

        // Load, push and save under one write lock
        let mut state = self.state.write();
        if !state.trained {
            self.load_into(&mut state);
        }
        match &mut state.model {
            Model::Knn(m) => m.push(features, label),
            Model::Dtw(m) => m.push(Template {
                label: label.to_string(),
                sequence,
            }),
            Model::RandomForest(_) => return false,
        }
        state.trained = true;

        debug!(label = %label, examples = state.model.example_count(), "Example added");
        if let Err(e) = persist::save(&self.model_path, &state.model) {
            warn!("Failed to save model after adding example: {}", e);
        }
        true
    }

    /// Write the trained model to `model_path`
    pub fn save(&self) -> crate::Result<()> {
        // Exclusive, so file writes never interleave
        let state = self.state.write();
        if !state.trained {
            return Err(crate::Error::Model("Cannot save an untrained model".into()));
        }
        persist::save(&self.model_path, &state.model)
    }

    /// Restore the saved model. Returns false when none is usable.
    pub fn load(&self) -> bool {
        let mut state = self.state.write();
        self.load_into(&mut state)
    }

    /// Load the saved model unless one is already in memory.
    ///
    /// The check and the load happen under the write lock, so a model set by
    /// a concurrent `train` or `add_example` is never overwritten.
    fn ensure_loaded(&self) -> bool {
        if self.state.read().trained {
            return true;
        }
        let mut state = self.state.write();
        state.trained || self.load_into(&mut state)
    }

    fn load_into(&self, state: &mut ModelState) -> bool {
        match persist::load(&self.model_path) {
            Ok(Some(model)) if model.kind() == self.kind => {
                state.model = model;
                state.trained = true;
                info!(kind = %self.kind, examples = state.model.example_count(), "Model loaded");
                true
            }
            Ok(Some(model)) => {
                warn!(
                    expected = %self.kind,
                    found = %model.kind(),
                    "Saved model has the wrong kind, ignoring"
                );
                false
            }
            Ok(None) => {
                debug!(path = %self.model_path.display(), "No saved model");
                false
            }
            Err(e) => {
                warn!("Failed to load model: {}", e);
                false
            }
        }
    }

    /// Forget everything: clear the in-memory model and delete the saved file
    pub fn reset(&self) -> crate::Result<()> {
        let mut state = self.state.write();
        state.model = Model::fresh(self.kind, &self.settings);
        state.trained = false;
        persist::remove(&self.model_path)?;
        info!(kind = %self.kind, "Model reset");
        Ok(())
    }
}
