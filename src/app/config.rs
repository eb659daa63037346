//! Configuration Management

use crate::capture::{RecorderConfig, ScreenPosition};
use crate::classifier::forest::ForestParams;
use crate::classifier::{ClassifierSettings, ModelKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Capture settings
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Automatic symbol boundaries
    #[serde(default)]
    pub auto_mode: AutoModeSettings,
    /// Recognition model
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Example storage
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Pause that closes the live stroke (ms)
    pub stroke_gap_ms: u64,
    /// Capture suppression after a cursor warp (ms)
    pub cursor_settle_ms: u64,
    /// Cursor reset target; screen center near the top when unset
    pub cursor_target_x: Option<f64>,
    pub cursor_target_y: Option<f64>,
}

/// Auto-mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoModeSettings {
    /// Listen in auto mode by default
    pub enabled: bool,
    /// Inactivity that ends a symbol (ms)
    pub pause_threshold_ms: u64,
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Strategy: knn, rf or dtw
    pub model: String,
    /// Where model files live; `~/.trackpad_glyphs/models` when unset
    pub model_dir: Option<PathBuf>,
    pub knn_neighbors: usize,
    pub forest_trees: usize,
    pub forest_max_depth: usize,
    pub forest_seed: u64,
    /// Labels reported per DTW query
    pub dtw_max_candidates: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Example directory; `~/.trackpad_glyphs/drawings` when unset
    pub data_dir: Option<PathBuf>,
    /// Exported examples imported at start-up when the store is empty
    pub seed_file: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            stroke_gap_ms: crate::capture::recorder::DEFAULT_STROKE_GAP_MS,
            cursor_settle_ms: crate::capture::recorder::DEFAULT_CURSOR_SETTLE_MS,
            cursor_target_x: None,
            cursor_target_y: None,
        }
    }
}

impl Default for AutoModeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            pause_threshold_ms: 1000,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let defaults = ClassifierSettings::default();
        Self {
            model: ModelKind::Knn.name().to_string(),
            model_dir: None,
            knn_neighbors: defaults.knn_neighbors,
            forest_trees: defaults.forest.trees,
            forest_max_depth: defaults.forest.max_depth,
            forest_seed: defaults.forest.seed,
            dtw_max_candidates: defaults.dtw_max_candidates,
        }
    }
}

impl CaptureConfig {
    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            stroke_gap: Duration::from_millis(self.stroke_gap_ms),
            cursor_settle: Duration::from_millis(self.cursor_settle_ms),
        }
    }

    /// Explicit reset target, when both coordinates are set
    pub fn cursor_target(&self) -> Option<ScreenPosition> {
        match (self.cursor_target_x, self.cursor_target_y) {
            (Some(x), Some(y)) => Some(ScreenPosition::new(x, y)),
            _ => None,
        }
    }
}

impl AutoModeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.pause_threshold_ms)
    }
}

impl ClassifierConfig {
    pub fn kind(&self) -> Result<ModelKind, crate::Error> {
        self.model.parse()
    }

    pub fn settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            knn_neighbors: self.knn_neighbors,
            forest: ForestParams {
                trees: self.forest_trees,
                max_depth: self.forest_max_depth,
                seed: self.forest_seed,
            },
            dtw_max_candidates: self.dtw_max_candidates,
        }
    }

    /// Base path handed to the classifier; the strategy suffix is appended there
    pub fn model_base(&self) -> PathBuf {
        self.model_dir
            .clone()
            .unwrap_or_else(|| Config::home_dir().join("models"))
            .join("model")
    }
}

impl StorageConfig {
    pub fn drawings_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| Config::home_dir().join("drawings"))
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.capture.stroke_gap_ms == 0 {
            return Err(crate::Error::Config("stroke_gap_ms must be > 0".to_string()));
        }
        if self.capture.cursor_settle_ms > 1000 {
            return Err(crate::Error::Config(format!(
                "cursor_settle_ms must be at most 1000, got {}", self.capture.cursor_settle_ms
            )));
        }
        match (self.capture.cursor_target_x, self.capture.cursor_target_y) {
            (Some(x), Some(y)) if x < 0.0 || y < 0.0 => {
                return Err(crate::Error::Config(format!(
                    "cursor target must be non-negative, got ({}, {})", x, y
                )));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(crate::Error::Config(
                    "cursor_target_x and cursor_target_y must be set together".to_string(),
                ));
            }
            _ => {}
        }
        if !(50..=60_000).contains(&self.auto_mode.pause_threshold_ms) {
            return Err(crate::Error::Config(format!(
                "pause_threshold_ms must be in [50, 60000], got {}", self.auto_mode.pause_threshold_ms
            )));
        }
        self.classifier
            .kind()
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        if self.classifier.knn_neighbors == 0 {
            return Err(crate::Error::Config("knn_neighbors must be > 0".to_string()));
        }
        if !(1..=1000).contains(&self.classifier.forest_trees) {
            return Err(crate::Error::Config(format!(
                "forest_trees must be in [1, 1000], got {}", self.classifier.forest_trees
            )));
        }
        if !(1..=64).contains(&self.classifier.forest_max_depth) {
            return Err(crate::Error::Config(format!(
                "forest_max_depth must be in [1, 64], got {}", self.classifier.forest_max_depth
            )));
        }
        if self.classifier.dtw_max_candidates == 0 {
            return Err(crate::Error::Config("dtw_max_candidates must be > 0".to_string()));
        }
        Ok(())
    }

    /// Load config from file
    pub fn load(path: &Path) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<(), crate::Error> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Application data root
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".trackpad_glyphs"))
            .unwrap_or_else(|| PathBuf::from(".trackpad_glyphs"))
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }
}
