//! # Trackpad Glyphs
//!
//! Gesture capture and symbol recognition for trackpad handwriting.
//!
//! ## Overview
//!
//! A continuous stream of pointer positions is captured from the OS, split
//! into strokes, normalized into a comparable geometric form and classified
//! against a small vocabulary of learned symbols (digits, letters,
//! mathematical glyphs). Classifiers learn from a handful of examples and
//! can be taught new ones while running.
//!
//! ## Quick Start
//!
//! ```no_run
//! use trackpad_glyphs::classifier::{ModelKind, SymbolClassifier};
//! use trackpad_glyphs::geometry::{Drawing, Point};
//!
//! let classifier = SymbolClassifier::new(ModelKind::Dtw, "models/glyphs");
//!
//! let stroke = vec![Point::new(0.0, 0.0, 0.0), Point::new(10.0, 10.0, 16.0)];
//! let drawing = Drawing::new(vec![stroke]);
//! classifier.add_example(&drawing, "\\");
//!
//! let ranked = classifier.predict(&drawing);
//! println!("{} ({:.2})", ranked[0].label, ranked[0].confidence);
//! ```
//!
//! ## Architecture
//!
//! - [`time`]: Session-relative monotonic timestamps
//! - [`geometry`]: Segmentation, normalization, resampling, features
//! - [`capture`]: Recorder state machine, pointer sources, cursor control
//! - [`classifier`]: Nearest-neighbor, random forest and DTW strategies
//! - [`storage`]: Labeled example store boundary
//! - [`service`]: Application context bridging capture and recognition
//! - [`app`]: CLI and configuration management
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │ Pointer tap │───▶│  Recorder   │───▶│  Geometry   │───▶│ Classifier  │
//! │ (OS thread) │    │ (segmented) │    │ (features)  │    │  (ranked)   │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!                          │ auto-mode boundary                   │
//!                          ▼                                      ▼
//!                    mpsc hand-off ─────────▶ async consumer ─▶ results
//! ```

pub mod time;
pub mod geometry;
pub mod capture;
pub mod classifier;
pub mod storage;
pub mod service;
pub mod app;

// Re-export commonly used types
pub use capture::{AutoModeConfig, Recorder, RecorderState};
pub use classifier::{ModelKind, Prediction, SymbolClassifier};
pub use geometry::{Drawing, Point, Stroke};
pub use service::GlyphService;
pub use storage::{DrawingStore, JsonDrawingStore, LabeledExample, MemoryDrawingStore};

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for capture and recognition
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Cursor control error: {0}")]
    Cursor(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Unknown model type: {0}")]
    UnknownModel(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task error: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
