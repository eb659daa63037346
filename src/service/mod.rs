//! Application context
//!
//! `GlyphService` owns the recorder, classifier and example store and is the
//! only thing front ends (CLI, transports) talk to. Everything is injected at
//! construction, so tests can wire in a manual pointer source, a virtual
//! cursor and an in-memory store.
//!
//! Recognition runs on tokio's blocking pool: DTW against a large template
//! library can take tens of milliseconds and must not stall other requests.

use crate::capture::{AutoModeConfig, Recorder, ScreenPosition};
use crate::classifier::{Prediction, SymbolClassifier};
use crate::geometry::Drawing;
use crate::storage::{DrawingStore, ExportRecord};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default inactivity that ends a symbol in auto mode
pub const DEFAULT_AUTO_TIMEOUT: Duration = Duration::from_millis(1000);

/// Recognition results buffered for a slow listener; further results are dropped
const RESULT_BUFFER: usize = 16;

/// Outcome of recognizing one drawing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recognition {
    /// Best candidate, or a sentinel
    pub top: Prediction,
    /// Remaining candidates with non-zero confidence, best first
    pub candidates: Vec<Prediction>,
    pub drawing: Drawing,
}

impl Recognition {
    pub fn from_ranked(ranked: Vec<Prediction>, drawing: Drawing) -> Self {
        let mut ranked = ranked.into_iter();
        let top = ranked.next().unwrap_or_else(Prediction::uninitialized);
        let candidates = ranked.filter(|p| p.confidence > 0.0).collect();
        Self {
            top,
            candidates,
            drawing,
        }
    }
}

/// Outcome of teaching one labeled drawing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeachOutcome {
    pub id: Uuid,
    /// False when the classifier cannot learn incrementally
    pub model_updated: bool,
}

/// Run blocking work on tokio's blocking pool
async fn blocking<T, F>(what: &'static str, f: F) -> crate::Result<T>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| crate::Error::Task(format!("{} worker join failed: {}", what, e)))?
}

pub struct GlyphService {
    recorder: Arc<Recorder>,
    classifier: Arc<SymbolClassifier>,
    store: Arc<dyn DrawingStore>,
    auto_timeout: Duration,
    result_buffer: usize,
    seed_file: Option<PathBuf>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl GlyphService {
    pub fn new(
        recorder: Arc<Recorder>,
        classifier: Arc<SymbolClassifier>,
        store: Arc<dyn DrawingStore>,
    ) -> Self {
        Self {
            recorder,
            classifier,
            store,
            auto_timeout: DEFAULT_AUTO_TIMEOUT,
            result_buffer: RESULT_BUFFER,
            seed_file: None,
            listener: Mutex::new(None),
        }
    }

    /// Inactivity timeout used by `start_auto`
    pub fn with_auto_timeout(mut self, timeout: Duration) -> Self {
        self.auto_timeout = timeout;
        self
    }

    /// Unread auto-mode results kept before new ones are dropped
    pub fn with_result_buffer(mut self, capacity: usize) -> Self {
        self.result_buffer = capacity.max(1);
        self
    }

    /// Exported examples imported by `warm_start` when the store is empty
    pub fn with_seed_file(mut self, path: Option<PathBuf>) -> Self {
        self.seed_file = path;
        self
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    pub fn classifier(&self) -> &Arc<SymbolClassifier> {
        &self.classifier
    }

    pub fn store(&self) -> &Arc<dyn DrawingStore> {
        &self.store
    }

    /// Load the saved model, or train one from the store when none exists.
    ///
    /// An empty store is seeded from the seed file first, if one is set.
    ///
    /// Returns whether a usable model is in place afterwards.
    pub async fn warm_start(&self) -> crate::Result<bool> {
        self.seed_if_empty().await?;

        let classifier = Arc::clone(&self.classifier);
        if blocking("model load", move || Ok(classifier.load())).await? {
            return Ok(true);
        }

        info!("No saved model; training from stored examples");
        match self.retrain().await {
            Ok(count) => {
                info!(examples = count, "Model trained at start-up");
                Ok(true)
            }
            Err(crate::Error::Training(reason)) => {
                warn!("Could not train at start-up: {}", reason);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Import the seed file into an empty store. Returns the number imported.
    pub async fn seed_if_empty(&self) -> crate::Result<usize> {
        let Some(path) = self.seed_file.clone() else {
            return Ok(0);
        };
        let store = Arc::clone(&self.store);

        blocking("seed", move || {
            if !store.list(None, Some(1))?.is_empty() {
                return Ok(0);
            }
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(path = %path.display(), "Seed file not found");
                    return Ok(0);
                }
                Err(e) => return Err(e.into()),
            };
            let records: Vec<ExportRecord> = serde_json::from_slice(&bytes)?;
            let seeded = store.import(&records)?;
            info!(path = %path.display(), examples = seeded, "Seeded empty store");
            Ok(seeded)
        })
        .await
    }

    /// Begin a manually delimited recording
    pub fn start_recording(&self) -> crate::Result<()> {
        self.recorder.start(None)
    }

    /// End the recording and return its drawing
    pub fn stop_recording(&self) -> Drawing {
        self.recorder.stop()
    }

    /// Move the pointer without recording the jump
    pub fn reset_cursor(&self, target: Option<ScreenPosition>) {
        self.recorder.reset_cursor(target);
    }

    /// Classify a drawing off the async worker threads
    pub async fn recognize(&self, drawing: Drawing) -> crate::Result<Recognition> {
        recognize_with(Arc::clone(&self.classifier), drawing).await
    }

    /// Stop the manual recording and classify what was drawn
    pub async fn stop_and_recognize(&self) -> crate::Result<Recognition> {
        let drawing = self.recorder.stop();
        self.recognize(drawing).await
    }

    /// Store a labeled drawing, then teach it to the classifier
    pub async fn teach(&self, label: &str, drawing: Drawing) -> crate::Result<TeachOutcome> {
        let store = Arc::clone(&self.store);
        let classifier = Arc::clone(&self.classifier);
        let label = label.to_string();

        blocking("teach", move || {
            let id = store.save(&label, &drawing)?;
            let model_updated = classifier.add_example(&drawing, &label);
            info!(id = %id, label = %label, model_updated, "Example taught");
            Ok(TeachOutcome { id, model_updated })
        })
        .await
    }

    /// Train from every stored example. Returns the number trained on.
    pub async fn retrain(&self) -> crate::Result<usize> {
        let store = Arc::clone(&self.store);
        let classifier = Arc::clone(&self.classifier);

        blocking("retrain", move || {
            let (drawings, labels) = store.training_set()?;
            classifier.train(&drawings, &labels)
        })
        .await
    }

    /// Import examples and retrain on the whole store. Returns the number imported.
    ///
    /// A failed retrain is logged; the imported examples stay stored.
    pub async fn import(&self, records: Vec<ExportRecord>) -> crate::Result<usize> {
        let store = Arc::clone(&self.store);
        let imported = blocking("import", move || store.import(&records)).await?;
        info!(imported, "Examples imported");

        if imported > 0 {
            if let Err(e) = self.retrain().await {
                warn!("Could not retrain after import: {}", e);
            }
        }
        Ok(imported)
    }

    /// Delete every stored example and reset the classifier
    pub async fn reset_all(&self) -> crate::Result<usize> {
        let store = Arc::clone(&self.store);
        let classifier = Arc::clone(&self.classifier);

        blocking("reset", move || {
            let removed = store.clear()?;
            classifier.reset()?;
            Ok(removed)
        })
        .await
    }

    /// Start an auto-mode session.
    ///
    /// Every symbol boundary is recognized in the background and its result
    /// sent on the returned channel. The session ends with `stop_auto`.
    /// Must be called from within a tokio runtime.
    pub fn start_auto(&self) -> crate::Result<mpsc::Receiver<Recognition>> {
        let mut listener = self.listener.lock();
        if listener.is_some() {
            return Err(crate::Error::Capture("Auto mode already running".into()));
        }

        let (config, drawings) = AutoModeConfig::channel(self.auto_timeout);
        self.recorder.start(Some(config))?;

        let (results_tx, results_rx) = mpsc::channel(self.result_buffer);
        let classifier = Arc::clone(&self.classifier);
        *listener = Some(tokio::spawn(recognition_loop(classifier, drawings, results_tx)));

        info!(timeout_ms = self.auto_timeout.as_millis() as u64, "Auto mode started");
        Ok(results_rx)
    }

    /// End the auto-mode session and wait for in-flight recognition to finish.
    ///
    /// Anything drawn since the last boundary is discarded.
    pub async fn stop_auto(&self) -> crate::Result<()> {
        self.recorder.stop();
        let handle = self.listener.lock().take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| crate::Error::Task(format!("recognition loop failed to join: {}", e)))?;
        }
        Ok(())
    }

    pub fn is_auto_running(&self) -> bool {
        self.listener.lock().is_some()
    }
}

async fn recognize_with(
    classifier: Arc<SymbolClassifier>,
    drawing: Drawing,
) -> crate::Result<Recognition> {
    blocking("recognition", move || {
        let ranked = classifier.predict(&drawing);
        Ok(Recognition::from_ranked(ranked, drawing))
    })
    .await
}

/// Consume boundary drawings until the recorder drops its sender
async fn recognition_loop(
    classifier: Arc<SymbolClassifier>,
    mut drawings: mpsc::Receiver<Drawing>,
    results: mpsc::Sender<Recognition>,
) {
    debug!("Recognition loop started");
    while let Some(drawing) = drawings.recv().await {
        let recognition = match recognize_with(Arc::clone(&classifier), drawing).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Recognition failed: {}", e);
                continue;
            }
        };
        info!(
            label = %recognition.top.label,
            confidence = recognition.top.confidence,
            "Symbol recognized"
        );
        match results.try_send(recognition) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(label = %dropped.top.label, "Result listener is not keeping up, dropping recognition");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Result listener gone");
                break;
            }
        }
    }
    debug!("Recognition loop stopped");
}
