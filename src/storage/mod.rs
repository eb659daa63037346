//! Labeled example storage
//!
//! The classifier never reads storage itself. Callers pull examples from a
//! [`DrawingStore`] and hand drawings and labels to `train`.
//!
//! - [`JsonDrawingStore`]: one JSON file per example in a directory
//! - [`MemoryDrawingStore`]: process-local, for tests and throwaway sessions

mod json_store;
mod memory;

pub use json_store::JsonDrawingStore;
pub use memory::MemoryDrawingStore;

use crate::geometry::{Drawing, Point};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A drawing with its label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub id: Uuid,
    pub label: String,
    /// Stored as the flat point list
    #[serde(rename = "points")]
    pub drawing: Drawing,
    pub created_at: DateTime<Utc>,
}

impl LabeledExample {
    pub fn new(label: impl Into<String>, drawing: Drawing) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            drawing,
            created_at: Utc::now(),
        }
    }
}

/// Portable form used by export and import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub points: Vec<Point>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&LabeledExample> for ExportRecord {
    fn from(example: &LabeledExample) -> Self {
        Self {
            label: example.label.clone(),
            points: example.drawing.points(),
            created_at: Some(example.created_at),
        }
    }
}

/// Storage boundary for labeled drawings
pub trait DrawingStore: Send + Sync {
    /// Persist a drawing under `label` and return its id
    fn save(&self, label: &str, drawing: &Drawing) -> crate::Result<Uuid>;

    fn get(&self, id: Uuid) -> crate::Result<Option<LabeledExample>>;

    /// Returns false when no example has this id
    fn delete(&self, id: Uuid) -> crate::Result<bool>;

    /// Examples newest first, optionally filtered by label and truncated
    fn list(&self, label: Option<&str>, limit: Option<usize>) -> crate::Result<Vec<LabeledExample>>;

    /// Delete every example with `label`, returning how many were removed
    fn delete_label(&self, label: &str) -> crate::Result<usize>;

    /// Delete everything, returning how many were removed
    fn clear(&self) -> crate::Result<usize>;

    /// Example count per label
    fn label_counts(&self) -> crate::Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for example in self.list(None, None)? {
            *counts.entry(example.label).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Every example as parallel drawing and label lists, oldest first
    fn training_set(&self) -> crate::Result<(Vec<Drawing>, Vec<String>)> {
        let mut examples = self.list(None, None)?;
        examples.reverse();
        Ok(examples.into_iter().map(|e| (e.drawing, e.label)).unzip())
    }

    fn export(&self) -> crate::Result<Vec<ExportRecord>> {
        Ok(self.list(None, None)?.iter().map(ExportRecord::from).collect())
    }

    /// Store records with a fresh timestamp. Records without a label or
    /// points are skipped. Returns the number stored.
    fn import(&self, records: &[ExportRecord]) -> crate::Result<usize> {
        let mut stored = 0;
        for record in records {
            if record.label.is_empty() || record.points.is_empty() {
                continue;
            }
            self.save(&record.label, &Drawing::from_points(&record.points))?;
            stored += 1;
        }
        Ok(stored)
    }
}

/// Newest first, then filter and truncate
pub(crate) fn select(
    mut examples: Vec<LabeledExample>,
    label: Option<&str>,
    limit: Option<usize>,
) -> Vec<LabeledExample> {
    if let Some(label) = label {
        examples.retain(|e| e.label == label);
    }
    examples.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    if let Some(limit) = limit {
        examples.truncate(limit);
    }
    examples
}
