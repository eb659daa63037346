//! In-process store

use super::{select, DrawingStore, LabeledExample};
use crate::geometry::Drawing;
use parking_lot::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryDrawingStore {
    examples: RwLock<Vec<LabeledExample>>,
}

impl MemoryDrawingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.examples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.read().is_empty()
    }
}

impl DrawingStore for MemoryDrawingStore {
    fn save(&self, label: &str, drawing: &Drawing) -> crate::Result<Uuid> {
        if label.is_empty() {
            return Err(crate::Error::Storage("Label must not be empty".into()));
        }
        if drawing.is_empty() {
            return Err(crate::Error::Storage("Drawing has no points".into()));
        }
        let example = LabeledExample::new(label, drawing.clone());
        let id = example.id;
        self.examples.write().push(example);
        Ok(id)
    }

    fn get(&self, id: Uuid) -> crate::Result<Option<LabeledExample>> {
        Ok(self.examples.read().iter().find(|e| e.id == id).cloned())
    }

    fn delete(&self, id: Uuid) -> crate::Result<bool> {
        let mut examples = self.examples.write();
        let before = examples.len();
        examples.retain(|e| e.id != id);
        Ok(examples.len() != before)
    }

    fn list(&self, label: Option<&str>, limit: Option<usize>) -> crate::Result<Vec<LabeledExample>> {
        Ok(select(self.examples.read().clone(), label, limit))
    }

    fn delete_label(&self, label: &str) -> crate::Result<usize> {
        let mut examples = self.examples.write();
        let before = examples.len();
        examples.retain(|e| e.label != label);
        Ok(before - examples.len())
    }

    fn clear(&self) -> crate::Result<usize> {
        let mut examples = self.examples.write();
        let removed = examples.len();
        examples.clear();
        Ok(removed)
    }
}
