//! File-backed store: `<dir>/<id>.json` per example

use super::{select, DrawingStore, LabeledExample};
use crate::geometry::Drawing;
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Directory of example files.
///
/// Each file is written to `<id>.json.tmp` and renamed into place. A mutex
/// serializes writers within the process.
pub struct JsonDrawingStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonDrawingStore {
    /// Open (creating if needed) the store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> crate::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Drawing store opened");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn write(&self, example: &LabeledExample) -> crate::Result<()> {
        let path = self.path_for(example.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(example)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read(path: &Path) -> crate::Result<LabeledExample> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Every readable example; unreadable files are skipped with a warning
    fn read_all(&self) -> crate::Result<Vec<LabeledExample>> {
        let mut examples = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            match Self::read(&path) {
                Ok(example) => examples.push(example),
                Err(e) => warn!("Skipping unreadable example {}: {}", path.display(), e),
            }
        }
        Ok(examples)
    }

    fn remove(&self, id: Uuid) -> crate::Result<bool> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl DrawingStore for JsonDrawingStore {
    fn save(&self, label: &str, drawing: &Drawing) -> crate::Result<Uuid> {
        if label.is_empty() {
            return Err(crate::Error::Storage("Label must not be empty".into()));
        }
        if drawing.is_empty() {
            return Err(crate::Error::Storage("Drawing has no points".into()));
        }

        let example = LabeledExample::new(label, drawing.clone());
        let _guard = self.write_lock.lock();
        self.write(&example)?;
        debug!(id = %example.id, label = %label, points = drawing.point_count(), "Example saved");
        Ok(example.id)
    }

    fn get(&self, id: Uuid) -> crate::Result<Option<LabeledExample>> {
        match Self::read(&self.path_for(id)) {
            Ok(example) => Ok(Some(example)),
            Err(crate::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn delete(&self, id: Uuid) -> crate::Result<bool> {
        let _guard = self.write_lock.lock();
        self.remove(id)
    }

    fn list(&self, label: Option<&str>, limit: Option<usize>) -> crate::Result<Vec<LabeledExample>> {
        Ok(select(self.read_all()?, label, limit))
    }

    fn delete_label(&self, label: &str) -> crate::Result<usize> {
        let _guard = self.write_lock.lock();
        let mut removed = 0;
        for example in self.read_all()?.into_iter().filter(|e| e.label == label) {
            if self.remove(example.id)? {
                removed += 1;
            }
        }
        info!(label = %label, removed, "Deleted examples for label");
        Ok(removed)
    }

    fn clear(&self) -> crate::Result<usize> {
        let _guard = self.write_lock.lock();
        let mut removed = 0;
        for example in self.read_all()? {
            if self.remove(example.id)? {
                removed += 1;
            }
        }
        info!(removed, "Drawing store cleared");
        Ok(removed)
    }
}
