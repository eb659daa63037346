//! Model files
//!
//! One JSON file per strategy. Writes go to a sibling `.tmp` file first and
//! are renamed into place, so a crash never leaves a half-written model.

use super::{Model, ModelKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ModelFile {
    version: u32,
    saved_at: DateTime<Utc>,
    model: Model,
}

/// `<base>_<kind>.json`
pub(crate) fn model_path(base: &Path, kind: ModelKind) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(format!("_{}.json", kind.name()));
    PathBuf::from(name)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

pub(crate) fn save(path: &Path, model: &Model) -> crate::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = ModelFile {
        version: FORMAT_VERSION,
        saved_at: Utc::now(),
        model: model.clone(),
    };
    let json = serde_json::to_vec(&file)?;

    let tmp = temp_path(path);
    fs::write(&tmp, &json)?;
    fs::rename(&tmp, path)?;

    debug!(path = %path.display(), bytes = json.len(), "Model saved");
    Ok(())
}

/// `Ok(None)` when no model has been saved
pub(crate) fn load(path: &Path) -> crate::Result<Option<Model>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let file: ModelFile = serde_json::from_slice(&bytes)?;
    if file.version != FORMAT_VERSION {
        return Err(crate::Error::Model(format!(
            "Unsupported model file version {} (expected {})",
            file.version, FORMAT_VERSION
        )));
    }
    debug!(path = %path.display(), saved_at = %file.saved_at, "Model file read");
    Ok(Some(file.model))
}

/// Delete the model file; a missing file is not an error
pub(crate) fn remove(path: &Path) -> crate::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::knn::KnnModel;
    use tempfile::TempDir;

    #[test]
    fn test_model_path() {
        assert_eq!(
            model_path(Path::new("data/model"), ModelKind::RandomForest),
            PathBuf::from("data/model_rf.json")
        );
    }

    #[test]
    fn test_save_load_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("model_knn.json");

        let mut knn = KnnModel::new(3);
        knn.push(vec![1.0, 2.0], "a");
        save(&path, &Model::Knn(knn)).unwrap();

        assert!(path.exists());
        assert!(!temp_path(&path).exists());
        match load(&path).unwrap() {
            Some(Model::Knn(m)) => assert_eq!(m.len(), 1),
            other => panic!("unexpected model: {:?}", other.map(|m| m.kind())),
        }
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load(&dir.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn test_remove_missing_ok() {
        let dir = TempDir::new().unwrap();
        assert!(remove(&dir.path().join("absent.json")).is_ok());
    }
}
