/// Opaque key/value persistence for critique results.
///
/// Only two keys are used: the last analyzed URL and the JSON report for it.

use crate::critique::CritiqueReport;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const ANALYZED_URL_KEY: &str = "analyzedUrl";
pub const ANALYSIS_RESULT_KEY: &str = "analysisResult";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Other("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// One file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::StorageError(format!("cannot create {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let allowed = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
        if key.is_empty() || !key.chars().all(allowed) {
            return Err(Error::StorageError(format!("invalid key '{}'", key)));
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::StorageError(format!("read {}: {}", path.display(), e))),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::write(&path, value)
            .map_err(|e| Error::StorageError(format!("write {}: {}", path.display(), e)))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(Error::StorageError(format!("remove {}: {}", path.display(), e)))
            }
            _ => Ok(()),
        }
    }
}

pub fn save_critique(store: &dyn KeyValueStore, url: &str, report: &CritiqueReport) -> Result<()> {
    store.put(ANALYZED_URL_KEY, url)?;
    store.put(ANALYSIS_RESULT_KEY, &serde_json::to_string(report)?)
}

/// The stored `(url, report)` pair, if both keys are present
pub fn load_critique(store: &dyn KeyValueStore) -> Result<Option<(String, CritiqueReport)>> {
    let url = store.get(ANALYZED_URL_KEY)?;
    let json = store.get(ANALYSIS_RESULT_KEY)?;
    let (Some(url), Some(json)) = (url, json) else {
        return Ok(None);
    };
    let report = serde_json::from_str(&json)
        .map_err(|e| Error::StorageError(format!("stored report is corrupt: {}", e)))?;
    Ok(Some((url, report)))
}
