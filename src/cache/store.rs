//! Sidecar store for cached results.
//!
//! One JSON document mapping test file path to `{ "success": bool, "hash": hex }`.
//! Read once when a run starts and written once when it ends. Concurrent
//! runs against the same file can lose each other's updates.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{ManitestError, Result};

/// Default sidecar file name, relative to the working directory.
pub const DEFAULT_CACHE_FILE: &str = ".manitest-cache.json";

/// Last recorded outcome of a test file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub success: bool,
    pub hash: String,
}

/// All cache entries, keyed by test file path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStore {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
}

impl CacheStore {
    /// An empty store that will be saved to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Reads the store at `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bytes = fs::read(&path).map_err(|e| ManitestError::CacheStore {
            path: path.clone(),
            reason: format!("failed to open cache results: {e}"),
        })?;
        let entries = serde_json::from_slice::<Option<BTreeMap<String, CacheEntry>>>(&bytes)
            .map_err(|e| ManitestError::CacheStore {
                path: path.clone(),
                reason: format!("failed to load cache results: {e}"),
            })?
            .unwrap_or_default();
        debug!(path = %path.display(), entries = entries.len(), "loaded cache store");
        Ok(Self { path, entries })
    }

    /// Reads the store at `path`, starting empty if it is missing or corrupt.
    pub fn load_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(store) => store,
            Err(e) => {
                warn!("{e}; continuing with an empty cache");
                Self::new(path)
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let bytes = serde_json::to_vec(&self.entries).map_err(|e| ManitestError::CacheStore {
            path: self.path.clone(),
            reason: format!("unable to serialize cache: {e}"),
        })?;
        fs::write(&self.path, bytes).map_err(|e| ManitestError::io(&self.path, e))?;
        debug!(path = %self.path.display(), entries = self.entries.len(), "saved cache store");
        Ok(())
    }

    pub fn get(&self, file: &Path) -> Option<&CacheEntry> {
        self.entries.get(&Self::key(file))
    }

    /// Stores `entry`, overwriting any prior entry for `file`.
    pub fn insert(&mut self, file: &Path, entry: CacheEntry) {
        self.entries.insert(Self::key(file), entry);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(file: &Path) -> String {
        file.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load_preserves_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut store = CacheStore::new(&path);
        store.insert(
            Path::new("tests/a.manitest.yaml"),
            CacheEntry {
                success: true,
                hash: "ab12".to_string(),
            },
        );
        store.save().unwrap();

        let loaded = CacheStore::load(&path).unwrap();
        assert_eq!(loaded, store);

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({"tests/a.manitest.yaml": {"success": true, "hash": "ab12"}})
        );
    }

    #[test]
    fn missing_or_corrupt_store_is_soft() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(CacheStore::load(&missing).is_err());
        assert!(CacheStore::load_or_default(&missing).is_empty());

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").unwrap();
        let store = CacheStore::load_or_default(&corrupt);
        assert!(store.is_empty());
        assert_eq!(store.path(), corrupt.as_path());
    }

    #[test]
    fn null_document_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("null.json");
        fs::write(&path, "null").unwrap();
        assert!(CacheStore::load(&path).unwrap().is_empty());
    }
}
