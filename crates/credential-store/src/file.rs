//! JSON-file-backed key-value store.

use crate::{KeyValueStore, StorageError, StorageResult};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key-value store persisted as a single JSON object on disk.
///
/// Every operation is read-modify-write under a process-local lock;
/// last-write-wins. A missing or corrupt file behaves as an empty store
/// rather than an error, so a damaged record can never wedge startup.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Default location under the platform data directory.
    pub fn default_path() -> StorageResult<PathBuf> {
        let base = dirs::data_local_dir()
            .ok_or_else(|| StorageError::Backend("no platform data directory".to_string()))?;
        Ok(base.join("crowdcash").join("session.json"))
    }

    fn read_map(&self) -> HashMap<String, String> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(error) => {
                    tracing::warn!(path = %self.path.display(), %error, "store file corrupt, treating as empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(map).map_err(|e| StorageError::Encoding(e.to_string()))?;
        fs::write(&self.path, raw)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self.lock.lock().unwrap();
        let mut map = self.read_map();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.lock.lock().unwrap();
        Ok(self.read_map().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.lock.lock().unwrap();
        let mut map = self.read_map();
        let existed = map.remove(key).is_some();
        if existed {
            self.write_map(&map)?;
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("session.json"));

        store.set("authToken", "tok-1").unwrap();
        assert_eq!(store.get("authToken").unwrap(), Some("tok-1".to_string()));

        assert!(store.delete("authToken").unwrap());
        assert!(!store.delete("authToken").unwrap());
        assert_eq!(store.get("authToken").unwrap(), None);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        FileStore::new(&path).set("userRole", "investor").unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get("userRole").unwrap(),
            Some("investor".to_string())
        );
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.get("authToken").unwrap(), None);

        // Writing through a corrupt file replaces it.
        store.set("authToken", "tok").unwrap();
        assert_eq!(store.get("authToken").unwrap(), Some("tok".to_string()));
    }

    #[test]
    fn test_missing_parent_dir_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("session.json");

        let store = FileStore::new(&path);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
    }
}
