use crate::error::{Result, TenantryError};
use crate::traits::storage::KeyValueStore;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Key-value store persisted as a JSON object in a single file.
///
/// The whole map is loaded on open and rewritten (temp file + rename) on
/// every change. A missing file starts empty; an unreadable one is logged
/// and treated as empty.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileKeyValueStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = load(&path);
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &HashMap<String, String>) -> Result<()> {
        let data = serde_json::to_vec_pretty(values)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_error(&self.path, e))?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, e))?;
        Ok(())
    }
}

fn load(path: &Path) -> HashMap<String, String> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            tracing::warn!(
                target: "storage.file.read_failed",
                path = %path.display(),
                error = %e,
                "Could not read key-value file, starting empty"
            );
            return HashMap::new();
        }
    };

    serde_json::from_slice(&raw).unwrap_or_else(|e| {
        tracing::warn!(
            target: "storage.file.corrupt",
            path = %path.display(),
            error = %e,
            "Key-value file is not a JSON object of strings, starting empty"
        );
        HashMap::new()
    })
}

fn io_error(path: &Path, err: std::io::Error) -> TenantryError {
    TenantryError::internal(format!("Storage I/O error at {}: {}", path.display(), err))
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = values.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *values = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        next.remove(key);
        self.persist(&next)?;
        *values = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");

        let store = FileKeyValueStore::open(&path);
        store.set("currentStartupId", "s2").unwrap();
        drop(store);

        let reopened = FileKeyValueStore::open(&path);
        assert_eq!(reopened.get("currentStartupId"), Some("s2".to_string()));

        reopened.remove("currentStartupId").unwrap();
        let reopened = FileKeyValueStore::open(&path);
        assert_eq!(reopened.get("currentStartupId"), None);
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path().join("nested").join("client.json"));
        assert_eq!(store.get("anything"), None);

        // Parent directories are created on first write
        store.set("k", "v").unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(&path, b"{not json").unwrap();

        let store = FileKeyValueStore::open(&path);
        assert_eq!(store.get("k"), None);

        store.set("k", "v").unwrap();
        assert_eq!(FileKeyValueStore::open(&path).get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_failed_write_leaves_values_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        let store = FileKeyValueStore::open(&path);
        store.set("k", "v1").unwrap();

        // A directory where the temp file should go makes every write fail
        fs::create_dir(path.with_extension("tmp")).unwrap();

        assert!(store.set("k", "v2").is_err());
        assert!(store.remove("k").is_err());
        assert_eq!(store.get("k"), Some("v1".to_string()));
        assert_eq!(FileKeyValueStore::open(&path).get("k"), Some("v1".to_string()));
    }
}
