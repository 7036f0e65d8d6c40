use std::{collections::HashMap, fs, io, path::PathBuf, sync::RwLock};

// Re-export core storage types so existing code using crate::storage::* still works
pub use pricebook_core::storage::{KeyValueStore, StorageError};

/// Volatile backend; contents vanish with the process.
pub struct InMemoryStorage {
    values: RwLock<HashMap<String, Vec<u8>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }
}

impl KeyValueStore for InMemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.values.read().unwrap().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.values.write().unwrap().insert(key.to_string(), value.to_vec());
        tracing::debug!(key, bytes = value.len(), "Stored value in memory");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.write().unwrap().remove(key);
        tracing::debug!(key, "Removed value from memory");
        Ok(())
    }
}

/// One `<key>.json` file per table inside a data directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(StorageError::Other(format!("invalid storage key: {}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(path = %path.display(), bytes = value.len(), "Wrote table file");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed table file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pricebook_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn memory_put_get_remove() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.get("table1").unwrap(), None);

        storage.put("table1", b"[]").unwrap();
        assert_eq!(storage.get("table1").unwrap(), Some(b"[]".to_vec()));

        storage.remove("table1").unwrap();
        assert_eq!(storage.get("table1").unwrap(), None);
    }

    #[test]
    fn file_storage_round_trips_and_tolerates_missing_keys() {
        let dir = scratch_dir("file_storage");
        let storage = FileStorage::new(&dir).unwrap();

        assert_eq!(storage.get("table1").unwrap(), None);
        storage.remove("table1").unwrap();

        storage.put("table1", br#"[{"product":"Milk"}]"#).unwrap();
        assert!(dir.join("table1.json").exists());
        assert_eq!(storage.get("table1").unwrap(), Some(br#"[{"product":"Milk"}]"#.to_vec()));

        storage.remove("table1").unwrap();
        assert!(!dir.join("table1.json").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn file_storage_rejects_path_like_keys() {
        let dir = scratch_dir("file_keys");
        let storage = FileStorage::new(&dir).unwrap();

        assert!(matches!(storage.put("../escape", b"[]"), Err(StorageError::Other(_))));
        assert!(matches!(storage.get(""), Err(StorageError::Other(_))));

        fs::remove_dir_all(&dir).unwrap();
    }
}
