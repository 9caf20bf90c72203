//! Persisted version record storage

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::Mutex,
};
use tracing::debug;

use crate::error::UpdateError;
use crate::state::VersionRecord;

/// Key the version string is persisted under
pub const VERSION_KEY: &str = "app_version";
/// Key the build number is persisted under, as a decimal string
pub const BUILD_KEY: &str = "app_build";

/// Origin-scoped key/value persistence capability.
///
/// Injected so the engine can be tested without a real browser store. All
/// values are strings; failures surface as
/// [`UpdateError::StorageUnavailable`].
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, UpdateError>;
    fn set(&self, key: &str, value: &str) -> Result<(), UpdateError>;
}

/// Typed access to the persisted `(version, build)` pair
#[derive(Debug)]
pub struct VersionStore<S: KeyValueStore> {
    backend: S,
}

impl<S: KeyValueStore> VersionStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    /// Load the last-seen version record.
    ///
    /// A missing version key means no record exists (first run or legacy
    /// session). A missing or unparsable build falls back to 0, which routes
    /// the check to the force-update path.
    pub fn load(&self) -> Result<Option<VersionRecord>, UpdateError> {
        let Some(version) = self.backend.get(VERSION_KEY)? else {
            return Ok(None);
        };
        let build = self
            .backend
            .get(BUILD_KEY)?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0);
        Ok(Some(VersionRecord { version, build }))
    }

    /// Overwrite the persisted record
    pub fn save(&self, record: &VersionRecord) -> Result<(), UpdateError> {
        self.backend.set(VERSION_KEY, &record.version)?;
        self.backend.set(BUILD_KEY, &record.build.to_string())?;
        debug!("Persisted version record {} (build {})", record.version, record.build);
        Ok(())
    }
}

/// In-memory key/value store for tests and short-lived sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, UpdateError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| UpdateError::StorageUnavailable(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), UpdateError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| UpdateError::StorageUnavailable(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed key/value store: a single JSON object on disk, durable for
/// the lifetime of the origin's storage
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_entries(&self) -> Result<HashMap<String, String>, UpdateError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| UpdateError::StorageUnavailable(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| UpdateError::StorageUnavailable(e.to_string()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, UpdateError> {
        Ok(self.read_entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), UpdateError> {
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value.to_string());
        let raw = serde_json::to_string_pretty(&entries)
            .map_err(|e| UpdateError::StorageUnavailable(e.to_string()))?;
        fs::write(&self.path, raw).map_err(|e| UpdateError::StorageUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_record_loads_as_none() {
        let store = VersionStore::new(MemoryStore::new());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let store = VersionStore::new(MemoryStore::new());
        let record = VersionRecord::new("2.0.0", 200);
        store.save(&record).unwrap();
        assert_eq!(store.load().unwrap(), Some(record));
    }

    #[test]
    fn test_unparsable_build_falls_back_to_zero() {
        let backend = MemoryStore::new();
        backend.set(VERSION_KEY, "2.0.0").unwrap();
        backend.set(BUILD_KEY, "not-a-number").unwrap();
        let store = VersionStore::new(backend);
        assert_eq!(store.load().unwrap(), Some(VersionRecord::new("2.0.0", 0)));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = VersionStore::new(FileStore::new(&path));
        store.save(&VersionRecord::new("2.1.0", 210)).unwrap();
        drop(store);

        let reopened = VersionStore::new(FileStore::new(&path));
        assert_eq!(
            reopened.load().unwrap(),
            Some(VersionRecord::new("2.1.0", 210))
        );
    }
}
