use crate::{
    config::Config,
    report::{HistoryEntry, ResultSet},
};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub const RESULT_SETS_KEY: &str = "analyzedFiles";
pub const HISTORY_KEY: &str = "transactionHistory";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("stored document {key} is unreadable: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Session-scoped string documents addressed by key.
pub trait KeyValueStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// One JSON file per key under the session directory.
pub struct DirStore {
    dir: PathBuf,
    enabled: bool,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            enabled: true,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self {
            dir: cfg.session_dir(),
            enabled: cfg.store.enabled,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.enabled {
            Ok(())
        } else {
            Err(StoreError::Unavailable("storage is disabled".into()))
        }
    }
}

impl KeyValueStore for DirStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        match std::fs::read_to_string(self.path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(&self.path(key), e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        std::fs::create_dir_all(&self.dir).map_err(|e| unavailable(&self.dir, e))?;
        let path = self.path(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, value).map_err(|e| unavailable(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| unavailable(&path, e))?;
        debug!(key, bytes = value.len(), "stored document");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unavailable(&self.path(key), e)),
        }
    }
}

fn unavailable(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {err}", path.display()))
}

/// Process-local backend, used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<String, String>>,
    disabled: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disabled() -> Self {
        Self {
            docs: Mutex::default(),
            disabled: true,
        }
    }

    fn docs(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, StoreError> {
        if self.disabled {
            return Err(StoreError::Unavailable("storage is disabled".into()));
        }
        self.docs
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.docs()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.docs()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.docs()?.remove(key);
        Ok(())
    }
}

/// Typed view over a key-value backend: the result-set list and the prediction history.
pub struct ResultStore<K: KeyValueStore> {
    kv: K,
}

impl<K: KeyValueStore> ResultStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub fn backend(&self) -> &K {
        &self.kv
    }

    fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, StoreError> {
        match self.kv.read(key)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            }),
            None => Ok(T::default()),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| StoreError::Unavailable(format!("serializing {key}: {e}")))?;
        self.kv.write(key, &raw)
    }

    /// Appends a result set; earlier sets are left untouched.
    pub fn put(&self, set: &ResultSet) -> Result<(), StoreError> {
        let mut sets: Vec<ResultSet> = self.load(RESULT_SETS_KEY)?;
        sets.push(set.clone());
        self.save(RESULT_SETS_KEY, &sets)
    }

    /// Insertion order.
    pub fn list(&self) -> Result<Vec<ResultSet>, StoreError> {
        self.load(RESULT_SETS_KEY)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<ResultSet>, StoreError> {
        Ok(self.list()?.into_iter().find(|s| s.id == id))
    }

    /// Returns whether a set with that id existed.
    pub fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut sets = self.list()?;
        let before = sets.len();
        sets.retain(|s| s.id != id);
        if sets.len() == before {
            return Ok(false);
        }
        self.save(RESULT_SETS_KEY, &sets)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.kv.remove(RESULT_SETS_KEY)
    }

    /// Newest entry goes first.
    pub fn append_history(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        let mut history: Vec<HistoryEntry> = self.load(HISTORY_KEY)?;
        history.insert(0, entry.clone());
        self.save(HISTORY_KEY, &history)
    }

    /// Most recent first.
    pub fn history(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        self.load(HISTORY_KEY)
    }

    /// Drops every entry with the given timestamp and returns how many went.
    pub fn remove_history(&self, timestamp: i64) -> Result<usize, StoreError> {
        let mut history = self.history()?;
        let before = history.len();
        history.retain(|h| h.timestamp != timestamp);
        let removed = before - history.len();
        if removed > 0 {
            self.save(HISTORY_KEY, &history)?;
        }
        Ok(removed)
    }

    pub fn clear_history(&self) -> Result<(), StoreError> {
        self.kv.remove(HISTORY_KEY)
    }
}
