//! Persistent key-value storage for JSON values
//!
//! The ledger, theme and diagnostic log all persist through a
//! [`KeyValueStore`]. Two adapters ship here: an in-memory store for tests
//! and a single JSON file written atomically.

use crate::error::QuotaError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, QuotaError>;
    fn set(&self, key: &str, value: Value) -> Result<(), QuotaError>;
    fn remove(&self, key: &str) -> Result<(), QuotaError>;
}

/// Read and deserialize a value; `None` if the key is absent
pub fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, QuotaError> {
    match store.get(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub fn write_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), QuotaError> {
    store.set(key, serde_json::to_value(value)?)
}

fn lock<'a>(
    entries: &'a Mutex<BTreeMap<String, Value>>,
) -> Result<MutexGuard<'a, BTreeMap<String, Value>>, QuotaError> {
    entries
        .lock()
        .map_err(|_| QuotaError::StorageUnavailable("store lock poisoned".into()))
}

/// Volatile store
///
/// Can be switched into an unavailable state where every call fails, to
/// exercise storage-failure paths.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), QuotaError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(QuotaError::StorageUnavailable("memory store offline".into()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, QuotaError> {
        self.check_available()?;
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), QuotaError> {
        self.check_available()?;
        lock(&self.entries)?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), QuotaError> {
        self.check_available()?;
        lock(&self.entries)?.remove(key);
        Ok(())
    }
}

/// All keys in one JSON object on disk
///
/// Every write replaces the file through a temp file and a rename, so a
/// crash leaves either the old or the new contents. The in-memory copy only
/// changes after the file was written.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    /// Open (or start) the store at `path`
    ///
    /// A missing file is an empty store. A corrupt file is logged and
    /// treated as empty; it is overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, QuotaError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    QuotaError::StorageUnavailable(format!(
                        "Cannot create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, Value>>(&text) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "store file is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(QuotaError::StorageUnavailable(format!(
                    "Cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        debug!(path = %path.display(), keys = entries.len(), "opened store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, Value>) -> Result<(), QuotaError> {
        let text = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        let unavailable = |e: std::io::Error| {
            QuotaError::StorageUnavailable(format!("Cannot write {}: {}", self.path.display(), e))
        };

        fs::write(&tmp, text).map_err(unavailable)?;
        fs::rename(&tmp, &self.path).map_err(unavailable)
    }

    fn update(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, Value>),
    ) -> Result<(), QuotaError> {
        let mut entries = lock(&self.entries)?;
        let mut next = entries.clone();
        change(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, QuotaError> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), QuotaError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), QuotaError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}
