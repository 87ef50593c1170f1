//! Host key/value stores used for the auth token.
//!
//! Two stores are involved: an expiring key/value cache, and a raw "local storage" of
//! string items (where the site's web login leaves its `auth` blob). Both are traits so a
//! host can plug its own; [MemoryStore] and [FileStore] implement both.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Cannot read store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid store file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Expiring key/value cache.
pub trait KeyValueStore {
    /// Value for `key`, or None when missing or expired at `now_ms` (epoch milliseconds).
    fn get(&self, key: &str, now_ms: i64) -> Option<Value>;

    /// Store `value`; `expires_at_ms` of None means no expiry.
    fn set(&mut self, key: &str, value: Value, expires_at_ms: Option<i64>)
        -> Result<(), StorageError>;
}

/// Read-only string items, like a browser's localStorage.
pub trait LocalStorage {
    fn item(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

impl Entry {
    fn live_value(&self, now_ms: i64) -> Option<Value> {
        match self.expires_at {
            Some(at) if at <= now_ms => None,
            _ => Some(self.value.clone()),
        }
    }
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Entry>,
    local: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_item(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.local.insert(key.into(), value.into());
        self
    }

    /// Raw expiry recorded for `key`, if any.
    pub fn expiry_of(&self, key: &str) -> Option<i64> {
        self.entries.get(key).and_then(|e| e.expires_at)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str, now_ms: i64) -> Option<Value> {
        self.entries.get(key).and_then(|e| e.live_value(now_ms))
    }

    fn set(
        &mut self,
        key: &str,
        value: Value,
        expires_at_ms: Option<i64>,
    ) -> Result<(), StorageError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: expires_at_ms,
            },
        );
        Ok(())
    }
}

impl LocalStorage for MemoryStore {
    fn item(&self, key: &str) -> Option<String> {
        self.local.get(key).cloned()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    entries: HashMap<String, Entry>,
    #[serde(default)]
    local: HashMap<String, String>,
}

/// JSON-file store. Every `set` rewrites the whole file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    data: StoreFile,
}

impl FileStore {
    /// `{data_dir}/ranobelib/storage.json`, when a data directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("ranobelib").join("storage.json"))
    }

    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s).map_err(|e| StorageError::Format {
                path: path.clone(),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(e) => {
                return Err(StorageError::Read {
                    path: path.clone(),
                    source: e,
                })
            }
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Put a raw local item (e.g. an `auth` blob copied from the browser) and save.
    pub fn set_local_item(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), StorageError> {
        self.data.local.insert(key.into(), value.into());
        self.save()
    }

    fn save(&self) -> Result<(), StorageError> {
        let write_err = |e| StorageError::Write {
            path: self.path.clone(),
            source: e,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.data).map_err(|e| StorageError::Format {
            path: self.path.clone(),
            source: e,
        })?;
        std::fs::write(&self.path, json).map_err(write_err)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str, now_ms: i64) -> Option<Value> {
        self.data.entries.get(key).and_then(|e| e.live_value(now_ms))
    }

    fn set(
        &mut self,
        key: &str,
        value: Value,
        expires_at_ms: Option<i64>,
    ) -> Result<(), StorageError> {
        self.data.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: expires_at_ms,
            },
        );
        self.save()
    }
}

impl LocalStorage for FileStore {
    fn item(&self, key: &str) -> Option<String> {
        self.data.local.get(key).cloned()
    }
}
