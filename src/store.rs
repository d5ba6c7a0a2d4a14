//! Durable key-value store for session side effects.
//!
//! The only write the core makes is the one-way `blocked_<accessId>` flag set
//! on termination; login logic elsewhere consults it.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Value written for a blocked candidate.
pub const BLOCKED_VALUE: &str = "true";

/// Store errors.
#[derive(Debug)]
pub enum StoreError {
    IoError(String),
    ParseError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::IoError(e) => write!(f, "IO error: {e}"),
            StoreError::ParseError(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// String key-value storage.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Storage key for a candidate's blocked flag.
pub fn blocked_key(access_id: &str) -> String {
    format!("blocked_{access_id}")
}

/// Mark a candidate as blocked.
pub fn mark_blocked(store: &mut dyn KeyValueStore, access_id: &str) -> Result<(), StoreError> {
    store.set(&blocked_key(access_id), BLOCKED_VALUE)
}

/// Whether a candidate has been blocked.
pub fn is_blocked(store: &dyn KeyValueStore, access_id: &str) -> Result<bool, StoreError> {
    Ok(store.get(&blocked_key(access_id))?.as_deref() == Some(BLOCKED_VALUE))
}

/// In-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store persisted as a single JSON object, rewritten on every write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store, loading existing entries if the file exists.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let entries = if path.exists() {
            let content =
                std::fs::read_to_string(&path).map_err(|e| StoreError::IoError(e.to_string()))?;
            serde_json::from_str(&content).map_err(|e| StoreError::ParseError(e.to_string()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Access IDs currently flagged as blocked.
    pub fn blocked_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, v)| v.as_str() == BLOCKED_VALUE)
            .filter_map(|(k, _)| k.strip_prefix("blocked_").map(str::to_string))
            .collect()
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| StoreError::ParseError(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| StoreError::IoError(e.to_string()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }
}
