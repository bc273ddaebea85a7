//! JSON-file key-value store

use super::{KeyValueStore, StoreError, StoredValue};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Store backed by a single JSON document
///
/// The whole map is held in memory and rewritten on every mutation through
/// a temporary file and rename, so a crash leaves either the old or the new
/// document on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl FileStore {
    /// Open `path`, starting empty when the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => HashMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened file store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredValue>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn flush(&self, entries: &HashMap<String, StoredValue>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.lock();
        Ok(entries
            .get(key)
            .filter(|stored| !stored.is_expired_at(Utc::now()))
            .map(|stored| stored.value.clone()))
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        let now = Utc::now();
        let stored = StoredValue::new(value, ttl, now)?;
        let mut entries = self.lock();
        entries.retain(|_, v| !v.is_expired_at(now));
        entries.insert(key.to_string(), stored);
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.lock();
        let existed = entries.remove(key).is_some();
        if existed {
            self.flush(&entries)?;
        }
        Ok(existed)
    }

    fn clear(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            self.flush(&entries)?;
        }
        Ok(removed)
    }
}
