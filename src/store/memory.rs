//! In-memory key-value store

use super::{KeyValueStore, StoreError, StoredValue};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Process-local store; nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.lock().values().filter(|v| !v.is_expired_at(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredValue>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(stored) if stored.is_expired_at(Utc::now()) => {
                entries.remove(key);
                Ok(None)
            }
            Some(stored) => Ok(Some(stored.value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        let stored = StoredValue::new(value, ttl, Utc::now())?;
        self.lock().insert(key.to_string(), stored);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock().remove(key).is_some())
    }

    fn clear(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set("a", json!({"x": 1}), None).unwrap();

        assert_eq!(store.get("a").unwrap(), Some(json!({"x": 1})));
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_expired_value_is_absent() {
        let store = MemoryStore::new();
        store.set("short", json!(1), Some(Duration::ZERO)).unwrap();
        store.set("long", json!(2), Some(Duration::from_secs(3600))).unwrap();

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.get("short").unwrap(), None);
        assert_eq!(store.get("long").unwrap(), Some(json!(2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear_by_prefix() {
        let store = MemoryStore::new();
        store.set("qs:alerts", json!([]), None).unwrap();
        store.set("qs:symbols", json!([]), None).unwrap();
        store.set("other:key", json!(true), None).unwrap();

        assert_eq!(store.clear("qs:").unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.get("other:key").unwrap().is_some());
    }
}
