//! Key-value persistence module
//!
//! A small synchronous key-value contract with an in-memory and a JSON-file
//! implementation, plus a typed layer for the collections the engine
//! persists (alerts, tracked symbols, holdings, display preferences).

mod file;
mod memory;
mod persistence;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use persistence::{DisplayPreferences, Persistence};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Persistent key-value storage
///
/// Implementations treat expired keys as absent.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Store `value` under `key`, expiring after `ttl` when given
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Remove `key`, returning whether it existed
    fn remove(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove every key starting with `prefix`, returning the count removed
    fn clear(&self, prefix: &str) -> Result<usize, StoreError>;
}

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TTL out of range: {0:?}")]
    InvalidTtl(Duration),
}

/// A stored value with its optional expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredValue {
    value: Value,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn new(value: Value, ttl: Option<Duration>, now: DateTime<Utc>) -> Result<Self, StoreError> {
        let expires_at = match ttl {
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl).map_err(|_| StoreError::InvalidTtl(ttl))?;
                Some(now + ttl)
            }
            None => None,
        };
        Ok(Self { value, expires_at })
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}
