//! Cache types

use crate::quote::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

/// Key namespace; each category carries its own TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheCategory {
    /// Latest quote per symbol
    Quote,
    /// Historical series
    Historical,
    /// Instrument metadata
    Meta,
}

impl CacheCategory {
    pub fn prefix(&self) -> &'static str {
        match self {
            CacheCategory::Quote => "quote:",
            CacheCategory::Historical => "historical:",
            CacheCategory::Meta => "meta:",
        }
    }
}

/// Namespaced cache key, rendered as `quote:AAPL`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub category: CacheCategory,
    pub id: String,
}

impl CacheKey {
    pub fn new(category: CacheCategory, id: impl Into<String>) -> Self {
        Self {
            category,
            id: id.into(),
        }
    }

    pub fn quote(symbol: impl Into<String>) -> Self {
        Self::new(CacheCategory::Quote, symbol)
    }

    pub fn historical(symbol: impl Into<String>) -> Self {
        Self::new(CacheCategory::Historical, symbol)
    }

    pub fn meta(symbol: impl Into<String>) -> Self {
        Self::new(CacheCategory::Meta, symbol)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.category.prefix(), self.id)
    }
}

/// Values the cache can hold
pub trait CacheValue {
    /// Source timestamp used for stale-write rejection; `None` disables the check
    fn as_of(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Approximate footprint counted against the size budget
    fn size_bytes(&self) -> usize;
}

impl CacheValue for Snapshot {
    fn as_of(&self) -> Option<DateTime<Utc>> {
        Some(self.as_of)
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Snapshot>() + self.symbol.len() + self.name.len()
    }
}

impl CacheValue for serde_json::Value {
    fn size_bytes(&self) -> usize {
        self.to_string().len()
    }
}

/// A stored value with its lifetime
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: CacheKey,
    pub value: V,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub size_bytes: usize,
    /// Insertion sequence, breaks `created_at` ties
    pub(crate) seq: u64,
}

impl<V> CacheEntry<V> {
    /// Servable up to and including `expires_at`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Cache write errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Incoming value is older than the stored one
    #[error("Stale write for {key}: stored as of {stored}, incoming as of {incoming}")]
    StaleWrite {
        key: String,
        stored: DateTime<Utc>,
        incoming: DateTime<Utc>,
    },
    /// A single value exceeds the whole size budget
    #[error("Entry {key} is {size} bytes, cache limit is {max}")]
    TooLarge { key: String, size: usize, max: usize },
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub size_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub stale_rejections: u64,
}
