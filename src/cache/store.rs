//! TTL cache with capacity eviction

use super::types::{CacheCategory, CacheEntry, CacheError, CacheKey, CacheStats, CacheValue};
use crate::config::CacheConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Expiring key-value cache
///
/// Invariants: `get` never serves an entry past its `expires_at`; the number
/// of entries and their summed size stay within the configured bounds, with
/// the oldest entries (by `created_at`) evicted first; a value with an
/// earlier `as_of` never replaces a newer one under the same key.
pub struct Cache<V> {
    config: CacheConfig,
    entries: HashMap<CacheKey, CacheEntry<V>>,
    total_size: usize,
    next_seq: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: u64,
    expirations: u64,
    stale_rejections: u64,
}

impl<V: CacheValue> Cache<V> {
    /// Create an empty cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            total_size: 0,
            next_seq: 0,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: 0,
            expirations: 0,
            stale_rejections: 0,
        }
    }

    /// Configured TTL for a category
    pub fn ttl_for(&self, category: CacheCategory) -> Duration {
        let ms = match category {
            CacheCategory::Quote => self.config.quote_ttl_ms,
            CacheCategory::Historical => self.config.historical_ttl_ms,
            CacheCategory::Meta => self.config.meta_ttl_ms,
        };
        Duration::from_millis(ms)
    }

    /// Look up a live value
    pub fn get(&self, key: &CacheKey) -> Option<&V> {
        self.get_at(key, Instant::now())
    }

    /// Look up a live value as of `now`
    pub fn get_at(&self, key: &CacheKey, now: Instant) -> Option<&V> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(&entry.value)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Full entry (including expired ones not yet swept)
    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    /// Store with the category's configured TTL
    pub fn insert(&mut self, key: CacheKey, value: V) -> Result<(), CacheError> {
        let ttl = self.ttl_for(key.category);
        self.put_at(key, value, ttl, Instant::now())
    }

    /// Store with an explicit TTL
    pub fn put(&mut self, key: CacheKey, value: V, ttl: Duration) -> Result<(), CacheError> {
        self.put_at(key, value, ttl, Instant::now())
    }

    /// Store as of `now`
    pub fn put_at(
        &mut self,
        key: CacheKey,
        value: V,
        ttl: Duration,
        now: Instant,
    ) -> Result<(), CacheError> {
        let size = value.size_bytes();
        if size > self.config.max_size_bytes {
            return Err(CacheError::TooLarge {
                key: key.to_string(),
                size,
                max: self.config.max_size_bytes,
            });
        }

        if let Some(existing) = self.entries.get(&key) {
            if let (Some(stored), Some(incoming)) = (existing.value.as_of(), value.as_of()) {
                if incoming < stored {
                    self.stale_rejections += 1;
                    return Err(CacheError::StaleWrite {
                        key: key.to_string(),
                        stored,
                        incoming,
                    });
                }
            }
        }

        if let Some(old) = self.entries.remove(&key) {
            self.total_size -= old.size_bytes;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.total_size += size;
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                created_at: now,
                expires_at: now + ttl,
                size_bytes: size,
                seq,
            },
        );

        self.evict_to_fit();
        Ok(())
    }

    /// Drop a key, returning its value if present
    pub fn remove(&mut self, key: &CacheKey) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.total_size -= entry.size_bytes;
        Some(entry.value)
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let mut freed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired_at(now);
            if !keep {
                freed += entry.size_bytes;
            }
            keep
        });
        self.total_size -= freed;
        let removed = before - self.entries.len();
        self.expirations += removed as u64;
        removed
    }

    /// Live values of one category
    pub fn live_values_at(
        &self,
        category: CacheCategory,
        now: Instant,
    ) -> impl Iterator<Item = &V> + '_ {
        self.entries
            .values()
            .filter(move |e| e.key.category == category && !e.is_expired_at(now))
            .map(|e| &e.value)
    }

    pub fn live_values(&self, category: CacheCategory) -> impl Iterator<Item = &V> + '_ {
        self.live_values_at(category, Instant::now())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_size = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.total_size
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            size_bytes: self.total_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions,
            expirations: self.expirations,
            stale_rejections: self.stale_rejections,
        }
    }

    /// Evict oldest entries until both bounds hold
    fn evict_to_fit(&mut self) {
        while self.entries.len() > self.config.max_entries
            || self.total_size > self.config.max_size_bytes
        {
            let oldest = self
                .entries
                .values()
                .min_by_key(|e| (e.created_at, e.seq))
                .map(|e| e.key.clone());

            let Some(key) = oldest else { break };
            if let Some(entry) = self.entries.remove(&key) {
                self.total_size -= entry.size_bytes;
                self.evictions += 1;
                tracing::debug!(key = %key, "Evicted cache entry");
            }
        }
    }
}
