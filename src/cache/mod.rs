//! Expiring cache module
//!
//! TTL-keyed store with per-category lifetimes, capacity eviction and
//! stale-write rejection.

mod store;
mod types;

pub use store::Cache;
pub use types::{CacheCategory, CacheEntry, CacheError, CacheKey, CacheStats, CacheValue};
