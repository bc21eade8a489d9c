pub mod key;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

pub use key::{domain_earnings_key, earnings_key, summary_key, CacheKey};
pub use memory::TtlCache;

/// Trait for response cache implementations
///
/// Expiration is lazy: an expired entry reads as absent and is evicted by
/// the read that observes it, by `cleanup_expired`, or by `clear`.
pub trait ResponseCache: Send + Sync {
    /// Get a fresh value, evicting it if it has expired
    fn get(&self, key: &str) -> Option<Value>;

    /// Insert or overwrite a value; `None` uses the cache's default TTL
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>);

    /// Remove an entry, returning whether it existed
    fn delete(&self, key: &str) -> bool;

    /// Remove every entry, returning how many were removed
    fn clear(&self) -> usize;

    /// Remove entries whose expiry has passed
    fn cleanup_expired(&self) -> usize;

    /// Get cache statistics
    fn stats(&self) -> CacheStats;

    /// Raw dump of all stored entries, most recently created first
    fn cache_info(&self) -> Vec<CacheEntryInfo>;
}

/// Cache statistics snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
    pub sets: u64,
    pub deletes: u64,
    pub default_ttl_seconds: u64,
}

/// Descriptor of a single stored entry
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryInfo {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ttl_seconds: f64,
    pub remaining_ttl_seconds: f64,
    pub is_expired: bool,
    pub value_type: String,
    pub value_size_bytes: usize,
}
