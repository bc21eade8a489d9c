use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::cache::{CacheEntryInfo, CacheStats, ResponseCache};

/// Stored value with its freshness window
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn new(value: Value, ttl: Duration, now: DateTime<Utc>) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            value,
            created_at: now,
            expires_at,
            ttl,
        }
    }

    /// Fresh while `now <= expires_at`
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    fn describe(&self, key: &str, now: DateTime<Utc>) -> CacheEntryInfo {
        let remaining_ms = (self.expires_at - now).num_milliseconds().max(0);

        CacheEntryInfo {
            key: key.to_string(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            ttl_seconds: self.ttl.as_secs_f64(),
            remaining_ttl_seconds: round_to(remaining_ms as f64 / 1000.0, 1),
            is_expired: self.is_expired_at(now),
            value_type: value_type_name(&self.value).to_string(),
            value_size_bytes: self.value.to_string().len(),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: u64,
    hits: u64,
    misses: u64,
    sets: u64,
    deletes: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    counters: Counters,
}

/// In-memory TTL cache guarded by a single mutex
///
/// Counters accumulate for the lifetime of the instance; `clear` only drops
/// entries. There is no background eviction, see
/// [`crate::engine::ReportingService::spawn_cleanup_task`] for a periodic sweep.
pub struct TtlCache {
    default_ttl: Duration,
    state: Mutex<CacheState>,
}

impl TtlCache {
    /// Create new cache with the TTL applied when `set` gets none
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    // Every statement leaves the state consistent, so a poisoned lock is still usable.
    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl ResponseCache for TtlCache {
    fn get(&self, key: &str) -> Option<Value> {
        let now = Utc::now();
        let mut state = self.state();
        state.counters.total_requests += 1;

        let expired = match state.entries.get(key) {
            None => {
                state.counters.misses += 1;
                tracing::debug!("Cache miss: {}", key);
                return None;
            }
            Some(entry) => entry.is_expired_at(now),
        };

        if expired {
            state.entries.remove(key);
            state.counters.misses += 1;
            tracing::debug!("Cache entry expired: {}", key);
            return None;
        }

        state.counters.hits += 1;
        tracing::debug!("Cache hit: {}", key);
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry::new(value, ttl, Utc::now());

        let mut state = self.state();
        state.entries.insert(key.to_string(), entry);
        state.counters.sets += 1;
    }

    fn delete(&self, key: &str) -> bool {
        let mut state = self.state();
        if state.entries.remove(key).is_some() {
            state.counters.deletes += 1;
            true
        } else {
            false
        }
    }

    fn clear(&self) -> usize {
        let mut state = self.state();
        let count = state.entries.len();
        state.entries.clear();
        count
    }

    fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut state = self.state();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired_at(now));
        before - state.entries.len()
    }

    fn stats(&self) -> CacheStats {
        let state = self.state();
        let counters = &state.counters;

        let hit_rate = if counters.total_requests > 0 {
            counters.hits as f64 / counters.total_requests as f64 * 100.0
        } else {
            0.0
        };

        CacheStats {
            total_entries: state.entries.len(),
            total_requests: counters.total_requests,
            hits: counters.hits,
            misses: counters.misses,
            hit_rate_percent: round_to(hit_rate, 2),
            sets: counters.sets,
            deletes: counters.deletes,
            default_ttl_seconds: self.default_ttl.as_secs(),
        }
    }

    fn cache_info(&self) -> Vec<CacheEntryInfo> {
        let now = Utc::now();
        let state = self.state();

        let mut info: Vec<CacheEntryInfo> = state
            .entries
            .iter()
            .map(|(key, entry)| entry.describe(key, now))
            .collect();

        info.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.key.cmp(&b.key)));
        info
    }
}
