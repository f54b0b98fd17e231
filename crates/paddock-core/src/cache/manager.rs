use std::time::Duration;

use chrono::Utc;
use serde::{de::DeserializeOwned, de::IgnoredAny, Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{CacheError, KeyValueStore};

/// Persisted envelope around a cached payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Write time, epoch milliseconds
    pub timestamp: i64,
    /// Validity window in milliseconds
    pub ttl: i64,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            timestamp: now_ms(),
            ttl: duration_ms(ttl),
        }
    }

    /// Valid iff `now - timestamp <= ttl`
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.timestamp) <= self.ttl
    }

    pub fn is_expired(&self) -> bool {
        !self.is_valid_at(now_ms())
    }
}

/// TTL cache over a `KeyValueStore`.
///
/// Every operation is best-effort: store and parse failures are logged and
/// reported as a miss (reads) or ignored (writes).
pub struct CacheManager<S> {
    store: S,
    /// Prefixes eligible for eviction when a write hits the store quota
    eviction_prefixes: Vec<String>,
}

impl<S: KeyValueStore> CacheManager<S> {
    pub fn new(store: S, eviction_prefixes: &[&str]) -> Self {
        Self {
            store,
            eviction_prefixes: eviction_prefixes.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read a payload. Expired or unparsable entries are deleted and
    /// reported as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.read_entry(key) {
            Ok(data) => data,
            Err(e @ CacheError::Malformed { .. }) => {
                warn!(key, error = %e, "Discarding malformed cache entry");
                self.remove(key);
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Cache read failed");
                None
            }
        }
    }

    fn read_entry<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(source) => {
                return Err(CacheError::Read {
                    key: key.to_string(),
                    source,
                })
            }
        };

        let malformed = |source| CacheError::Malformed {
            key: key.to_string(),
            source,
        };

        let entry: CacheEntry<serde_json::Value> = serde_json::from_str(&raw).map_err(malformed)?;
        if !entry.is_valid_at(now_ms()) {
            debug!(key, "Cache entry expired");
            self.remove(key);
            return Ok(None);
        }

        let data = serde_json::from_value(entry.data).map_err(malformed)?;
        Ok(Some(data))
    }

    /// True when `key` holds a valid entry. Has the same eviction side
    /// effects as `get`.
    pub fn contains(&self, key: &str) -> bool {
        self.get::<IgnoredAny>(key).is_some()
    }

    /// Write a payload with the given TTL. A quota failure triggers one
    /// expired-entry eviction pass; the write itself is not retried.
    pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) {
        match self.write_entry(key, data, ttl) {
            Ok(()) => debug!(key, "Cached entry"),
            Err(CacheError::Write { source, .. }) if source.is_quota_exceeded() => {
                warn!(key, error = %source, "Cache full, evicting expired entries");
                let prefixes: Vec<&str> = self.eviction_prefixes.iter().map(String::as_str).collect();
                self.clear_expired(&prefixes);
            }
            Err(e) => warn!(key, error = %e, "Cache write failed"),
        }
    }

    fn write_entry<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry::new(data, ttl);
        let json = serde_json::to_string(&entry).map_err(|source| CacheError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, &json).map_err(|source| CacheError::Write {
            key: key.to_string(),
            source,
        })
    }

    fn remove(&self, key: &str) -> bool {
        match self.store.remove(key) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Failed to remove cache entry");
                false
            }
        }
    }

    fn matching_keys(&self, prefixes: &[&str]) -> Vec<String> {
        match self.store.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| prefixes.iter().any(|p| k.starts_with(p)))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to enumerate cache keys");
                Vec::new()
            }
        }
    }

    /// Remove expired or unparsable entries under `prefixes`. Keys are
    /// collected first and removed after the scan. Returns the count removed.
    pub fn clear_expired(&self, prefixes: &[&str]) -> usize {
        let now = now_ms();
        let to_remove: Vec<String> = self
            .matching_keys(prefixes)
            .into_iter()
            .filter(|key| match self.store.get(key) {
                Ok(Some(raw)) => serde_json::from_str::<CacheEntry<IgnoredAny>>(&raw)
                    .map(|entry| !entry.is_valid_at(now))
                    .unwrap_or(true),
                Ok(None) => false,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to read cache entry during cleanup");
                    false
                }
            })
            .collect();

        let removed = to_remove.iter().filter(|key| self.remove(key)).count();
        if removed > 0 {
            info!(removed, "Cleared expired cache entries");
        }
        removed
    }

    /// Remove every entry under `prefixes`. Returns the count removed.
    pub fn clear_all(&self, prefixes: &[&str]) -> usize {
        let to_remove = self.matching_keys(prefixes);
        let removed = to_remove.iter().filter(|key| self.remove(key)).count();
        info!(removed, "Cleared cache entries");
        removed
    }
}

// ============================================================================
// Tests
// ============================================================================
