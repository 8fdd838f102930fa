use crate::services::clock::{duration_millis, Clock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at_ms: i64,
}

/// In-process TTL cache
///
/// Backed by a bounded moka cache. Expiry is judged against the injected
/// [`Clock`], so an expired entry is never returned even before a sweep
/// physically removes it. moka's own time-to-live acts only as a ceiling
/// for entries nobody reads or sweeps.
///
/// Each process holds its own cache; there is no coherency between
/// instances.
pub struct TtlCache<V> {
    entries: moka::future::Cache<String, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache holding at most `max_entries` values
    pub fn new(max_entries: u64, max_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let entries = moka::future::CacheBuilder::new(max_entries)
            .time_to_live(max_ttl)
            .build();

        Self {
            entries,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a live value
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_millis();

        match self.entries.get(key).await {
            Some(entry) if entry.expires_at_ms > now => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key, "cache hit");
                Some(entry.value)
            }
            Some(_) => {
                self.entries.invalidate(key).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key, "cache entry expired");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key, "cache miss");
                None
            }
        }
    }

    /// Store a value that expires after `ttl`
    pub async fn set(&self, key: &str, value: V, ttl: Duration) {
        let expires_at_ms = self.clock.now_millis().saturating_add(duration_millis(ttl));
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at_ms })
            .await;
        tracing::trace!(key, ttl_ms = duration_millis(ttl), "cache set");
    }

    pub async fn delete(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    /// Remove every entry whose key starts with `prefix`
    pub async fn delete_by_prefix(&self, prefix: &str) -> usize {
        let keys: Vec<Arc<String>> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key)
            .collect();

        for key in &keys {
            self.entries.invalidate(key.as_str()).await;
        }

        tracing::debug!(prefix, removed = keys.len(), "invalidated cache prefix");
        keys.len()
    }

    /// Physically drop expired entries
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let expired: Vec<Arc<String>> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at_ms <= now)
            .map(|(key, _)| key)
            .collect();

        for key in &expired {
            self.entries.invalidate(key.as_str()).await;
        }
        self.entries.run_pending_tasks().await;

        expired.len()
    }

    pub async fn stats(&self) -> CacheStats {
        self.entries.run_pending_tasks().await;

        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.entry_count(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: u64,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a ranked discovery pool
    pub fn discovery(user_id: &str, filter_signature: &str) -> String {
        format!("discovery:{}:{}", user_id, filter_signature)
    }

    /// Prefix covering every discovery pool of one user
    pub fn discovery_prefix(user_id: &str) -> String {
        format!("discovery:{}:", user_id)
    }

    /// Build a cache key for a user profile
    pub fn profile(user_id: &str) -> String {
        format!("profile:{}", user_id)
    }
}
