//! In-memory TTL cache for merged search results.
//!
//! Caches the final deduplicated candidate list keyed by the
//! (lowercased query, provider set, limit) triple. Uses [`moka`] for
//! async-friendly caching with TTL and automatic eviction. Each
//! orchestrator owns its own cache.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use moka::future::Cache;

use crate::types::Candidate;

/// Maximum number of cached result sets.
const MAX_CACHE_ENTRIES: u64 = 100;

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    provider_hash: u64,
    limit: usize,
}

impl CacheKey {
    /// Build a deterministic cache key. The query is lowercased and
    /// trimmed; the provider list is sorted before hashing.
    pub fn new(query: &str, providers: &[&str], limit: usize) -> Self {
        Self {
            query: query.trim().to_lowercase(),
            provider_hash: hash_providers(providers),
            limit,
        }
    }
}

/// Result cache. Disabled when built with a zero TTL.
#[derive(Clone)]
pub struct SearchCache {
    inner: Option<Cache<CacheKey, Vec<Candidate>>>,
}

impl SearchCache {
    pub fn new(ttl_seconds: u64) -> Self {
        let inner = (ttl_seconds > 0).then(|| {
            Cache::builder()
                .max_capacity(MAX_CACHE_ENTRIES)
                .time_to_live(Duration::from_secs(ttl_seconds))
                .build()
        });
        Self { inner }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Look up cached results. Always `None` when disabled.
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<Candidate>> {
        match self.inner {
            Some(ref cache) => cache.get(key).await,
            None => None,
        }
    }

    /// Insert results. No-op when disabled.
    pub async fn insert(&self, key: CacheKey, results: Vec<Candidate>) {
        if let Some(ref cache) = self.inner {
            cache.insert(key, results).await;
        }
    }
}

fn hash_providers(providers: &[&str]) -> u64 {
    let mut sorted: Vec<&str> = providers.to_vec();
    sorted.sort_unstable();
    let mut hasher = DefaultHasher::new();
    for name in sorted {
        name.hash(&mut hasher);
    }
    hasher.finish()
}
