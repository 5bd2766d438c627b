//! Route resolution cache.
//!
//! Memoizes match and resolve outcomes in a [`CacheBackend`]. A hit must be
//! indistinguishable from recomputation, so every backend failure degrades
//! to a miss (lookup) or a no-op (store).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::backend::CacheBackend;
use crate::cache::error::CacheError;
use crate::cache::key::{CacheKey, RequestDescriptor, RouteValues};
use crate::config::CacheConfig;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::routing::types::{MatchResult, ResolvedPath};

/// Version written into every stored envelope.
const ENTRY_FORMAT_VERSION: u8 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    v: u8,
    value: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    v: u8,
    value: T,
}

/// Counters describing cache effectiveness.
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    skipped_stores: AtomicU64,
    degraded: AtomicU64,
    malformed: AtomicU64,
    clears: AtomicU64,
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    /// Store calls that carried a do-not-cache outcome.
    pub skipped_stores: u64,
    /// Backend calls that failed or timed out and were hidden.
    pub degraded: u64,
    /// Entries that failed to decode and were removed.
    pub malformed: u64,
    pub clears: u64,
    /// Entries currently held, when the backend can tell.
    pub entries: Option<usize>,
}

/// A two-key cache in front of a router.
///
/// Cloning is cheap; clones share the backend and the counters.
pub struct RouteCache<B> {
    backend: Arc<B>,
    timeout: Duration,
    stats: Arc<CacheStats>,
}

impl<B> Clone for RouteCache<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            timeout: self.timeout,
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<B: CacheBackend> RouteCache<B> {
    /// Create a cache over `backend`, bounding every backend call by
    /// `timeout`.
    pub fn new(backend: Arc<B>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn from_config(backend: Arc<B>, config: &CacheConfig) -> Self {
        Self::new(backend, config.timeout())
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Look up a cached match outcome.
    ///
    /// `Ok(None)` means "never attempted", which is distinct from a cached
    /// `Some(MatchResult::NoMatch)`.
    pub async fn lookup_match(&self, request: &RequestDescriptor) -> Result<Option<MatchResult>, CacheError> {
        let key = request.cache_key()?;
        Ok(self.fetch(&key).await)
    }

    /// Store a match outcome. `None` marks the attempt as not cacheable.
    pub async fn store_match(
        &self,
        request: &RequestDescriptor,
        result: Option<&MatchResult>,
    ) -> Result<(), CacheError> {
        let key = request.cache_key()?;
        self.put(&key, result).await;
        Ok(())
    }

    /// Look up a cached resolved path.
    pub async fn lookup_resolved(&self, values: &RouteValues) -> Result<Option<ResolvedPath>, CacheError> {
        let key = values.cache_key()?;
        Ok(self.fetch(&key).await)
    }

    /// Store a resolved path. `None` marks the attempt as not cacheable.
    pub async fn store_resolved(&self, values: &RouteValues, path: Option<&ResolvedPath>) -> Result<(), CacheError> {
        let key = values.cache_key()?;
        self.put(&key, path).await;
        Ok(())
    }

    /// Flush every entry. Called whenever the route set changes.
    pub async fn clear(&self) {
        self.stats.clears.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_clear();

        match with_deadline("clear", self.timeout, self.backend.clear()).await {
            Ok(()) => tracing::info!("Route cache flushed"),
            Err(e) => {
                self.stats.degraded.fetch_add(1, Ordering::Relaxed);
                metrics::record_backend_error("clear");
                tracing::warn!(error = %e, "Route cache flush failed");
            }
        }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        let s = &self.stats;
        CacheStatsSnapshot {
            hits: s.hits.load(Ordering::Relaxed),
            misses: s.misses.load(Ordering::Relaxed),
            stores: s.stores.load(Ordering::Relaxed),
            skipped_stores: s.skipped_stores.load(Ordering::Relaxed),
            degraded: s.degraded.load(Ordering::Relaxed),
            malformed: s.malformed.load(Ordering::Relaxed),
            clears: s.clears.load(Ordering::Relaxed),
            entries: self.backend.len(),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let kind = key.kind().as_str();

        let bytes = match with_deadline("get", self.timeout, self.backend.get(key.as_str())).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.record_miss(kind);
                return None;
            }
            Err(e) => {
                self.stats.degraded.fetch_add(1, Ordering::Relaxed);
                metrics::record_backend_error("get");
                tracing::warn!(key = %key, error = %e, "Cache lookup degraded to a miss");
                self.record_miss(kind);
                return None;
            }
        };

        match decode::<T>(key, &bytes) {
            Ok(value) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup(kind, "hit");
                Some(value)
            }
            Err(e) => {
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "Removing malformed cache entry");
                if let Err(e) = with_deadline("remove", self.timeout, self.backend.remove(key.as_str())).await {
                    self.stats.degraded.fetch_add(1, Ordering::Relaxed);
                    metrics::record_backend_error("remove");
                    tracing::warn!(key = %key, error = %e, "Failed to remove malformed cache entry");
                }
                self.record_miss(kind);
                None
            }
        }
    }

    async fn put<T: Serialize>(&self, key: &CacheKey, value: Option<&T>) {
        let kind = key.kind().as_str();
        let Some(value) = value else {
            self.stats.skipped_stores.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(key = %key, "Outcome not cacheable, skipping store");
            return;
        };

        let envelope = EnvelopeRef {
            v: ENTRY_FORMAT_VERSION,
            value,
        };
        let bytes = match serde_json::to_vec(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to encode cache entry");
                return;
            }
        };

        match with_deadline("set", self.timeout, self.backend.set(key.as_str(), bytes)).await {
            Ok(()) => {
                self.stats.stores.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_store(kind);
            }
            Err(e) => {
                self.stats.degraded.fetch_add(1, Ordering::Relaxed);
                metrics::record_backend_error("set");
                tracing::warn!(key = %key, error = %e, "Cache store skipped");
            }
        }
    }

    fn record_miss(&self, kind: &'static str) {
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_lookup(kind, "miss");
    }
}

fn decode<T: DeserializeOwned>(key: &CacheKey, bytes: &[u8]) -> Result<T, CacheError> {
    let malformed = |reason: String| CacheError::MalformedEntry {
        key: key.to_string(),
        reason,
    };

    let envelope: Envelope<T> = serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
    if envelope.v != ENTRY_FORMAT_VERSION {
        return Err(malformed(format!("unsupported entry version {}", envelope.v)));
    }
    Ok(envelope.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryBackend;
    use serde_json::{json, Map};

    fn cache() -> RouteCache<MemoryBackend> {
        RouteCache::new(Arc::new(MemoryBackend::new(128)), Duration::from_millis(100))
    }

    fn blog_show() -> MatchResult {
        let mut params = Map::new();
        params.insert("year".into(), json!("2020"));
        params.insert("slug".into(), json!("hello"));
        MatchResult::matched("blog.show", params)
    }

    #[tokio::test]
    async fn test_match_round_trip() {
        let cache = cache();
        let request = RequestDescriptor::new("/blog/2020/hello");

        assert_eq!(cache.lookup_match(&request).await.unwrap(), None);

        cache.store_match(&request, Some(&blog_show())).await.unwrap();
        assert_eq!(cache.lookup_match(&request).await.unwrap(), Some(blog_show()));

        let other = RequestDescriptor::new("/blog/2020/other");
        assert_eq!(cache.lookup_match(&other).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_no_match_is_cached_but_none_is_not() {
        let cache = cache();
        let missing = RequestDescriptor::new("/nowhere");
        let failed = RequestDescriptor::new("/failed");

        cache.store_match(&missing, Some(&MatchResult::NoMatch)).await.unwrap();
        cache.store_match(&failed, None).await.unwrap();

        assert_eq!(cache.lookup_match(&missing).await.unwrap(), Some(MatchResult::NoMatch));
        assert_eq!(cache.lookup_match(&failed).await.unwrap(), None);

        let stats = cache.stats();
        assert_eq!(stats.stores, 1);
        assert_eq!(stats.skipped_stores, 1);
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let cache = cache();
        let request = RequestDescriptor::new("/blog/2020/hello");

        cache.store_match(&request, Some(&blog_show())).await.unwrap();
        cache.store_match(&request, Some(&blog_show())).await.unwrap();

        assert_eq!(cache.stats().entries, Some(1));
        assert_eq!(cache.lookup_match(&request).await.unwrap(), Some(blog_show()));
    }

    #[tokio::test]
    async fn test_resolved_round_trip() {
        let cache = cache();
        let values = RouteValues::new()
            .with("controller", "blog")
            .with("action", "show")
            .with("slug", "hello");
        let reordered = RouteValues::new()
            .with("slug", "hello")
            .with("action", "show")
            .with("controller", "blog");

        cache
            .store_resolved(&values, Some(&ResolvedPath::Path("/blog/hello".into())))
            .await
            .unwrap();

        assert_eq!(
            cache.lookup_resolved(&reordered).await.unwrap(),
            Some(ResolvedPath::Path("/blog/hello".into()))
        );
    }

    #[tokio::test]
    async fn test_unresolvable_is_cached() {
        let cache = cache();
        let values = RouteValues::new().with("controller", "missing");

        cache.store_resolved(&values, Some(&ResolvedPath::Unresolvable)).await.unwrap();
        assert_eq!(
            cache.lookup_resolved(&values).await.unwrap(),
            Some(ResolvedPath::Unresolvable)
        );
    }

    #[tokio::test]
    async fn test_clear_flushes_everything() {
        let cache = cache();
        let request = RequestDescriptor::new("/blog/2020/hello");
        let values = RouteValues::new().with("slug", "hello");

        cache.store_match(&request, Some(&blog_show())).await.unwrap();
        cache
            .store_resolved(&values, Some(&ResolvedPath::Path("/blog/hello".into())))
            .await
            .unwrap();

        cache.clear().await;

        assert_eq!(cache.lookup_match(&request).await.unwrap(), None);
        assert_eq!(cache.lookup_resolved(&values).await.unwrap(), None);
        assert_eq!(cache.stats().clears, 1);
    }

    #[tokio::test]
    async fn test_malformed_entry_is_removed() {
        let cache = cache();
        let request = RequestDescriptor::new("/blog/2020/hello");
        let key = request.cache_key().unwrap();

        cache.backend().set(key.as_str(), b"not json".to_vec()).await.unwrap();
        assert_eq!(cache.lookup_match(&request).await.unwrap(), None);
        assert!(cache.backend().get(key.as_str()).await.unwrap().is_none());

        // Wrong format version
        cache
            .backend()
            .set(key.as_str(), br#"{"v":99,"value":{"outcome":"no_match"}}"#.to_vec())
            .await
            .unwrap();
        assert_eq!(cache.lookup_match(&request).await.unwrap(), None);
        assert_eq!(cache.stats().malformed, 2);
    }

    #[tokio::test]
    async fn test_invalid_input_surfaces() {
        let cache = cache();
        let bad = RequestDescriptor::new("relative/path");

        assert!(matches!(
            cache.lookup_match(&bad).await,
            Err(CacheError::InvalidInput(_))
        ));
        assert!(matches!(
            cache.store_match(&bad, Some(&MatchResult::NoMatch)).await,
            Err(CacheError::InvalidInput(_))
        ));
    }
}
