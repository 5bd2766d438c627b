//! Caching decorator around a [`Router`].
//!
//! # Data Flow
//! ```text
//! route(request)
//!     → RouteCache::lookup_match (hit → return)
//!     → Router::find_match_results
//!     → diagnostic log record
//!     → RouteCache::store_match (Ok outcomes only)
//!
//! reload(router)
//!     → swap route table
//!     → RouteCache::clear
//! ```
//!
//! # Design Decisions
//! - The route table lives behind `ArcSwap`; matching never blocks a reload
//! - A reload bumps a generation counter; results computed against the
//!   previous table are returned but not stored
//! - Stores hold the generation read lock from check to write, and a reload
//!   holds the write lock from bump to flush, so no stale store survives

use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cache::backend::CacheBackend;
use crate::cache::key::{RequestDescriptor, RouteValues};
use crate::cache::route_cache::RouteCache;
use crate::routing::router::Router;
use crate::routing::types::{MatchResult, ResolvedPath, RoutingError};

pub struct CachingRouter<R, B> {
    router: ArcSwap<R>,
    cache: RouteCache<B>,
    generation: RwLock<u64>,
}

impl<R: Router, B: CacheBackend> CachingRouter<R, B> {
    pub fn new(router: R, cache: RouteCache<B>) -> Self {
        Self {
            router: ArcSwap::from_pointee(router),
            cache,
            generation: RwLock::new(0),
        }
    }

    pub fn cache(&self) -> &RouteCache<B> {
        &self.cache
    }

    /// The route table currently in use.
    pub fn current(&self) -> Arc<R> {
        self.router.load_full()
    }

    /// Match a request, consulting the cache first.
    pub async fn route(&self, request: &RequestDescriptor) -> Result<MatchResult, RoutingError> {
        if let Some(cached) = self.cache.lookup_match(request).await? {
            tracing::trace!(path = %request.path(), "Match served from cache");
            return Ok(cached);
        }

        let generation = *self.generation.read().await;
        let outcome = self.router.load().find_match_results(request);

        match &outcome {
            Ok(MatchResult::Matched { route, .. }) => {
                tracing::debug!(route = %route, path = %request.path(), "Route matched the path");
            }
            Ok(MatchResult::NoMatch) => {
                tracing::info!(path = %request.path(), "No route matched the route path");
            }
            Err(e) => {
                tracing::warn!(path = %request.path(), error = %e, "Route matching failed");
            }
        }

        let current = self.generation.read().await;
        if is_current(generation, *current) {
            self.cache.store_match(request, outcome.as_ref().ok()).await?;
        }
        drop(current);
        outcome
    }

    /// Resolve route values to a path, consulting the cache first.
    pub async fn resolve(&self, values: &RouteValues) -> Result<ResolvedPath, RoutingError> {
        if let Some(cached) = self.cache.lookup_resolved(values).await? {
            return Ok(cached);
        }

        let generation = *self.generation.read().await;
        let outcome = self.router.load().resolve(values);

        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "Route resolution failed");
        }

        let current = self.generation.read().await;
        if is_current(generation, *current) {
            self.cache.store_resolved(values, outcome.as_ref().ok()).await?;
        }
        drop(current);
        outcome
    }

    /// Replace the route table and flush the cache.
    ///
    /// Waits for in-flight stores to finish before the flush.
    pub async fn reload(&self, router: R) {
        let mut generation = self.generation.write().await;
        *generation += 1;
        self.router.store(Arc::new(router));
        self.cache.clear().await;
        tracing::info!(generation = *generation, "Route table reloaded");
    }

    /// Number of reloads so far.
    pub async fn generation(&self) -> u64 {
        *self.generation.read().await
    }
}

fn is_current(started: u64, current: u64) -> bool {
    if started != current {
        tracing::debug!(started, current, "Route table changed during lookup, not caching");
        return false;
    }
    true
}
