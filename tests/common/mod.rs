//! Shared test doubles for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use route_cache::cache::{BackendError, CacheBackend, MemoryBackend, RequestDescriptor, RouteValues};
use route_cache::config::{parse_config, RouteConfig};
use route_cache::routing::{MatchResult, ResolvedPath, RouteTable, Router, RoutingError};

pub const BLOG_CONFIG: &str = r#"
    [cache]
    timeout_ms = 100
    max_entries = 1000

    [[routes]]
    name = "blog.show"
    uri_pattern = "/blog/{year}/{slug}"
    priority = 10
    [routes.defaults]
    controller = "blog"
    action = "show"

    [[routes]]
    name = "blog.short"
    uri_pattern = "/blog/{slug}"
    [routes.defaults]
    controller = "blog"
    action = "show"
"#;

pub fn blog_routes() -> Vec<RouteConfig> {
    parse_config(BLOG_CONFIG).unwrap().routes
}

pub fn blog_table() -> RouteTable {
    RouteTable::from_config(&blog_routes()).unwrap()
}

/// A memory store that can be switched into an unreachable state.
pub struct FlakyBackend {
    inner: MemoryBackend,
    down: AtomicBool,
}

impl FlakyBackend {
    pub fn new() -> Self {
        Self {
            inner: MemoryBackend::new(1000),
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.down.load(Ordering::SeqCst) {
            Err(BackendError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl CacheBackend for FlakyBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), BackendError> {
        self.check()?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.check()?;
        self.inner.remove(key).await
    }

    async fn clear(&self) -> Result<(), BackendError> {
        self.check()?;
        self.inner.clear().await
    }
}

/// A store whose calls take `delay`.
pub struct SlowBackend {
    inner: MemoryBackend,
    delay: Duration,
    slow_reads: bool,
}

impl SlowBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryBackend::new(1000),
            delay,
            slow_reads: true,
        }
    }

    /// Only `set` is delayed; reads, removals and flushes are immediate.
    pub fn slow_writes(delay: Duration) -> Self {
        Self {
            slow_reads: false,
            ..Self::new(delay)
        }
    }

    async fn pause(&self) {
        if self.slow_reads {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl CacheBackend for SlowBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.pause().await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.pause().await;
        self.inner.remove(key).await
    }

    async fn clear(&self) -> Result<(), BackendError> {
        self.pause().await;
        self.inner.clear().await
    }

    fn len(&self) -> Option<usize> {
        self.inner.len()
    }
}

/// Wraps a route table and counts real (uncached) calls.
pub struct CountingRouter {
    table: RouteTable,
    matches: Arc<AtomicUsize>,
    resolves: Arc<AtomicUsize>,
    fail: bool,
}

impl CountingRouter {
    pub fn new(table: RouteTable) -> Self {
        Self {
            table,
            matches: Arc::new(AtomicUsize::new(0)),
            resolves: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    /// A router whose every call errors.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(RouteTable::default())
        }
    }

    pub fn match_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.matches)
    }

    pub fn resolve_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.resolves)
    }

    fn failure(&self) -> RoutingError {
        RoutingError::UnsupportedValue {
            route: "failing".into(),
            name: "any".into(),
        }
    }
}

impl Router for CountingRouter {
    fn find_match_results(&self, request: &RequestDescriptor) -> Result<MatchResult, RoutingError> {
        self.matches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(self.failure());
        }
        self.table.find_match_results(request)
    }

    fn resolve(&self, values: &RouteValues) -> Result<ResolvedPath, RoutingError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(self.failure());
        }
        self.table.resolve(values)
    }
}
