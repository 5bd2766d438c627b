//! Route resolution caching subsystem.
//!
//! # Data Flow
//! ```text
//! RequestDescriptor / RouteValues
//!     → key.rs (canonicalize & digest into a namespaced key)
//!     → route_cache.rs (lookup / store / clear, failures degrade to a miss)
//!     → backend.rs (CacheBackend contract, every call time-bounded)
//!     → memory.rs (sharded in-process store with LRU bound + snapshots)
//!
//! caching_router.rs wraps any Router with the lookup → compute → store
//! contract and flushes the cache when the route table is replaced.
//! ```
//!
//! # Design Decisions
//! - Three-way outcome: hit (`Some`), miss (`None`), do-not-cache (`store_*(.., None)`)
//! - Backend errors never reach the caller; invalid input always does
//! - Full flush on route changes; no selective invalidation
//! - No single-flight: concurrent misses may both compute, last write wins

pub mod backend;
pub mod caching_router;
pub mod error;
pub mod key;
pub mod memory;
pub mod route_cache;

pub use backend::CacheBackend;
pub use caching_router::CachingRouter;
pub use error::{BackendError, CacheError};
pub use key::{CacheKey, KeyKind, RequestDescriptor, RouteValues};
pub use memory::MemoryBackend;
pub use route_cache::{CacheStatsSnapshot, RouteCache};
