//! Route resolution cache library.
//!
//! Memoizes router match and resolve calls in a pluggable, time-bounded
//! backing store.

pub mod cache;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod query;
pub mod resilience;
pub mod routing;

pub use cache::{CachingRouter, MemoryBackend, RequestDescriptor, RouteCache, RouteValues};
pub use config::AppConfig;
pub use routing::{MatchResult, ResolvedPath, RouteTable, Router};
