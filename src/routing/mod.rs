//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming RequestDescriptor (path, host, method)
//!     → router.rs (route lookup in priority order)
//!     → matcher.rs (evaluate conditions, match URI pattern)
//!     → Return: MatchResult::Matched or MatchResult::NoMatch
//!
//! RouteValues
//!     → router.rs (first route whose pattern and defaults fit)
//!     → matcher.rs (expand URI pattern)
//!     → Return: ResolvedPath::Path or ResolvedPath::Unresolvable
//!
//! Route Compilation (at startup and on reload):
//!     RouteConfig[]
//!     → Compile patterns and conditions
//!     → Sort by priority
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled up front, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by priority)

pub mod matcher;
pub mod router;
pub mod types;

pub use router::{Route, RouteTable, Router};
pub use types::{MatchResult, ResolvedPath, RoutingError};
