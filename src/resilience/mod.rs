//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the backing store:
//!     → timeouts.rs (enforce the configured deadline)
//!     → On failure: caller degrades to a miss / no-op
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - No retries: a miss is always a correct answer

pub mod timeouts;
