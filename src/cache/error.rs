//! Cache and backing-store error definitions.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a [`CacheBackend`](crate::cache::backend::CacheBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    /// The store could not be reached or refused the operation.
    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    /// Local I/O failed (snapshot files).
    #[error("backing store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur inside the route cache.
///
/// Only [`CacheError::InvalidInput`] ever reaches a caller of the
/// [`RouteCache`](crate::cache::RouteCache) facade; every other variant is
/// logged and degraded to a miss (lookup) or a no-op (store).
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backing store could not be reached.
    #[error("cache unavailable during {op}: {source}")]
    Unavailable {
        op: &'static str,
        #[source]
        source: BackendError,
    },

    /// Backing store did not answer within the configured bound.
    #[error("cache {op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    /// A stored value failed to deserialize.
    #[error("malformed cache entry {key}: {reason}")]
    MalformedEntry { key: String, reason: String },

    /// The descriptor or route values cannot be turned into a cache key.
    #[error("invalid cache input: {0}")]
    InvalidInput(String),
}
