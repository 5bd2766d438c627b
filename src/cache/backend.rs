//! Backing-store contract.

use std::future::Future;
use std::sync::Arc;

use crate::cache::error::BackendError;

/// A key/value store the route cache delegates physical storage to.
///
/// Implementations may live in process memory, on local disk or behind a
/// network hop. Latency is bounded by the caller, not by the backend.
pub trait CacheBackend: Send + Sync + 'static {
    /// Fetch the bytes stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, BackendError>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Vec<u8>) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Drop a single entry. Missing keys are not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Drop every entry.
    fn clear(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Number of stored entries, if the store can tell cheaply.
    fn len(&self) -> Option<usize> {
        None
    }
}

impl<B: CacheBackend> CacheBackend for Arc<B> {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, BackendError>> + Send {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> impl Future<Output = Result<(), BackendError>> + Send {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), BackendError>> + Send {
        (**self).remove(key)
    }

    fn clear(&self) -> impl Future<Output = Result<(), BackendError>> + Send {
        (**self).clear()
    }

    fn len(&self) -> Option<usize> {
        (**self).len()
    }
}
