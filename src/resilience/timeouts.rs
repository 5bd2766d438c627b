//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap every backing-store call with a deadline
//! - Turn an expired deadline into a distinct [`CacheError::Timeout`]
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from unavailability errors
//! - The wrapped future is dropped on expiry

use std::future::Future;
use std::time::Duration;
use tokio::time;

use crate::cache::error::{BackendError, CacheError};

/// Run a backend operation, failing with [`CacheError::Timeout`] once
/// `limit` elapses.
pub async fn with_deadline<T, F>(op: &'static str, limit: Duration, fut: F) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(CacheError::Unavailable { op, source }),
        Err(_) => Err(CacheError::Timeout { op, after: limit }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_operation_passes_through() {
        let result = with_deadline("get", Duration::from_millis(100), async { Ok::<_, BackendError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_backend_error_is_unavailable() {
        let result: Result<(), _> = with_deadline("set", Duration::from_millis(100), async {
            Err(BackendError::Unavailable("down".into()))
        })
        .await;
        assert!(matches!(result, Err(CacheError::Unavailable { op: "set", .. })));
    }

    #[tokio::test]
    async fn test_slow_operation_times_out() {
        let result = with_deadline("get", Duration::from_millis(10), async {
            time::sleep(Duration::from_secs(5)).await;
            Ok::<_, BackendError>(())
        })
        .await;
        assert!(matches!(result, Err(CacheError::Timeout { op: "get", .. })));
    }
}
