//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap outbound calls with a hard deadline
//! - Cancel operations cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Error returned by [`with_timeout`].
#[derive(Debug, Error)]
pub enum TimeoutError<E> {
    #[error("operation timed out after {0:?}")]
    Elapsed(Duration),

    #[error(transparent)]
    Inner(E),
}

/// Run a fallible future with a deadline.
pub async fn with_timeout<F, T, E>(deadline: Duration, fut: F) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TimeoutError::Inner(e)),
        Err(_) => Err(TimeoutError::Elapsed(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_is_distinct() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, String>(1)
        };
        let res = with_timeout(Duration::from_secs(5), slow).await;
        assert!(matches!(res, Err(TimeoutError::Elapsed(d)) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let res = with_timeout(Duration::from_secs(1), async { Err::<u8, _>("refused") }).await;
        assert!(matches!(res, Err(TimeoutError::Inner("refused"))));

        let ok = with_timeout(Duration::from_secs(1), async { Ok::<_, ()>(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }
}
