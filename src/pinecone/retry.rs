//! Bounded retry for transient index failures.

use crate::pinecone::types::IndexError;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;

/// Classify an index error as worth retrying.
///
/// Transient means rate limiting, server-side failures, and connection-level
/// errors (timeout, reset). Everything else fails immediately.
pub fn is_transient(error: &IndexError) -> bool {
    match error {
        IndexError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
        IndexError::UnexpectedStatus { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        IndexError::InvalidUrl(_) => false,
    }
}

/// Run an index operation with a fixed attempt budget and linear backoff.
///
/// Only errors classified transient by [`is_transient`] are retried; the
/// delay before attempt `n + 1` is `base_delay * n`. The final error is
/// returned once the budget is exhausted.
pub async fn with_retry<T, F, Fut>(
    attempts: u32,
    base_delay: Duration,
    operation: F,
) -> Result<T, IndexError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, IndexError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < attempts && is_transient(&error) => {
                tracing::warn!(attempt, error = %error, "Transient index error; retrying");
                tokio::time::sleep(base_delay * attempt).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
