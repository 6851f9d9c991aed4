//! Exponential-backoff retry for backend calls

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Error, Result};

/// Delay before the first retry; doubles on every attempt
pub const BASE_DELAY: Duration = Duration::from_millis(500);

/// Run `operation` up to `max_retries + 1` times, backing off between
/// attempts. Only transient errors are retried.
pub async fn retry_request<F, Fut, T>(label: &str, max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                if attempt < max_retries {
                    let delay = BASE_DELAY * 2u32.pow(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        label,
                        attempt + 1,
                        max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::llm(format!("{} failed", label))))
}
