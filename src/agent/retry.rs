//! Retry wrapper for agent calls whose provider error matches the
//! retry-pattern list: up to 3 attempts total, exponential backoff with a
//! 250ms base.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::error::AgentError;

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(250);

pub async fn call_with_retry<F, Fut, T>(mut attempt: F) -> Result<T, AgentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
{
    let mut last_err = None;

    for attempt_number in 0..MAX_ATTEMPTS {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt_number + 1 < MAX_ATTEMPTS => {
                let backoff = BASE_BACKOFF * 2u32.pow(attempt_number);
                warn!(attempt_number, ?backoff, error = %err, "call_with_retry: retrying after backoff");
                tokio::time::sleep(backoff).await;
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_err.expect("loop always attempts at least once"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result = call_with_retry(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AgentError::Provider("rate limit hit".to_string()))
                } else {
                    Ok::<_, AgentError>("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), AgentError> = call_with_retry(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(AgentError::Provider("rate limit hit".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), AgentError> = call_with_retry(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(AgentError::SchemaMismatch("bad shape".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
