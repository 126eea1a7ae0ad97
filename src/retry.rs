//! Timeout and retry wrapper for external calls.

use std::future::Future;
use std::time::Duration;

use crate::config::CallPolicy;

/// Errors that can describe an elapsed deadline and whether a retry may help.
pub trait RetryableError: Sized {
    fn is_transient(&self) -> bool;
    fn timed_out(operation: &str, timeout: Duration) -> Self;
}

impl RetryableError for crate::error::LlmError {
    fn is_transient(&self) -> bool {
        crate::error::LlmError::is_transient(self)
    }

    fn timed_out(_operation: &str, timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }
}

impl RetryableError for crate::error::WalletError {
    fn is_transient(&self) -> bool {
        crate::error::WalletError::is_transient(self)
    }

    fn timed_out(operation: &str, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.to_string(),
            timeout,
        }
    }
}

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Run `call` under `policy.timeout`, retrying transient failures up to
/// `policy.max_retries` times.
pub async fn with_retry<T, E, F, Fut>(operation: &str, policy: CallPolicy, mut call: F) -> Result<T, E>
where
    E: RetryableError + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        let result = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(E::timed_out(operation, policy.timeout)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(operation, attempt, error = %e, "Transient failure, retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Run `call` under `policy.timeout` without retrying.
pub async fn with_timeout<T, E, Fut>(operation: &str, policy: CallPolicy, call: Fut) -> Result<T, E>
where
    E: RetryableError,
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(policy.timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(E::timed_out(operation, policy.timeout)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::{LlmError, WalletError};

    fn policy(ms: u64, retries: u32) -> CallPolicy {
        CallPolicy::new(Duration::from_millis(ms), retries)
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_once() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32, LlmError> = with_retry("chat", policy(1_000, 1), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LlmError::RequestFailed {
                    message: "connection reset".into(),
                })
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), LlmError> = with_retry("chat", policy(1_000, 3), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::ParseError {
                message: "bad json".into(),
            })
        })
        .await;
        assert!(matches!(result, Err(LlmError::ParseError { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_timeouts_surface_as_timeout() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), LlmError> = with_retry("chat", policy(50, 1), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(LlmError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout_names_the_operation() {
        let result: Result<(), WalletError> = with_timeout("transfer", policy(10, 0), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        match result {
            Err(WalletError::Timeout { operation, .. }) => assert_eq!(operation, "transfer"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
