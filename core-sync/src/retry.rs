//! # Resilient Request Executor
//!
//! Runs one unit of remote work with bounded retries and exponential
//! backoff.
//!
//! - Errors with a 4xx status, or whose text says "not found",
//!   "unauthorized" or "forbidden", are terminal and returned at once.
//! - Everything else, including results the server declared unsuccessful,
//!   is retried up to `max_retries` more times.
//! - The delay before retry `k` (0-based) is `base_delay * 2^k`, capped at
//!   `max_delay`.
//! - The last outcome is returned, success or not.

use crate::{Result, SyncError};
use bridge_traits::{ChunkUploadResult, SavePhotoResult, Sleeper};
use core_runtime::config::RetryConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Lets the executor see "declared but unsuccessful" results
pub trait RetryOutcome {
    /// Whether the value counts as a definitive outcome
    fn is_definitive(&self) -> bool {
        true
    }
}

impl RetryOutcome for SavePhotoResult {
    fn is_definitive(&self) -> bool {
        self.success || self.skipped
    }
}

impl RetryOutcome for ChunkUploadResult {}

impl RetryOutcome for () {}

#[derive(Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { config, sleeper }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Backoff before retry number `attempt + 1`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.config
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay)
    }

    /// Execute `operation`, calling `on_retry(n)` before the n-th retry.
    ///
    /// `on_retry` is for progress reporting only and has no effect on
    /// control flow.
    pub async fn run<T, F, Fut, R>(&self, mut operation: F, mut on_retry: R) -> Result<T>
    where
        T: RetryOutcome,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        R: FnMut(u32),
    {
        let max_retries = self.config.max_retries;

        for attempt in 0..=max_retries {
            let result = operation().await;

            let retryable = match &result {
                Ok(value) => !value.is_definitive(),
                Err(e) => !e.is_terminal(),
            };

            if !retryable {
                return result;
            }
            if attempt == max_retries {
                debug!("Retry budget of {} exhausted", max_retries);
                return result;
            }

            let delay = self.delay_for_attempt(attempt);
            match &result {
                Err(e) => warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after error: {}",
                    e
                ),
                Ok(_) => warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after unsuccessful result"
                ),
            }

            on_retry(attempt + 1);
            self.sleeper.sleep(delay).await;
        }

        Err(SyncError::RetriesExhausted {
            attempts: max_retries + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn executor(max_retries: u32) -> (RetryExecutor, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let config = RetryConfig {
            max_retries,
            ..RetryConfig::default()
        };
        (RetryExecutor::new(config, sleeper.clone()), sleeper)
    }

    fn saved() -> SavePhotoResult {
        SavePhotoResult {
            success: true,
            skipped: false,
            photo_name: Some("cover.jpg".to_string()),
            error: None,
        }
    }

    fn unsuccessful() -> SavePhotoResult {
        SavePhotoResult {
            success: false,
            skipped: false,
            photo_name: None,
            error: Some("temporarily unavailable".to_string()),
        }
    }

    fn server_error() -> SyncError {
        SyncError::Remote {
            status: Some(500),
            message: "Internal Server Error".to_string(),
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let (executor, _) = executor(10);
        let delays: Vec<u64> = (0..8)
            .map(|k| executor.delay_for_attempt(k).as_millis() as u64)
            .collect();
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]
        );
        assert_eq!(executor.delay_for_attempt(40), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_success_needs_no_retry() {
        let (executor, sleeper) = executor(10);
        let mut retries = Vec::new();

        let result = executor
            .run(|| async { Ok(saved()) }, |attempt| retries.push(attempt))
            .await
            .unwrap();

        assert!(result.success);
        assert!(retries.is_empty());
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_found_status_is_never_retried() {
        let (executor, sleeper) = executor(10);
        let calls = AtomicU32::new(0);
        let mut retries = 0;

        let result: Result<SavePhotoResult> = executor
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        Err(SyncError::Remote {
                            status: Some(404),
                            message: "Photo not available".to_string(),
                        })
                    }
                },
                |_| retries += 1,
            )
            .await;

        assert_eq!(result.unwrap_err().status(), Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(retries, 0);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_message_is_never_retried() {
        let (executor, _) = executor(10);
        let calls = AtomicU32::new(0);

        let result: Result<()> = executor
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        Err(SyncError::Remote {
                            status: None,
                            message: "Session Unauthorized".to_string(),
                        })
                    }
                },
                |_| {},
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_then_success() {
        let (executor, sleeper) = executor(10);
        let calls = AtomicU32::new(0);
        let mut retries = Vec::new();

        let result = executor
            .run(
                || {
                    let call = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if call < 2 {
                            Err(server_error())
                        } else {
                            Ok(saved())
                        }
                    }
                },
                |attempt| retries.push(attempt),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(retries, vec![1, 2]);
        assert_eq!(
            *sleeper.delays.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn test_declared_failure_is_retried_and_last_outcome_returned() {
        let (executor, sleeper) = executor(3);
        let calls = AtomicU32::new(0);

        let result = executor
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(unsuccessful()) }
                },
                |_| {},
            )
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("temporarily unavailable"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(sleeper.delays.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_skip_is_definitive() {
        let (executor, _) = executor(10);
        let calls = AtomicU32::new(0);

        let result = executor
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        Ok(SavePhotoResult {
                            success: false,
                            skipped: true,
                            photo_name: None,
                            error: None,
                        })
                    }
                },
                |_| {},
            )
            .await
            .unwrap();

        assert!(result.skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_budget_returns_last_error() {
        let (executor, _) = executor(2);
        let mut retries = Vec::new();

        let result: Result<()> = executor
            .run(|| async { Err(server_error()) }, |attempt| retries.push(attempt))
            .await;

        assert!(matches!(
            result,
            Err(SyncError::Remote {
                status: Some(500),
                ..
            })
        ));
        assert_eq!(retries, vec![1, 2]);
    }
}
