use crate::config::RetryConfig;
use crate::error::{ClientError, Result};
use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Opt-in retry for operations whose failures may be transient.
///
/// The executor never retries on its own; callers wrap the operations they
/// consider safe to repeat. Only rate-limit, server, network and timeout
/// failures are retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    backoff: ExponentialBuilder,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(config.min_backoff_ms))
            .with_max_delay(Duration::from_millis(config.max_backoff_ms))
            .with_max_times(config.max_attempts.saturating_sub(1))
            .with_jitter();
        Self { backoff }
    }

    /// A policy that makes a single attempt.
    #[must_use]
    pub fn once() -> Self {
        Self { backoff: ExponentialBuilder::default().with_max_times(0) }
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error, or
    /// runs out of attempts. The last error is returned.
    ///
    /// # Errors
    /// Returns the final error produced by `operation`.
    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_while(operation, || true).await
    }

    /// Like [`run`](Self::run), but makes no further attempt once `cancel`
    /// has fired.
    ///
    /// # Errors
    /// Returns the final error produced by `operation`.
    pub async fn run_cancellable<T, F, Fut>(&self, cancel: &CancellationToken, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_while(operation, || !cancel.is_cancelled()).await
    }

    async fn run_while<T, F, Fut, K>(&self, operation: F, keep_going: K) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        K: Fn() -> bool,
    {
        operation
            .retry(self.backoff)
            .when(|e| e.is_retryable() && keep_going())
            .adjust(|e, delay| e.retry_after().map_or(delay, |after| delay.map(|d| d.max(after))))
            .notify(|e, delay| {
                tracing::warn!(kind = %e.kind(), error = %e, "Request failed, retrying in {:?}", delay);
            })
            .await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
