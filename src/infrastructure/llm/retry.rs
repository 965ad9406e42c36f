//! Bounded retry with exponential backoff and a per-attempt deadline

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::timeout;
use tracing::warn;

use crate::domain::DomainError;
use crate::infrastructure::observability::record_retry;

/// Upper bound on retries regardless of configuration
pub const MAX_RETRIES: u32 = 1;

/// Retry and timeout settings shared by every upstream call
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt, clamped to [`MAX_RETRIES`]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Deadline for a single attempt
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    1
}

fn default_initial_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    2000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_timeout_ms() -> u64 {
    30000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.min(MAX_RETRIES) + 1
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before retry number `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }

    /// Run `op` until it succeeds, the error is not retryable, or attempts
    /// are exhausted
    ///
    /// Each attempt is bounded by the policy timeout; an expired deadline is
    /// reported as [`DomainError::Timeout`] naming `label` and is retryable.
    /// `label` also tags retry logs and the retry counter.
    pub async fn run<T, F, Fut, R>(
        &self,
        label: &'static str,
        mut op: F,
        is_retryable: R,
    ) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
        R: Fn(&DomainError) -> bool,
    {
        let attempts = self.attempts();
        let mut attempt = 0;

        loop {
            let result = match timeout(self.timeout(), op()).await {
                Ok(result) => result,
                Err(_) => Err(DomainError::timeout(label, self.timeout_ms)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < attempts && is_retryable(&e) => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        operation = label,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying upstream call"
                    );
                    record_retry(label);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::domain::{PipelineError, Stage};

    fn fast() -> RetryPolicy {
        RetryPolicy::default().with_initial_delay(1).with_timeout(1000)
    }

    #[test]
    fn test_retries_clamped_to_one() {
        assert_eq!(RetryPolicy::default().with_max_retries(5).attempts(), 2);
        assert_eq!(RetryPolicy::no_retry().attempts(), 1);
    }

    #[test]
    fn test_delay_for_attempt() {
        let policy = RetryPolicy {
            initial_delay_ms: 100,
            max_delay_ms: 300,
            ..Default::default()
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_succeeds_after_one_retry() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let result = fast()
            .run(
                Stage::Classification.as_str(),
                move || async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(DomainError::provider("test", "flaky"))
                    } else {
                        Ok(42)
                    }
                },
                DomainError::is_transient,
            )
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_second_failure() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let result: Result<(), _> = fast()
            .with_max_retries(3)
            .run(
                Stage::Generation.as_str(),
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(DomainError::provider("test", "down"))
                },
                DomainError::is_transient,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_fast() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let result: Result<(), _> = fast()
            .run(
                Stage::Generation.as_str(),
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(DomainError::configuration("bad key"))
                },
                DomainError::is_transient,
            )
            .await;

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_deadline() {
        let policy = RetryPolicy::no_retry().with_timeout(20);

        let result: Result<(), _> = policy
            .run(
                Stage::Retrieval.as_str(),
                || async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(())
                },
                DomainError::is_transient,
            )
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Timeout { timeout_ms: 20, .. })
        ));
    }

    #[tokio::test]
    async fn test_timed_out_attempt_is_retried_once() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let result = fast()
            .with_timeout(20)
            .run(
                Stage::Generation.as_str(),
                move || async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                    Ok("answer")
                },
                DomainError::is_transient,
            )
            .await;

        assert_eq!(result.unwrap(), "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_two_timeouts_surface_as_stage_timeout() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let result: Result<(), _> = fast()
            .with_timeout(20)
            .run(
                Stage::Classification.as_str(),
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(())
                },
                DomainError::is_transient,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let error = result.unwrap_err();
        assert!(matches!(
            &error,
            DomainError::Timeout { provider, timeout_ms: 20 } if provider == "classification"
        ));
        assert!(matches!(
            PipelineError::from_domain(Stage::Classification, error),
            PipelineError::UpstreamTimeout {
                stage: Stage::Classification,
                timeout_ms: 20
            }
        ));
    }
}
