//! # Retry Policy
//!
//! Attempts an operation up to `max_attempts` times. After failed attempt `n` the
//! policy waits `base_delay × n` before trying again (linear backoff). A
//! non-retryable error is returned immediately with its classification intact, so
//! callers can tell "exhausted retries" apart from "should never have retried".

use crate::error::PipelineResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(2_000),
        }
    }
}

/// Result of [`RetryPolicy::execute`] together with how it was reached
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: PipelineResult<T>,
    /// Number of times the operation was invoked
    pub attempts: u32,
    /// Sum of backoff delays slept between attempts
    pub total_wait: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Never fewer than one attempt, even when configured with zero
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Backoff slept after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Total wait if every attempt fails with a retryable error
    pub fn worst_case_wait(&self) -> Duration {
        (1..self.effective_attempts())
            .map(|attempt| self.delay_after(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Run `operation` under the policy, returning the attempt accounting.
    ///
    /// The closure receives the 1-based attempt number.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let max_attempts = self.effective_attempts();
        let mut total_wait = Duration::ZERO;
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            operation = %operation_name,
                            attempt = attempt,
                            "✅ Operation succeeded after retry"
                        );
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                        total_wait,
                    };
                }
                Err(error) if !error.is_retryable() => {
                    debug!(
                        operation = %operation_name,
                        attempt = attempt,
                        error_kind = %error.kind(),
                        "Non-retryable failure, giving up immediately"
                    );
                    return RetryOutcome {
                        result: Err(error),
                        attempts: attempt,
                        total_wait,
                    };
                }
                Err(error) if attempt >= max_attempts => {
                    warn!(
                        operation = %operation_name,
                        attempts = attempt,
                        error = %error,
                        "❌ Retries exhausted"
                    );
                    return RetryOutcome {
                        result: Err(error),
                        attempts: attempt,
                        total_wait,
                    };
                }
                Err(error) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        operation = %operation_name,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "🔄 Attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    total_wait += delay;
                    attempt += 1;
                }
            }
        }
    }

    /// Run `operation` under the policy and return only its final result.
    pub async fn run<F, Fut, T>(&self, operation_name: &str, operation: F) -> PipelineResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        self.execute(operation_name, operation).await.result
    }
}
