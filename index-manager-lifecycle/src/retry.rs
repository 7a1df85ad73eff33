//! Bounded retry with exponential backoff for remote calls.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cancel::CancellationSignal;
use index_manager_repository::IndexClientError;

/// Retry policy for transient remote failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of calls, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

/// Why a retried call gave up.
#[derive(Debug)]
pub(crate) enum RetryError {
    /// The call failed with a non-retryable error.
    Permanent {
        attempts: u32,
        error: IndexClientError,
    },
    /// Every attempt failed with a retryable error.
    Exhausted {
        attempts: u32,
        last: IndexClientError,
    },
    /// Cancellation arrived before the call succeeded. `last` is `None` when
    /// no attempt was made.
    Cancelled {
        attempts: u32,
        last: Option<IndexClientError>,
    },
}

impl RetryPolicy {
    /// Create a policy with the given attempt bound and default delays.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self::with_max_attempts(1)
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = self
            .initial_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    /// Run `call` until it succeeds, fails permanently, runs out of attempts
    /// or the run is cancelled.
    ///
    /// Exactly `max_attempts` calls are made when every call fails
    /// transiently. A `max_attempts` of zero is treated as one.
    pub(crate) async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationSignal,
        operation: &str,
        mut call: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexClientError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last: Option<IndexClientError> = None;
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled {
                    attempts: attempt - 1,
                    last,
                });
            }

            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_transient() => {
                    debug!(operation, error = %error, "Non-retryable error encountered");
                    return Err(RetryError::Permanent {
                        attempts: attempt,
                        error,
                    });
                }
                Err(error) => {
                    if attempt == max_attempts {
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: error,
                        });
                    }

                    let delay = self.delay_after(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure, retrying"
                    );
                    last = Some(error);

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            return Err(RetryError::Cancelled { attempts: attempt, last });
                        }
                    }
                }
            }
        }
    }
}
