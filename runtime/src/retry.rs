//! Fixed-delay retry for startup dependencies.
//!
//! Both the storage bootstrap (bounded) and the broker wait (unbounded) are driven
//! by the same helper; only the [`RetryPolicy`] differs.
//!
//! # Example
//!
//! ```rust
//! use order_ingest_runtime::retry::{retry, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(5)
//!     .delay(Duration::from_millis(10))
//!     .build();
//!
//! let value = retry(&policy, "example", |_attempt| async {
//!     Ok::<_, String>(42)
//! })
//! .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// How often and how persistently to retry.
///
/// # Default Values
///
/// - `max_attempts`: 5
/// - `delay`: 2 seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts before giving up; `None` retries forever
    pub max_attempts: Option<usize>,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::bounded(5, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    /// Give up after `max_attempts` failed attempts.
    #[must_use]
    pub const fn bounded(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            delay,
        }
    }

    /// Never give up.
    #[must_use]
    pub const fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: Some(5),
            delay: Duration::from_secs(2),
        }
    }

    /// Whether `attempt` (1-based) is the last one allowed.
    #[must_use]
    pub fn is_last(&self, attempt: usize) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<usize>,
    delay: Duration,
}

impl RetryPolicyBuilder {
    /// Set maximum number of attempts (including the first).
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Retry forever.
    #[must_use]
    pub const fn unbounded(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    /// Set the delay between attempts.
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub const fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: self.delay,
        }
    }
}

/// Every allowed attempt failed.
#[derive(Error, Debug)]
#[error("{operation} failed after {attempts} attempts: {last_error}")]
pub struct RetryExhausted<E: fmt::Display> {
    /// Name of the operation being retried
    pub operation: String,
    /// Number of attempts made
    pub attempts: usize,
    /// Error from the final attempt
    pub last_error: E,
}

/// Run `operation` until it succeeds or the policy runs out of attempts.
///
/// The closure receives the 1-based attempt number. Every failed attempt is logged
/// with `attempt` and `max_attempts` fields; with an unbounded policy the returned
/// future only completes on success.
///
/// # Errors
///
/// Returns [`RetryExhausted`] with the last error once a bounded policy's attempts
/// are used up.
pub async fn retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                if policy.is_last(attempt) {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        max_attempts = ?policy.max_attempts,
                        error = %err,
                        "Operation failed after max attempts"
                    );
                    return Err(RetryExhausted {
                        operation: operation_name.to_string(),
                        attempts: attempt,
                        last_error: err,
                    });
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = ?policy.max_attempts,
                    delay_ms = policy.delay.as_millis(),
                    error = %err,
                    "Operation failed, retrying..."
                );

                sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
