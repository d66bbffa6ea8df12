//! Bounded exponential-backoff execution for calls to unreliable services.
//!
//! [`RetryExecutor::run`] takes the operation, a caller-supplied error
//! classifier and an optional deadline. Waits are async sleeps on the calling
//! task, so only the issuing request is delayed.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// How a failure should be treated by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Expected to succeed on a later attempt (timeout, 429, 5xx, network).
    Transient,
    /// Retrying cannot help (bad credentials, malformed request, 404).
    Permanent,
}

/// Backoff configuration. Built once from `AppConfig::retry_policy`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one; treated as at least 1.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt number `attempt` (1-based):
    /// `min(initial_delay * multiplier^(attempt-1), max_delay)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Failure returned by [`RetryExecutor::run`].
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Classified permanent; returned after the attempt that produced it.
    #[error("permanent failure: {0}")]
    Permanent(E),

    /// All attempts used, or the deadline left no room for another one.
    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Permanent(e) | RetryError::Exhausted { last: e, .. } => e,
        }
    }
}

/// Runs fallible async operations under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `op` until it succeeds, fails permanently, or the policy runs out.
    ///
    /// A further attempt is not scheduled when its backoff alone would carry
    /// past `deadline`; the last failure is returned as `Exhausted` instead.
    pub async fn run<T, E, F, Fut, C>(&self, deadline: Option<Instant>, classify: C, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> ErrorClass,
        E: Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if classify(&err) == ErrorClass::Permanent {
                tracing::debug!(attempt, error = %err, "permanent failure, not retrying");
                return Err(RetryError::Permanent(err));
            }

            if attempt >= max_attempts {
                tracing::error!(attempts = attempt, error = %err, "retries exhausted");
                return Err(RetryError::Exhausted { attempts: attempt, last: err });
            }

            let delay = self.policy.delay_for(attempt);
            if let Some(deadline) = deadline
                && Instant::now() + delay > deadline
            {
                tracing::warn!(attempt, ?delay, error = %err, "request deadline leaves no room for another attempt");
                return Err(RetryError::Exhausted { attempts: attempt, last: err });
            }

            tracing::warn!(attempt, max_attempts, ?delay, error = %err, "transient failure, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}
