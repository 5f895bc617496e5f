// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bounded retry policies.
//!
//! A policy decides, after each failed attempt, whether to try again and how
//! long to wait first. [`RetryPolicy::execute`] drives the loop: it returns
//! the first success immediately and the last error once the policy gives up.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use tagbridge_core::retry::{FixedDelay, RetryPolicy};
//! use tagbridge_core::BridgeError;
//!
//! # tokio_test_block_on(async {
//! let policy = FixedDelay::new(5, Duration::ZERO);
//! let mut calls = 0;
//! let result: Result<u32, BridgeError> = policy
//!     .execute(|| {
//!         calls += 1;
//!         let attempt = calls;
//!         async move {
//!             if attempt < 3 {
//!                 Err(BridgeError::disconnected("Disconnected"))
//!             } else {
//!                 Ok(attempt)
//!             }
//!         }
//!     })
//!     .await;
//! assert_eq!(result.unwrap(), 3);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(f)
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

// =============================================================================
// RetryDecision
// =============================================================================

/// Outcome of consulting a policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay.
    Retry(Duration),
    /// Give up and surface the error.
    DoNotRetry,
}

// =============================================================================
// RetryPolicy Trait
// =============================================================================

/// A retry policy for fallible async operations.
#[async_trait]
pub trait RetryPolicy: Send + Sync {
    /// Returns the policy name for logging.
    fn name(&self) -> &str;

    /// Decides whether attempt number `attempt` (1-based) should be followed by another.
    fn should_retry(&self, error: &BridgeError, attempt: u32) -> RetryDecision;

    /// Delay applied before the first attempt.
    fn initial_delay(&self) -> Option<Duration> {
        None
    }

    /// Runs `operation` until it succeeds or the policy gives up.
    async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, BridgeError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, BridgeError>> + Send,
        T: Send,
    {
        if let Some(delay) = self.initial_delay() {
            tokio::time::sleep(delay).await;
        }

        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => match self.should_retry(&error, attempt) {
                    RetryDecision::Retry(delay) => {
                        tracing::debug!(
                            policy = %self.name(),
                            attempt = attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Retrying operation"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry => return Err(error),
                },
            }
        }
    }
}

// =============================================================================
// NoRetry
// =============================================================================

/// Runs the operation exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

#[async_trait]
impl RetryPolicy for NoRetry {
    fn name(&self) -> &str {
        "no_retry"
    }

    fn should_retry(&self, _error: &BridgeError, _attempt: u32) -> RetryDecision {
        RetryDecision::DoNotRetry
    }
}

// =============================================================================
// FixedDelay
// =============================================================================

/// A fixed attempt budget with a constant wait between attempts.
///
/// Non-retryable errors end the loop early regardless of the remaining budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedDelay {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Wait between attempts.
    #[serde(with = "duration_millis")]
    pub delay: Duration,

    /// Also wait before the first attempt.
    #[serde(default)]
    pub delay_first: bool,
}

impl FixedDelay {
    /// Creates a fixed delay policy.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            delay_first: false,
        }
    }

    /// Waits `delay` before every attempt, the first included.
    pub fn delay_first(mut self, enabled: bool) -> Self {
        self.delay_first = enabled;
        self
    }
}

#[async_trait]
impl RetryPolicy for FixedDelay {
    fn name(&self) -> &str {
        "fixed_delay"
    }

    fn should_retry(&self, error: &BridgeError, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts || !error.is_retryable() {
            return RetryDecision::DoNotRetry;
        }
        RetryDecision::Retry(self.delay)
    }

    fn initial_delay(&self) -> Option<Duration> {
        self.delay_first.then_some(self.delay)
    }
}

// =============================================================================
// Serde Helpers
// =============================================================================

/// Serializes a `Duration` as integer milliseconds.
pub mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes a duration as milliseconds.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    /// Deserializes a duration from milliseconds.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_fixed_delay_decisions() {
        let policy = FixedDelay::new(5, Duration::from_millis(250));
        let transient = BridgeError::disconnected("Disconnected");

        assert_eq!(
            policy.should_retry(&transient, 1),
            RetryDecision::Retry(Duration::from_millis(250))
        );
        assert_eq!(
            policy.should_retry(&transient, 4),
            RetryDecision::Retry(Duration::from_millis(250))
        );
        assert_eq!(policy.should_retry(&transient, 5), RetryDecision::DoNotRetry);

        let fatal = BridgeError::config("Server");
        assert_eq!(policy.should_retry(&fatal, 1), RetryDecision::DoNotRetry);
    }

    #[tokio::test]
    async fn test_execute_exits_on_first_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = FixedDelay::new(5, Duration::ZERO);

        let counter = calls.clone();
        let result = policy
            .execute(|| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 3 {
                        Ok(n)
                    } else {
                        Err(BridgeError::disconnected("Disconnected"))
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_exhausts_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = FixedDelay::new(5, Duration::ZERO);

        let counter = calls.clone();
        let result: Result<(), BridgeError> = policy
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(BridgeError::disconnected("Disconnected")) }
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_first_waits_before_each_attempt() {
        let policy = FixedDelay::new(3, Duration::from_secs(1)).delay_first(true);
        let start = tokio::time::Instant::now();

        let result: Result<(), BridgeError> = policy
            .execute(|| async { Err(BridgeError::disconnected("Disconnected")) })
            .await;

        assert!(result.is_err());
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_no_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), BridgeError> = NoRetry
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(BridgeError::disconnected("Disconnected")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fixed_delay_serde() {
        let policy: FixedDelay =
            serde_json::from_str(r#"{"max_attempts": 5, "delay": 1000}"#).unwrap();
        assert_eq!(policy.delay, Duration::from_secs(1));
        assert!(!policy.delay_first);
    }
}
