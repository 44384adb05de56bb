//! Bounded retry of failed partner calls.
//!
//! Partner calls are retried immediately: [`RetryPolicy::default`] uses
//! [`Backoff::Immediate`]. [`Backoff::Exponential`] exists for deployments that
//! agree a slower retry rate with the partner.

use std::time::Duration;

use crate::BridgeError;

/// Wait between two attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Retry at once.
    Immediate,
    /// `initial * multiplier^n` before retry `n` (zero-based), capped at `max`.
    Exponential {
        /// Wait before the first retry.
        initial: Duration,
        /// Upper bound for any single wait.
        max: Duration,
        /// Growth factor per retry.
        multiplier: f64,
    },
}

impl Backoff {
    /// Wait before retry number `retry` (zero-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use pisp_bridge::reliability::Backoff;
    ///
    /// let backoff = Backoff::Exponential {
    ///     initial: Duration::from_millis(100),
    ///     max: Duration::from_millis(300),
    ///     multiplier: 2.0,
    /// };
    /// assert_eq!(backoff.delay(1), Duration::from_millis(200));
    /// assert_eq!(backoff.delay(4), Duration::from_millis(300));
    /// assert_eq!(Backoff::Immediate.delay(4), Duration::ZERO);
    /// ```
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "nanosecond delays stay far below 2^52 and are capped at max"
    )]
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Self::Immediate => Duration::ZERO,
            Self::Exponential { initial, max, multiplier } => {
                let factor = multiplier.powi(i32::try_from(retry).unwrap_or(i32::MAX));
                let nanos = initial.as_nanos() as f64 * factor;
                if !nanos.is_finite() || nanos >= max.as_nanos() as f64 {
                    max
                } else {
                    Duration::from_nanos(nanos.round() as u64)
                }
            }
        }
    }
}

/// How many times a partner call is attempted and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Wait between attempts.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, backoff: Backoff::Immediate }
    }
}

impl RetryPolicy {
    /// Immediate-retry policy with `max_attempts` total attempts.
    ///
    /// # Examples
    ///
    /// ```
    /// use pisp_bridge::reliability::{Backoff, RetryPolicy};
    ///
    /// let policy = RetryPolicy::with_max_attempts(5);
    /// assert_eq!(policy.max_attempts, 5);
    /// assert_eq!(policy.backoff, Backoff::Immediate);
    /// ```
    #[must_use]
    pub const fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts, backoff: Backoff::Immediate }
    }
}

/// Runs `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or `policy.max_attempts` attempts have been made.
///
/// At least one attempt is always made. The last error is returned unchanged.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// use pisp_bridge::reliability::{RetryPolicy, retry_with_backoff};
///
/// # async fn example() {
/// let calls = AtomicU32::new(0);
/// let counter = &calls;
/// let result = retry_with_backoff(&RetryPolicy::default(), |_: &String| true, || async move {
///     match counter.fetch_add(1, Ordering::Relaxed) {
///         0 => Err("connection reset".to_owned()),
///         _ => Ok("200 OK"),
///     }
/// })
/// .await;
///
/// assert_eq!(result, Ok("200 OK"));
/// assert_eq!(calls.load(Ordering::Relaxed), 2);
/// # }
/// ```
///
/// # Errors
///
/// Returns the error of the last attempt.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0_u32;

    loop {
        attempt += 1;
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "partner call succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        let retryable = should_retry(&error);
        tracing::warn!(attempt, max_attempts, retryable, error = %error, "partner call attempt failed");
        if !retryable || attempt >= max_attempts {
            return Err(error);
        }

        let delay = policy.backoff.delay(attempt - 1);
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis(), "waiting before retry");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Whether `error` is worth another attempt.
///
/// Only [`BridgeError::HttpError`], an attempt that got no response at all, is
/// retried. Partner rejections arrive as responses and never reach this check.
///
/// # Examples
///
/// ```
/// use pisp_bridge::{BridgeError, reliability::is_retryable};
///
/// assert!(!is_retryable(&BridgeError::AuthError("invalid_client".to_owned())));
/// assert!(!is_retryable(&BridgeError::TransportError("gave up".to_owned())));
/// ```
#[must_use]
pub const fn is_retryable(error: &BridgeError) -> bool {
    matches!(error, BridgeError::HttpError(_))
}
