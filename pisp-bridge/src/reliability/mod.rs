//! Reliability patterns for partner API calls.
//!
//! Provides the bounded retry loop the transport wraps around every attempt.

mod retry;

pub use retry::{Backoff, RetryPolicy, is_retryable, retry_with_backoff};
