//! Error types for the PISP bridge.
//!
//! Every fallible operation in this crate returns [`Result<T>`], whose error type
//! is [`BridgeError`]. The variants form a closed taxonomy: callers either get a
//! [`CanonicalOutcome`](crate::outcome::CanonicalOutcome) or one of these typed
//! failures, never a raw transport or parse error.
//!
//! # Error Categories
//!
//! - **Setup** ([`BridgeError::ConfigurationError`]): missing or invalid configuration,
//!   raised before any network call
//! - **Cryptography** ([`BridgeError::SigningError`]): the grant request could not be signed
//! - **Network** ([`BridgeError::HttpError`], [`BridgeError::TransportError`]): a single
//!   failed attempt, and retries exhausted
//! - **Authorization** ([`BridgeError::AuthError`], [`BridgeError::UnknownAuthError`]):
//!   the client-credentials grant was rejected or malformed
//! - **Partner protocol** ([`BridgeError::PartnerUnknownError`]): a response the bridge
//!   refuses to interpret
//!
//! # Examples
//!
//! ```
//! use pisp_bridge::{
//!     error::{BridgeError, Result},
//!     outcome::FailureKind,
//! };
//!
//! fn require_client_name(name: &str) -> Result<&str> {
//!     if name.is_empty() {
//!         return Err(BridgeError::ConfigurationError("client_name is required".to_owned()));
//!     }
//!     Ok(name)
//! }
//!
//! let err = require_client_name("").unwrap_err();
//! assert_eq!(err.failure_kind(), FailureKind::InternalError);
//! ```

use thiserror::Error;

use crate::outcome::{CanonicalOutcome, Failure, FailureKind, Reconciliation};

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in the PISP bridge.
///
/// # Error Recovery
///
/// - **Retryable** ([`HttpError`](Self::HttpError)): retried by the transport itself;
///   it only escapes the transport wrapped in [`TransportError`](Self::TransportError)
/// - **Fatal to the operation**: everything else. Nothing above the transport retries
///   automatically.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Missing or invalid setup.
    ///
    /// Raised for absent configuration values, unreadable credential files, a zero
    /// retry count, or a signing precondition (a required header missing from the
    /// header set). Never retried.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Cryptographic failure while producing a request signature.
    ///
    /// Never retried.
    #[error("request signing failed: {0}")]
    SigningError(String),

    /// A single HTTP attempt failed before a response was obtained.
    ///
    /// Wraps [`reqwest::Error`] for connection refusals, DNS failures, timeouts and
    /// body read errors. This is the only retryable variant.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// No response could be obtained from the partner after every attempt.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The client-credentials grant was rejected or its response was malformed.
    ///
    /// Carries the partner's `error_description` when it supplied one.
    #[error("authorization failed: {0}")]
    AuthError(String),

    /// The grant was rejected without a recognisable error object.
    #[error("authorization failed with HTTP {status} and no error description")]
    UnknownAuthError {
        /// HTTP status of the rejected grant.
        status: u16,
    },

    /// Caller-supplied request data cannot be sent to the partner.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The partner answered with something the bridge refuses to interpret,
    /// such as a status response without a status.
    #[error("unrecognised partner response: {0}")]
    PartnerUnknownError(String),

    /// Unexpected defect caught at an entry-point boundary.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Maps the error onto the canonical failure vocabulary.
    ///
    /// # Examples
    ///
    /// ```
    /// use pisp_bridge::{BridgeError, outcome::FailureKind};
    ///
    /// let err = BridgeError::TransportError("failed to contact the partner API".to_owned());
    /// assert_eq!(err.failure_kind(), FailureKind::CommunicationError);
    /// ```
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::HttpError(_)
            | Self::TransportError(_)
            | Self::AuthError(_)
            | Self::UnknownAuthError { .. } => FailureKind::CommunicationError,
            Self::InvalidInput(_) => FailureKind::InvalidData,
            Self::PartnerUnknownError(_) => FailureKind::PartnerUnknownError,
            Self::ConfigurationError(_) | Self::SigningError(_) | Self::Internal(_) => {
                FailureKind::InternalError
            }
        }
    }

    /// Converts the error into a failure outcome for callers that only speak
    /// [`CanonicalOutcome`].
    pub fn into_outcome(self, reconciliation: Reconciliation) -> CanonicalOutcome {
        CanonicalOutcome::Failure {
            failure: Failure::new(self.failure_kind(), self.to_string()),
            reconciliation,
        }
    }
}
