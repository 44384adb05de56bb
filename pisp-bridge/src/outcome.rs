//! Canonical payment outcomes.
//!
//! This is the only vocabulary the bridge exposes to the payment orchestrator.
//! Partner status enums and error codes are translated into these types by
//! [`partner::status`](crate::partner::status) and
//! [`partner::errors`](crate::partner::errors).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Canonical failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request data was rejected by the partner.
    InvalidData,
    /// The partner or the bank refused the payment.
    Refused,
    /// The partner could not be reached or rejected our credentials.
    CommunicationError,
    /// The PSU cancelled, or the bank declined for lack of funds.
    Cancel,
    /// The PSU did not finish the bank flow in time.
    SessionExpired,
    /// The partner answered with something outside the known contract.
    PartnerUnknownError,
    /// Unexpected defect inside the bridge.
    InternalError,
}

impl FailureKind {
    /// Returns the stable string form used in logs and serialised outcomes.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidData => "invalid_data",
            Self::Refused => "refused",
            Self::CommunicationError => "communication_error",
            Self::Cancel => "cancel",
            Self::SessionExpired => "session_expired",
            Self::PartnerUnknownError => "partner_unknown_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure kind with its human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Canonical classification.
    pub kind: FailureKind,
    /// Message suitable for display to an operator or end user.
    pub message: String,
}

impl Failure {
    /// Creates a failure.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for constructors"
    )]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Identifiers needed to re-resolve a payment later.
///
/// Serialised into an opaque blob that the orchestrator stores and hands back on
/// later status queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Partner-assigned payment identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    /// Caller-assigned end-to-end identifier, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_to_end_id: Option<String>,
}

impl Reconciliation {
    /// Reconciliation data for a known partner payment id.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for constructors"
    )]
    pub fn for_payment(payment_id: impl Into<String>) -> Self {
        Self { payment_id: Some(payment_id.into()), end_to_end_id: None }
    }

    /// Serialises the reconciliation data into an opaque blob.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Internal`] if serialisation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use pisp_bridge::outcome::Reconciliation;
    ///
    /// let blob = Reconciliation::for_payment("pay-42").to_blob().unwrap();
    /// let back = Reconciliation::from_blob(&blob).unwrap();
    /// assert_eq!(back.payment_id.as_deref(), Some("pay-42"));
    /// ```
    pub fn to_blob(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| BridgeError::Internal(format!("reconciliation serialisation failed: {e}")))
    }

    /// Parses a blob produced by [`to_blob`](Self::to_blob).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidInput`] if the blob is not valid reconciliation data.
    pub fn from_blob(blob: &str) -> Result<Self> {
        serde_json::from_str(blob)
            .map_err(|e| BridgeError::InvalidInput(format!("invalid reconciliation blob: {e}")))
    }
}

/// Debtor account data reported by the partner for a settled payment.
///
/// Unsupplied fields are empty strings, never absent: the consuming layer rejects nulls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    /// Account holder name.
    pub holder: String,
    /// Debtor account reference (typically an IBAN).
    pub account_reference: String,
    /// Debtor agent BIC.
    pub bic: String,
}

/// Creditor account data, taken from the merchant's settlement configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverRecord {
    /// Merchant settlement IBAN.
    pub iban: String,
}

/// Result of a payment operation in the bridge's stable vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CanonicalOutcome {
    /// Accepted by the partner, nothing for the PSU to do yet.
    Pending {
        /// Reconciliation data.
        reconciliation: Reconciliation,
    },
    /// Waiting on the PSU at their bank (on hold).
    Redirecting {
        /// ASPSP URL the PSU must visit, when the partner supplied one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        redirect_url: Option<String>,
        /// Reconciliation data.
        reconciliation: Reconciliation,
    },
    /// Settled.
    Success {
        /// Debtor side of the transfer.
        owner: OwnerRecord,
        /// Creditor side of the transfer.
        receiver: ReceiverRecord,
        /// Reconciliation data.
        reconciliation: Reconciliation,
    },
    /// Terminal failure.
    Failure {
        /// Kind and message.
        failure: Failure,
        /// Reconciliation data.
        reconciliation: Reconciliation,
    },
}

impl CanonicalOutcome {
    /// Reconciliation data carried by every outcome.
    #[must_use]
    pub const fn reconciliation(&self) -> &Reconciliation {
        match self {
            Self::Pending { reconciliation }
            | Self::Redirecting { reconciliation, .. }
            | Self::Success { reconciliation, .. }
            | Self::Failure { reconciliation, .. } => reconciliation,
        }
    }

    /// Failure kind, for failure outcomes.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failure { failure, .. } => Some(failure.kind),
            _ => None,
        }
    }

    /// Whether later status polls can still change this outcome.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failure { .. })
    }

    /// Short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending { .. } => "pending",
            Self::Redirecting { .. } => "redirecting",
            Self::Success { .. } => "success",
            Self::Failure { .. } => "failure",
        }
    }
}
