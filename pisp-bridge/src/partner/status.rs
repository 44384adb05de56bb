//! Partner payment statuses and their reduction to canonical outcomes.

use serde::Deserialize;

use crate::{
    error::{BridgeError, Result},
    outcome::{CanonicalOutcome, Failure, FailureKind, OwnerRecord, ReceiverRecord, Reconciliation},
};

/// Message of the [`FailureKind::Cancel`] outcome.
pub const CANCELLED_MESSAGE: &str = "Payment not approved by PSU or insufficient funds";
/// Message of the [`FailureKind::SessionExpired`] outcome.
pub const EXPIRED_MESSAGE: &str = "Payment session expired";
/// Message of the [`FailureKind::Refused`] outcome for errored or unknown statuses.
pub const REJECTED_MESSAGE: &str = "Payment rejected by the bank";

/// Payment status as reported by the partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerPaymentStatus {
    /// Created, PSU not yet at the bank.
    Open,
    /// PSU authorised at the bank.
    Authorised,
    /// Settlement started.
    SettlementInProcess,
    /// Waiting on the bank.
    Pending,
    /// Funds transferred.
    SettlementCompleted,
    /// PSU cancelled or the bank declined.
    Cancelled,
    /// PSU never finished the bank flow.
    Expired,
    /// The bank reported an error.
    Error,
    /// Any value this bridge does not know.
    #[serde(other)]
    Unknown,
}

/// Body of `GET /payments/{id}/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    /// Partner payment identifier.
    #[serde(default)]
    pub payment_id: Option<String>,
    /// Current status. `None` when absent or `null`.
    #[serde(default)]
    pub status: Option<PartnerPaymentStatus>,
    /// Debtor account holder name.
    #[serde(default)]
    pub debtor_name: Option<String>,
    /// Debtor account reference, typically an IBAN.
    #[serde(default)]
    pub debtor_account: Option<String>,
    /// Debtor agent BIC.
    #[serde(default)]
    pub debtor_agent: Option<String>,
}

/// Reduces a status response to a canonical outcome.
///
/// Every outcome carries the partner payment id. For a settled payment the owner
/// record takes whatever debtor fields the partner supplied (missing ones become
/// `""`) and the receiver record takes `settlement_iban`.
///
/// # Errors
///
/// Returns [`BridgeError::PartnerUnknownError`] when the response has no status.
///
/// # Examples
///
/// ```
/// use pisp_bridge::{
///     outcome::CanonicalOutcome,
///     partner::{PartnerPaymentStatus, PaymentStatusResponse, reduce},
/// };
///
/// let response = PaymentStatusResponse {
///     payment_id: Some("pay-42".to_owned()),
///     status: Some(PartnerPaymentStatus::Open),
///     ..PaymentStatusResponse::default()
/// };
///
/// let outcome = reduce(&response, "DE89370400440532013000").unwrap();
/// assert!(matches!(outcome, CanonicalOutcome::Redirecting { .. }));
/// ```
pub fn reduce(response: &PaymentStatusResponse, settlement_iban: &str) -> Result<CanonicalOutcome> {
    let reconciliation =
        Reconciliation { payment_id: response.payment_id.clone(), end_to_end_id: None };

    let Some(status) = response.status else {
        return Err(BridgeError::PartnerUnknownError(format!(
            "status response for payment {} has no status",
            response.payment_id.as_deref().unwrap_or("<unknown>")
        )));
    };

    let outcome = match status {
        PartnerPaymentStatus::Open
        | PartnerPaymentStatus::Authorised
        | PartnerPaymentStatus::SettlementInProcess
        | PartnerPaymentStatus::Pending => {
            CanonicalOutcome::Redirecting { redirect_url: None, reconciliation }
        }
        PartnerPaymentStatus::SettlementCompleted => CanonicalOutcome::Success {
            owner: OwnerRecord {
                holder: response.debtor_name.clone().unwrap_or_default(),
                account_reference: response.debtor_account.clone().unwrap_or_default(),
                bic: response.debtor_agent.clone().unwrap_or_default(),
            },
            receiver: ReceiverRecord { iban: settlement_iban.to_owned() },
            reconciliation,
        },
        PartnerPaymentStatus::Cancelled => failure(FailureKind::Cancel, CANCELLED_MESSAGE, reconciliation),
        PartnerPaymentStatus::Expired => {
            failure(FailureKind::SessionExpired, EXPIRED_MESSAGE, reconciliation)
        }
        PartnerPaymentStatus::Error | PartnerPaymentStatus::Unknown => {
            failure(FailureKind::Refused, REJECTED_MESSAGE, reconciliation)
        }
    };

    tracing::debug!(?status, outcome = outcome.label(), "payment status reduced");
    Ok(outcome)
}

fn failure(kind: FailureKind, message: &str, reconciliation: Reconciliation) -> CanonicalOutcome {
    CanonicalOutcome::Failure { failure: Failure::new(kind, message), reconciliation }
}
