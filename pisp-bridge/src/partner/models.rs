//! Request and response bodies of the partner's business endpoints.
//!
//! Field naming on the wire is camelCase.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BridgeError, Result};

const MAX_END_TO_END_ID_LEN: usize = 35;
const MAX_REMITTANCE_LEN: usize = 140;

/// A payment the orchestrator asks the partner to initiate.
///
/// # Examples
///
/// ```
/// use pisp_bridge::partner::PaymentInitiation;
/// use rust_decimal::Decimal;
///
/// let payment = PaymentInitiation {
///     amount: Decimal::new(4990, 2),
///     currency: "EUR".to_owned(),
///     end_to_end_id: "order-1042".to_owned(),
///     remittance_information: "Order 1042".to_owned(),
///     redirect_url: "https://shop.example/return".to_owned(),
///     aspsp_id: None,
/// };
/// assert!(payment.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiation {
    /// Amount in major units, at most two decimal places.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Caller-assigned end-to-end identifier.
    pub end_to_end_id: String,
    /// Unstructured remittance text shown on the PSU's statement.
    pub remittance_information: String,
    /// Where the bank sends the PSU back after authorisation.
    pub redirect_url: String,
    /// Preselected ASPSP, if the PSU already chose their bank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspsp_id: Option<String>,
}

impl PaymentInitiation {
    /// Checks what the partner would otherwise reject.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidInput`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(invalid("amount must be positive"));
        }
        if self.amount.normalize().scale() > 2 {
            return Err(invalid("amount must have at most two decimal places"));
        }
        if self.currency.len() != 3 || !self.currency.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(invalid("currency must be a three-letter ISO 4217 code"));
        }
        if self.end_to_end_id.trim().is_empty() {
            return Err(invalid("end_to_end_id is required"));
        }
        if self.end_to_end_id.chars().count() > MAX_END_TO_END_ID_LEN {
            return Err(invalid("end_to_end_id exceeds 35 characters"));
        }
        if self.remittance_information.trim().is_empty() {
            return Err(invalid("remittance_information is required"));
        }
        if self.remittance_information.chars().count() > MAX_REMITTANCE_LEN {
            return Err(invalid("remittance_information exceeds 140 characters"));
        }
        let redirect = Url::parse(&self.redirect_url)
            .map_err(|e| invalid(&format!("redirect_url is not a valid URL: {e}")))?;
        if !matches!(redirect.scheme(), "http" | "https") {
            return Err(invalid("redirect_url must be an http(s) URL"));
        }
        Ok(())
    }

    /// Wire body for `POST /payments`, with the merchant account as creditor.
    #[must_use]
    pub fn to_request_body(&self, creditor_iban: &str) -> PaymentRequestBody {
        let mut amount = self.amount.round_dp(2);
        amount.rescale(2);

        PaymentRequestBody {
            instructed_amount: InstructedAmount {
                amount: amount.to_string(),
                currency: self.currency.clone(),
            },
            creditor_account: AccountReference { iban: creditor_iban.to_owned() },
            end_to_end_id: self.end_to_end_id.clone(),
            remittance_information_unstructured: self.remittance_information.clone(),
            redirect_url: self.redirect_url.clone(),
            aspsp_id: self.aspsp_id.clone(),
        }
    }
}

fn invalid(message: &str) -> BridgeError {
    BridgeError::InvalidInput(message.to_owned())
}

/// Amount and currency as the partner expects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructedAmount {
    /// Decimal amount with two fractional digits, e.g. `"49.90"`.
    pub amount: String,
    /// ISO 4217 currency code.
    pub currency: String,
}

/// Account reference on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountReference {
    /// IBAN.
    pub iban: String,
}

/// JSON body of `POST /payments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestBody {
    /// Amount to transfer.
    pub instructed_amount: InstructedAmount,
    /// Merchant settlement account.
    pub creditor_account: AccountReference,
    /// Caller-assigned end-to-end identifier.
    pub end_to_end_id: String,
    /// Remittance text.
    pub remittance_information_unstructured: String,
    /// PSU return URL.
    pub redirect_url: String,
    /// Preselected ASPSP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspsp_id: Option<String>,
}

/// Successful response of `POST /payments`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiationResponse {
    /// Partner payment identifier.
    #[serde(default)]
    pub payment_id: Option<String>,
    /// ASPSP URL the PSU must visit, if authorisation is needed.
    #[serde(default, alias = "scaRedirect")]
    pub redirect_url: Option<String>,
}

/// One entry of the partner's ASPSP directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aspsp {
    /// Partner identifier of the bank.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Bank BIC, when published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bic: Option<String>,
    /// ISO 3166 alpha-2 country code.
    pub country: String,
    /// Logo location, when published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

/// Validates an ISO 3166 alpha-2 country code for the ASPSP directory.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidInput`] unless `country` is two ASCII letters.
pub fn validate_country(country: &str) -> Result<String> {
    if country.len() == 2 && country.bytes().all(|b| b.is_ascii_alphabetic()) {
        Ok(country.to_ascii_uppercase())
    } else {
        Err(invalid("country must be a two-letter ISO 3166 code"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> PaymentInitiation {
        PaymentInitiation {
            amount: Decimal::new(4990, 2),
            currency: "EUR".to_owned(),
            end_to_end_id: "order-1042".to_owned(),
            remittance_information: "Order 1042".to_owned(),
            redirect_url: "https://shop.example/return".to_owned(),
            aspsp_id: None,
        }
    }

    #[test]
    fn test_valid_payment() {
        assert!(payment().validate().is_ok());
    }

    fn with(mutate: impl FnOnce(&mut PaymentInitiation)) -> PaymentInitiation {
        let mut p = payment();
        mutate(&mut p);
        p
    }

    #[test]
    fn test_invalid_payments() {
        let cases = [
            (with(|p| p.amount = Decimal::ZERO), "amount"),
            (with(|p| p.amount = Decimal::new(-100, 2)), "amount"),
            (with(|p| p.amount = Decimal::new(10001, 3)), "decimal places"),
            (with(|p| p.currency = "eur".to_owned()), "currency"),
            (with(|p| p.currency = "EURO".to_owned()), "currency"),
            (with(|p| p.end_to_end_id = " ".to_owned()), "end_to_end_id"),
            (with(|p| p.end_to_end_id = "x".repeat(36)), "end_to_end_id"),
            (with(|p| p.remittance_information = String::new()), "remittance_information"),
            (with(|p| p.redirect_url = "not a url".to_owned()), "redirect_url"),
            (with(|p| p.redirect_url = "ftp://shop.example".to_owned()), "redirect_url"),
        ];

        for (p, field) in cases {
            let err = p.validate().unwrap_err();
            assert!(
                matches!(err, BridgeError::InvalidInput(ref msg) if msg.contains(field)),
                "expected {field} error, got {err}"
            );
        }
    }

    #[test]
    fn test_whole_amount_has_two_decimals_on_wire() {
        let body = with(|p| p.amount = Decimal::from(50)).to_request_body("X");
        assert_eq!(body.instructed_amount.amount, "50.00");
    }

    #[test]
    fn test_trailing_zeros_are_not_extra_precision() {
        let mut p = payment();
        p.amount = Decimal::new(49_900, 3);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_request_body_wire_format() {
        let mut p = payment();
        p.aspsp_id = Some("bnp-fr".to_owned());
        let body = serde_json::to_value(p.to_request_body("FR7630006000011234567890189")).unwrap();

        assert_eq!(body["instructedAmount"]["amount"], "49.90");
        assert_eq!(body["instructedAmount"]["currency"], "EUR");
        assert_eq!(body["creditorAccount"]["iban"], "FR7630006000011234567890189");
        assert_eq!(body["endToEndId"], "order-1042");
        assert_eq!(body["remittanceInformationUnstructured"], "Order 1042");
        assert_eq!(body["redirectUrl"], "https://shop.example/return");
        assert_eq!(body["aspspId"], "bnp-fr");
    }

    #[test]
    fn test_request_body_omits_absent_aspsp() {
        let body = serde_json::to_value(payment().to_request_body("X")).unwrap();
        assert!(body.get("aspspId").is_none());
    }

    #[test]
    fn test_initiation_response_parsing() {
        let response: PaymentInitiationResponse = serde_json::from_str(
            r#"{"paymentId":"pay-1","redirectUrl":"https://bank.example/sca","extra":1}"#,
        )
        .unwrap();
        assert_eq!(response.payment_id.as_deref(), Some("pay-1"));
        assert_eq!(response.redirect_url.as_deref(), Some("https://bank.example/sca"));

        let response: PaymentInitiationResponse =
            serde_json::from_str(r#"{"paymentId":"pay-2"}"#).unwrap();
        assert_eq!(response.redirect_url, None);
    }

    #[test]
    fn test_aspsp_parsing() {
        let list: Vec<Aspsp> = serde_json::from_str(
            r#"[{"id":"bnp-fr","name":"BNP Paribas","bic":"BNPAFRPP","country":"FR"},
                {"id":"lcl","name":"LCL","country":"FR","logoUrl":"https://cdn.example/lcl.png"}]"#,
        )
        .unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].bic.as_deref(), Some("BNPAFRPP"));
        assert_eq!(list[1].logo_url.as_deref(), Some("https://cdn.example/lcl.png"));
    }

    #[test]
    fn test_validate_country() {
        assert_eq!(validate_country("fr").unwrap(), "FR");
        assert!(validate_country("FRA").is_err());
        assert!(validate_country("F1").is_err());
    }
}
