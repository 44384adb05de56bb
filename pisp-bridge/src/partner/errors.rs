//! Translation of the partner's error envelope into canonical failures.
//!
//! The partner encodes business meaning in opaque codes nested inside a uniform
//! `{code, message, details}` envelope, so classification is a lookup in a
//! (HTTP status, partner code) table rather than anything type-driven.

use serde::Deserialize;

use crate::{
    outcome::{Failure, FailureKind},
    transport::NormalizedResponse,
};

/// Error envelope returned on non-success business responses.
///
/// Every field is optional; an empty envelope is still a valid payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PartnerErrorPayload {
    /// Partner error code, e.g. `"119"`.
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Additional text, more actionable than `message` for a few 400 codes.
    #[serde(default)]
    pub details: Option<String>,
}

/// One row of the classification table. `codes: None` matches any code.
struct Rule {
    statuses: &'static [u16],
    codes: Option<&'static [&'static str]>,
    kind: FailureKind,
}

/// First matching row wins; no match means [`FailureKind::PartnerUnknownError`].
const RULES: &[Rule] = &[
    Rule { statuses: &[400], codes: Some(&["004", "005"]), kind: FailureKind::CommunicationError },
    Rule { statuses: &[400], codes: None, kind: FailureKind::InvalidData },
    Rule { statuses: &[401], codes: None, kind: FailureKind::CommunicationError },
    Rule { statuses: &[403], codes: Some(&["007", "008"]), kind: FailureKind::CommunicationError },
    Rule { statuses: &[403], codes: Some(&["119"]), kind: FailureKind::InvalidData },
    Rule { statuses: &[403], codes: Some(&["120"]), kind: FailureKind::Refused },
    Rule { statuses: &[404], codes: None, kind: FailureKind::InvalidData },
    Rule { statuses: &[405], codes: Some(&["121"]), kind: FailureKind::Refused },
    Rule { statuses: &[502, 503, 511], codes: None, kind: FailureKind::CommunicationError },
];

/// 400 codes whose `details` replace `message` as the user-visible text.
const DETAILS_CODES: &[&str] = &["001", "002", "133"];

/// Classifies an error response by HTTP status and partner code.
///
/// # Examples
///
/// ```
/// use pisp_bridge::{outcome::FailureKind, partner::classify};
///
/// assert_eq!(classify(403, Some("120")), FailureKind::Refused);
/// assert_eq!(classify(403, Some("999")), FailureKind::PartnerUnknownError);
/// assert_eq!(classify(404, None), FailureKind::InvalidData);
/// ```
#[must_use]
pub fn classify(status: u16, code: Option<&str>) -> FailureKind {
    RULES
        .iter()
        .find(|rule| {
            rule.statuses.contains(&status)
                && rule.codes.is_none_or(|codes| code.is_some_and(|c| codes.contains(&c)))
        })
        .map_or(FailureKind::PartnerUnknownError, |rule| rule.kind)
}

/// Translates a non-success response into a canonical failure.
///
/// A body that is not a [`PartnerErrorPayload`] gives
/// [`FailureKind::PartnerUnknownError`] with the status line as message.
///
/// # Examples
///
/// ```
/// use pisp_bridge::{outcome::FailureKind, partner::translate, transport::NormalizedResponse};
///
/// let response = NormalizedResponse {
///     status_code: 400,
///     status_message: "Bad Request".to_owned(),
///     body: r#"{"code":"133","message":"Invalid request","details":"IBAN checksum mismatch"}"#
///         .to_owned(),
///     headers: vec![],
/// };
///
/// let failure = translate(&response);
/// assert_eq!(failure.kind, FailureKind::InvalidData);
/// assert_eq!(failure.message, "IBAN checksum mismatch");
/// ```
#[must_use]
pub fn translate(response: &NormalizedResponse) -> Failure {
    let Ok(payload) = serde_json::from_str::<PartnerErrorPayload>(&response.body) else {
        tracing::warn!(status = response.status_code, "partner error body is not an error envelope");
        return Failure::new(FailureKind::PartnerUnknownError, response.status_line());
    };

    let code = payload.code.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let kind = classify(response.status_code, code);
    let message = message_for(response, &payload, code);

    tracing::info!(status = response.status_code, code, kind = %kind, "partner error translated");
    Failure::new(kind, message)
}

fn message_for(
    response: &NormalizedResponse,
    payload: &PartnerErrorPayload,
    code: Option<&str>,
) -> String {
    let non_empty = |text: &Option<String>| {
        text.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(str::to_owned)
    };

    let details = (response.status_code == 400 && code.is_some_and(|c| DETAILS_CODES.contains(&c)))
        .then(|| non_empty(&payload.details))
        .flatten();

    details.or_else(|| non_empty(&payload.message)).unwrap_or_else(|| response.status_line())
}
