//! Redaction helpers used before anything is logged.

/// Replacement text for secret material.
pub const MASK: &str = "********";

/// Masks the credentials of an `Authorization` header value, keeping the scheme.
///
/// # Examples
///
/// ```
/// use pisp_bridge::security::redact_authorization;
///
/// assert_eq!(redact_authorization("Bearer abc.def.ghi"), "Bearer ********");
/// assert_eq!(
///     redact_authorization("Signature keyId=\"AB12\",signature=\"xyz\""),
///     "Signature ********"
/// );
/// assert_eq!(redact_authorization("opaque"), "********");
/// ```
#[must_use]
pub fn redact_authorization(value: &str) -> String {
    match value.trim_start().split_once(' ') {
        Some((scheme, _)) if !scheme.is_empty() => format!("{scheme} {MASK}"),
        _ => MASK.to_owned(),
    }
}

/// Returns a copy of `headers` that is safe to log.
///
/// Only `Authorization` (any case) is rewritten.
#[must_use]
pub fn redact_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            if name.eq_ignore_ascii_case("authorization") {
                (name.clone(), redact_authorization(value))
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}

/// Masks all but the last four characters of an account reference.
///
/// # Examples
///
/// ```
/// use pisp_bridge::security::redact_account_reference;
///
/// assert_eq!(redact_account_reference("FR7630006000011234567890189"), "***********************0189");
/// assert_eq!(redact_account_reference("1234"), "1234");
/// assert_eq!(redact_account_reference(""), "");
/// ```
#[must_use]
pub fn redact_account_reference(reference: &str) -> String {
    let len = reference.chars().count();
    if len <= 4 {
        return reference.to_owned();
    }

    let visible: String = reference.chars().skip(len - 4).collect();
    format!("{}{visible}", "*".repeat(len - 4))
}
