//! Partner API contract: wire models, error envelope and payment statuses.
//!
//! Everything partner-specific lives here. The rest of the crate only sees
//! [`Failure`](crate::outcome::Failure) and
//! [`CanonicalOutcome`](crate::outcome::CanonicalOutcome).

use url::Url;

use crate::error::{BridgeError, Result};

pub mod errors;
pub mod models;
pub mod status;

pub use errors::{PartnerErrorPayload, classify, translate};
pub use models::{
    Aspsp, PaymentInitiation, PaymentInitiationResponse, PaymentRequestBody, validate_country,
};
pub use status::{PartnerPaymentStatus, PaymentStatusResponse, reduce};

/// Appends path segments to the partner base URL.
///
/// Segments are percent-encoded, so caller-supplied identifiers cannot change
/// the path structure.
///
/// # Errors
///
/// Returns [`BridgeError::ConfigurationError`] if `base` cannot carry a path.
///
/// # Examples
///
/// ```
/// use pisp_bridge::partner::endpoint;
///
/// let base = "https://api.partner.example/v1/".parse().unwrap();
/// let url = endpoint(&base, &["payments", "a/b", "status"]).unwrap();
/// assert_eq!(url.as_str(), "https://api.partner.example/v1/payments/a%2Fb/status");
/// ```
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| {
            BridgeError::ConfigurationError(format!("base_url cannot carry a path: {base}"))
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
