//! HTTP message signatures over a fixed, ordered set of request headers.

use std::sync::Arc;

use base64::Engine;
use tracing::instrument;

use crate::{
    error::{BridgeError, Result},
    signing::CredentialMaterial,
};

/// Header names covered by every signature, in signing order.
pub const SIGNED_HEADERS: [&str; 4] = ["app", "client", "id", "date"];

/// Signature algorithm declared in the `Authorization` header.
pub const SIGNATURE_ALGORITHM: &str = "rsa-sha256";

/// A request's signed header set.
///
/// Built per outbound request and consumed immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaderSet {
    /// HTTP method.
    pub method: String,
    /// Target URI.
    pub uri: String,
    /// Headers, in insertion order.
    pub headers: Vec<(String, String)>,
    /// `Signature ...` value for the `Authorization` header.
    pub signature: String,
}

/// Produces `Signature` authorization values with the configured credential.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use pisp_bridge::signing::{CredentialMaterial, RequestSigner};
///
/// # fn example(credential: Arc<CredentialMaterial>) -> pisp_bridge::Result<()> {
/// let signer = RequestSigner::new(credential);
/// let headers = vec![
///     ("app".to_owned(), "PIS".to_owned()),
///     ("client".to_owned(), "acme-shop".to_owned()),
///     ("id".to_owned(), "0f1e2d3c".to_owned()),
///     ("date".to_owned(), "Tue, 15 Oct 2024 08:12:31 GMT".to_owned()),
/// ];
///
/// let value = signer.sign("POST", "https://partner.example/authorize/token", &headers)?;
/// assert!(value.starts_with("Signature keyId="));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credential: Arc<CredentialMaterial>,
}

impl RequestSigner {
    /// Creates a signer over shared credential material.
    #[must_use]
    pub const fn new(credential: Arc<CredentialMaterial>) -> Self {
        Self { credential }
    }

    /// The credential this signer uses.
    #[must_use]
    pub fn credential(&self) -> &CredentialMaterial {
        &self.credential
    }

    /// Signs the required headers and returns the `Authorization` header value.
    ///
    /// The output has the form
    /// `Signature keyId="<kid>",algorithm="rsa-sha256",headers="app client id date",signature="<b64>"`.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ConfigurationError`] if a required header is missing
    /// - [`BridgeError::SigningError`] if the RSA operation fails
    #[instrument(skip(self, headers), fields(key_id = tracing::field::Empty))]
    pub fn sign(&self, method: &str, uri: &str, headers: &[(String, String)]) -> Result<String> {
        let signing_string = canonical_string(headers)?;
        let key_id = self.credential.key_id();
        tracing::Span::current().record("key_id", key_id.as_str());

        let raw = self.credential.sign(signing_string.as_bytes())?;
        let signature = base64::engine::general_purpose::STANDARD.encode(raw);

        tracing::debug!(signed_headers = SIGNED_HEADERS.len(), "request signed");

        Ok(format!(
            "Signature keyId=\"{key_id}\",algorithm=\"{SIGNATURE_ALGORITHM}\",headers=\"{}\",signature=\"{signature}\"",
            SIGNED_HEADERS.join(" ")
        ))
    }

    /// Signs the headers and packages them with the signature.
    ///
    /// # Errors
    ///
    /// Same as [`sign`](Self::sign).
    pub fn build_signed_headers(
        &self,
        method: &str,
        uri: &str,
        headers: Vec<(String, String)>,
    ) -> Result<SignedHeaderSet> {
        let signature = self.sign(method, uri, &headers)?;
        Ok(SignedHeaderSet { method: method.to_owned(), uri: uri.to_owned(), headers, signature })
    }
}

/// Builds the string to sign from a header set.
///
/// One `"<lowercased-name>: <value>"` line per entry of [`SIGNED_HEADERS`], in that
/// order, joined by `\n` without a trailing newline. Header lookup ignores case.
///
/// # Errors
///
/// Returns [`BridgeError::ConfigurationError`] naming the first missing header.
///
/// # Examples
///
/// ```
/// use pisp_bridge::signing::canonical_string;
///
/// let headers = vec![
///     ("Date".to_owned(), "Tue, 15 Oct 2024 08:12:31 GMT".to_owned()),
///     ("App".to_owned(), "PIS".to_owned()),
///     ("Client".to_owned(), "acme".to_owned()),
///     ("Id".to_owned(), "42".to_owned()),
/// ];
///
/// assert_eq!(
///     canonical_string(&headers).unwrap(),
///     "app: PIS\nclient: acme\nid: 42\ndate: Tue, 15 Oct 2024 08:12:31 GMT"
/// );
/// ```
pub fn canonical_string(headers: &[(String, String)]) -> Result<String> {
    let lines = SIGNED_HEADERS
        .iter()
        .map(|name| {
            header_value(headers, name).map(|value| format!("{name}: {value}")).ok_or_else(|| {
                BridgeError::ConfigurationError(format!("required signing header '{name}' is missing"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(lines.join("\n"))
}

fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
}
