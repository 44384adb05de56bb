//! Request signing for the partner's token endpoint.
//!
//! The partner authenticates grant requests with an HTTP message signature: an
//! RSA-SHA256 signature over a fixed, ordered subset of request headers, keyed by
//! the fingerprint of a registered client certificate.
//!
//! - [`CredentialMaterial`]: private key, certificate chain and fingerprint
//! - [`RequestSigner`]: canonical signing string and `Authorization` value

pub mod credential;
pub mod signer;

pub use credential::CredentialMaterial;
pub use signer::{
    RequestSigner, SIGNATURE_ALGORITHM, SIGNED_HEADERS, SignedHeaderSet, canonical_string,
};
