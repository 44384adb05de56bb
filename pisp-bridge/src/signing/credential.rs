//! Signing identity: private key, client certificate chain and fingerprint.

use std::{fmt, path::Path};

use josekit::jws::{JwsSigner, RS256, alg::rsassa::RsassaJwsSigner};
use openssl::{hash::MessageDigest, x509::X509};
use zeroize::Zeroizing;

use crate::error::{BridgeError, Result};

/// Parsed private key and client certificate chain.
///
/// Built once per configuration and shared read-only (behind an `Arc`) by every
/// signer. The fingerprint is the SHA-1 digest of the leaf certificate's DER
/// encoding, as upper-case hex pairs joined by `:`.
///
/// # Examples
///
/// ```no_run
/// use pisp_bridge::signing::CredentialMaterial;
///
/// # fn example() -> pisp_bridge::Result<()> {
/// let key_pem = std::fs::read("certs/key.pem").unwrap();
/// let chain_pem = std::fs::read("certs/chain.pem").unwrap();
///
/// let credential = CredentialMaterial::from_pem(&key_pem, &chain_pem)?;
/// println!("fingerprint: {}", credential.fingerprint());
/// println!("key id:      {}", credential.key_id());
/// # Ok(())
/// # }
/// ```
pub struct CredentialMaterial {
    signer: RsassaJwsSigner,
    certificate_chain: Vec<X509>,
    fingerprint: String,
}

impl CredentialMaterial {
    /// Builds credential material from PEM-encoded inputs.
    ///
    /// `private_key_pem` may be PKCS#8 or traditional RSA PEM. `certificate_chain_pem`
    /// holds one or more certificates, leaf first.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::SigningError`] if the key or a certificate cannot be parsed,
    ///   or the fingerprint cannot be computed
    /// - [`BridgeError::ConfigurationError`] if the chain contains no certificate
    pub fn from_pem(private_key_pem: &[u8], certificate_chain_pem: &[u8]) -> Result<Self> {
        let signer = RS256
            .signer_from_pem(private_key_pem)
            .map_err(|e| BridgeError::SigningError(format!("unreadable private key: {e}")))?;

        let certificate_chain = X509::stack_from_pem(certificate_chain_pem)
            .map_err(|e| BridgeError::SigningError(format!("unreadable certificate chain: {e}")))?;

        let leaf = certificate_chain.first().ok_or_else(|| {
            BridgeError::ConfigurationError("certificate chain contains no certificate".to_owned())
        })?;

        let digest = leaf
            .digest(MessageDigest::sha1())
            .map_err(|e| BridgeError::SigningError(format!("fingerprint computation failed: {e}")))?;

        Ok(Self { signer, certificate_chain, fingerprint: format_fingerprint(&digest) })
    }

    /// Reads and parses credential material from PEM files.
    ///
    /// The private key bytes are zeroized once parsed.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigurationError`] if a file cannot be read, or any
    /// error of [`from_pem`](Self::from_pem).
    pub fn from_files(private_key_path: &Path, certificate_chain_path: &Path) -> Result<Self> {
        let key = Zeroizing::new(std::fs::read(private_key_path).map_err(|e| {
            BridgeError::ConfigurationError(format!(
                "cannot read private key {}: {e}",
                private_key_path.display()
            ))
        })?);
        let chain = std::fs::read(certificate_chain_path).map_err(|e| {
            BridgeError::ConfigurationError(format!(
                "cannot read certificate chain {}: {e}",
                certificate_chain_path.display()
            ))
        })?;

        Self::from_pem(&key, &chain)
    }

    /// Leaf certificate fingerprint, e.g. `"3A:F1:...:09"`.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Key identifier declared in signatures: the fingerprint without separators.
    #[must_use]
    pub fn key_id(&self) -> String {
        self.fingerprint.replace(':', "")
    }

    /// Certificate chain, leaf first.
    #[must_use]
    pub fn certificate_chain(&self) -> &[X509] {
        &self.certificate_chain
    }

    /// Signs `message` with RSASSA-PKCS1-v1_5 / SHA-256.
    pub(crate) fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.signer
            .sign(message)
            .map_err(|e| BridgeError::SigningError(format!("RSA-SHA256 signing failed: {e}")))
    }
}

impl fmt::Debug for CredentialMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialMaterial")
            .field("fingerprint", &self.fingerprint)
            .field("chain_len", &self.certificate_chain.len())
            .finish_non_exhaustive()
    }
}

fn format_fingerprint(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(":")
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, LazyLock};

    use openssl::{
        asn1::Asn1Time,
        bn::BigNum,
        hash::MessageDigest,
        pkey::PKey,
        rsa::Rsa,
        x509::{X509, X509NameBuilder},
    };

    use super::CredentialMaterial;

    /// Generated RSA identity shared by unit tests.
    pub(crate) struct TestIdentity {
        pub key_pem: Vec<u8>,
        pub public_pem: Vec<u8>,
        pub cert_pem: Vec<u8>,
        pub cert_der: Vec<u8>,
    }

    impl TestIdentity {
        pub(crate) fn credential(&self) -> Arc<CredentialMaterial> {
            Arc::new(CredentialMaterial::from_pem(&self.key_pem, &self.cert_pem).unwrap())
        }
    }

    pub(crate) static IDENTITY: LazyLock<TestIdentity> = LazyLock::new(|| generate("pisp-test"));

    pub(crate) fn generate(common_name: &str) -> TestIdentity {
        let pkey = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", common_name).unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&pkey).unwrap();
        let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
        builder.set_not_after(&Asn1Time::days_from_now(365).unwrap()).unwrap();
        builder.sign(&pkey, MessageDigest::sha256()).unwrap();
        let cert = builder.build();

        TestIdentity {
            key_pem: pkey.private_key_to_pem_pkcs8().unwrap(),
            public_pem: pkey.public_key_to_pem().unwrap(),
            cert_pem: cert.to_pem().unwrap(),
            cert_der: cert.to_der().unwrap(),
        }
    }
}
