//! Bridge configuration loaded from TOML.
//!
//! Every value the core needs is required: a missing or invalid one fails with
//! [`BridgeError::ConfigurationError`] before any network call is attempted.
//!
//! # Examples
//!
//! ```toml
//! base_url = "https://api.partner.example"
//! retries = 3
//! verbose = false
//! settlement_iban = "DE89370400440532013000"
//!
//! [timeouts]
//! connect_secs = 10
//! read_secs = 30
//! overall_secs = 60
//!
//! [identity]
//! client_name = "acme-shop"
//! onboarding_id = "0f1e2d3c"
//! certificate_chain_path = "certs/chain.pem"
//! private_key_path = "certs/key.pem"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::{
    auth::ClientIdentity,
    error::{BridgeError, Result},
    signing::CredentialMaterial,
    transport::TimeoutConfig,
};

/// Signing identity registered with the partner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Registered client name.
    pub client_name: String,
    /// Onboarding identifier issued by the partner.
    pub onboarding_id: String,
    /// PEM file with the client certificate chain, leaf first.
    pub certificate_chain_path: PathBuf,
    /// PEM file with the RSA private key.
    pub private_key_path: PathBuf,
}

/// Complete bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Partner API base URL.
    pub base_url: String,
    /// Total attempts per partner call, at least 1.
    pub retries: u32,
    /// Log request and response bodies at debug level.
    #[serde(default)]
    pub verbose: bool,
    /// Merchant settlement IBAN, reported as receiver of settled payments.
    pub settlement_iban: String,
    /// Per-call timeouts.
    pub timeouts: TimeoutConfig,
    /// Signing identity.
    pub identity: IdentityConfig,
}

impl BridgeConfig {
    /// Parses and validates a TOML document.
    ///
    /// Relative credential paths are kept as written.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigurationError`] for malformed TOML, a missing
    /// key, or any value [`validate`](Self::validate) rejects.
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| BridgeError::ConfigurationError(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// Relative credential paths are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigurationError`] if the file cannot be read, or any
    /// error of [`from_toml`](Self::from_toml).
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::ConfigurationError(format!("cannot read {}: {e}", path.display()))
        })?;

        let mut config = Self::from_toml(&source)?;
        if let Some(dir) = path.parent() {
            config.identity.certificate_chain_path =
                dir.join(&config.identity.certificate_chain_path);
            config.identity.private_key_path = dir.join(&config.identity.private_key_path);
        }

        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Checks every required value.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigurationError`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;

        if self.retries == 0 {
            return Err(BridgeError::ConfigurationError("retries must be at least 1".to_owned()));
        }

        for (key, value) in [
            ("settlement_iban", self.settlement_iban.as_str()),
            ("identity.client_name", self.identity.client_name.as_str()),
            ("identity.onboarding_id", self.identity.onboarding_id.as_str()),
        ] {
            if value.trim().is_empty() {
                return Err(BridgeError::ConfigurationError(format!("{key} is required")));
            }
        }

        // Both identity values travel as header values on every token grant.
        for (key, value) in [
            ("identity.client_name", self.identity.client_name.as_str()),
            ("identity.onboarding_id", self.identity.onboarding_id.as_str()),
        ] {
            if !is_header_safe(value) {
                return Err(BridgeError::ConfigurationError(format!(
                    "{key} must contain only printable ASCII characters"
                )));
            }
        }

        for (key, value) in [
            ("identity.certificate_chain_path", &self.identity.certificate_chain_path),
            ("identity.private_key_path", &self.identity.private_key_path),
        ] {
            if value.as_os_str().is_empty() {
                return Err(BridgeError::ConfigurationError(format!("{key} is required")));
            }
        }

        self.timeouts.validate()
    }

    /// Parsed partner base URL.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigurationError`] unless `base_url` is an absolute
    /// http(s) URL.
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(self.base_url.trim()).map_err(|e| {
            BridgeError::ConfigurationError(format!("base_url is not a valid URL: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(BridgeError::ConfigurationError(
                "base_url must be an http(s) URL".to_owned(),
            ));
        }
        Ok(url)
    }

    /// Identity declared in token grants.
    #[must_use]
    pub fn client_identity(&self) -> ClientIdentity {
        ClientIdentity {
            client_name: self.identity.client_name.clone(),
            onboarding_id: self.identity.onboarding_id.clone(),
        }
    }

    /// Reads the private key and certificate chain.
    ///
    /// # Errors
    ///
    /// See [`CredentialMaterial::from_files`].
    pub fn load_credentials(&self) -> Result<CredentialMaterial> {
        CredentialMaterial::from_files(
            &self.identity.private_key_path,
            &self.identity.certificate_chain_path,
        )
    }
}

/// Visible ASCII plus space and tab.
fn is_header_safe(value: &str) -> bool {
    value.bytes().all(|b| b == b'\t' || (b' '..=b'~').contains(&b))
}
