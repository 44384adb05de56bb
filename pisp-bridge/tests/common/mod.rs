//! Shared fixtures for integration tests: a throwaway signing identity on disk
//! and a configuration pointing at a mock partner.

#![allow(dead_code, reason = "not every test binary uses every fixture")]

use std::path::Path;

use openssl::{
    asn1::Asn1Time,
    bn::BigNum,
    hash::MessageDigest,
    pkey::PKey,
    rsa::Rsa,
    x509::{X509, X509NameBuilder},
};
use pisp_bridge::BridgeConfig;
use tempfile::TempDir;

pub const SETTLEMENT_IBAN: &str = "FR7630006000011234567890189";
pub const CLIENT_NAME: &str = "acme-shop";
pub const ONBOARDING_ID: &str = "0f1e2d3c";

/// Credentials written to a temporary directory, removed on drop.
pub struct Fixture {
    pub dir: TempDir,
    pub public_pem: Vec<u8>,
    pub cert_der: Vec<u8>,
}

impl Fixture {
    /// Generates an RSA key and a self-signed certificate and writes both as PEM.
    pub fn new() -> Self {
        let pkey = PKey::from_rsa(Rsa::generate(2048).expect("rsa keygen")).expect("pkey");

        let mut name = X509NameBuilder::new().expect("name builder");
        name.append_entry_by_text("CN", CLIENT_NAME).expect("cn");
        let name = name.build();

        let mut builder = X509::builder().expect("x509 builder");
        builder.set_version(2).expect("version");
        builder.set_subject_name(&name).expect("subject");
        builder.set_issuer_name(&name).expect("issuer");
        builder.set_pubkey(&pkey).expect("pubkey");
        let serial = BigNum::from_u32(7).and_then(|n| n.to_asn1_integer()).expect("serial");
        builder.set_serial_number(&serial).expect("serial number");
        builder.set_not_before(&Asn1Time::days_from_now(0).expect("time")).expect("not before");
        builder.set_not_after(&Asn1Time::days_from_now(30).expect("time")).expect("not after");
        builder.sign(&pkey, MessageDigest::sha256()).expect("self-sign");
        let cert = builder.build();

        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("key.pem"), pkey.private_key_to_pem_pkcs8().expect("key pem"))
            .expect("write key");
        std::fs::write(dir.path().join("chain.pem"), cert.to_pem().expect("cert pem"))
            .expect("write chain");

        Self {
            dir,
            public_pem: pkey.public_key_to_pem().expect("public pem"),
            cert_der: cert.to_der().expect("cert der"),
        }
    }

    /// Configuration TOML for a partner at `base_url`, with relative credential paths.
    pub fn toml(&self, base_url: &str, retries: u32) -> String {
        format!(
            r#"
            base_url = "{base_url}"
            retries = {retries}
            settlement_iban = "{SETTLEMENT_IBAN}"

            [timeouts]
            connect_secs = 2
            read_secs = 2
            overall_secs = 5

            [identity]
            client_name = "{CLIENT_NAME}"
            onboarding_id = "{ONBOARDING_ID}"
            certificate_chain_path = "chain.pem"
            private_key_path = "key.pem"
            "#
        )
    }

    /// Writes the configuration next to the credentials and loads it from disk.
    pub fn config(&self, base_url: &str, retries: u32) -> BridgeConfig {
        let path = self.dir.path().join("bridge.toml");
        std::fs::write(&path, self.toml(base_url, retries)).expect("write config");
        BridgeConfig::from_file(&path).expect("config should load")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Installs a test subscriber so `RUST_LOG=debug cargo test` shows the client's logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
