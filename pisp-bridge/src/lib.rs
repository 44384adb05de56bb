//! PISP Bridge: authenticated, resilient client for a payment-initiation partner
//!
//! A Rust library that lets a payment orchestrator initiate and track bank-transfer
//! payments through a partner's REST API. Every token grant carries an RSA HTTP
//! message signature, every business call carries a short-lived bearer token, and
//! the partner's status and error codes come back as a small, stable outcome
//! vocabulary.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ Payment orchestrator │  initiate / poll / list banks
//! └──────────┬───────────┘
//!            │ PaymentInitiation, payment id
//! ┌──────────▼─────────────────────────────────────────────┐
//! │                 PispClient (this crate)                │
//! │  ┌────────────────┐   ┌──────────────┐   ┌──────────┐  │
//! │  │ TokenAuthority │───│ RequestSigner│   │ partner::│  │
//! │  │ (PIS, EUR)     │   │ (rsa-sha256) │   │ errors,  │  │
//! │  └───────┬────────┘   └──────────────┘   │ status   │  │
//! │          │                               └────▲─────┘  │
//! │  ┌───────▼───────────────────────────────────┴──────┐  │
//! │  │ ResilientTransport (bounded immediate retries)   │  │
//! │  └───────┬──────────────────────────────────────────┘  │
//! └──────────┼─────────────────────────────────────────────┘
//!            │ HTTPS
//! ┌──────────▼───────────┐
//! │  Partner REST API    │  /authorize/token, /payments, /aspsps
//! └──────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pisp_bridge::{BridgeConfig, PispClient, outcome::CanonicalOutcome, partner::PaymentInitiation};
//! use rust_decimal::Decimal;
//!
//! # async fn example() -> pisp_bridge::Result<()> {
//! let config = BridgeConfig::from_file("bridge.toml".as_ref())?;
//! let client = PispClient::new(&config)?;
//!
//! let payment = PaymentInitiation {
//!     amount: Decimal::new(4990, 2),
//!     currency: "EUR".to_owned(),
//!     end_to_end_id: "order-1042".to_owned(),
//!     remittance_information: "Order 1042".to_owned(),
//!     redirect_url: "https://shop.example/return".to_owned(),
//!     aspsp_id: None,
//! };
//!
//! match client.initiate_payment(&payment).await? {
//!     CanonicalOutcome::Redirecting { redirect_url: Some(url), .. } => {
//!         println!("send the PSU to {url}");
//!     }
//!     CanonicalOutcome::Failure { failure, .. } => {
//!         eprintln!("{}: {}", failure.kind, failure.message);
//!     }
//!     other => println!("payment is {}", other.label()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`client`]: the composing [`PispClient`] and its entry-point boundary
//! - [`auth`]: client-credentials grants and per-family token caches
//! - [`signing`]: credential material and `Signature` authorization values
//! - [`transport`]: single-attempt HTTP transport and the retrying wrapper
//! - [`partner`]: wire models, error-envelope translation, status reduction
//! - [`outcome`]: the canonical outcome vocabulary
//! - [`config`]: TOML configuration and validation
//! - [`reliability`]: the retry loop
//! - [`security`]: log redaction
//! - [`error`]: the error taxonomy
//!
//! # Error Handling
//!
//! All operations return [`Result<T, BridgeError>`](error::Result). Partner
//! rejections of a payment are not errors: they arrive as
//! [`CanonicalOutcome::Failure`](outcome::CanonicalOutcome::Failure).
//!
//! ```rust
//! use pisp_bridge::{BridgeError, outcome::FailureKind};
//!
//! fn describe(error: &BridgeError) -> &'static str {
//!     match error.failure_kind() {
//!         FailureKind::CommunicationError => "partner unreachable, try again later",
//!         FailureKind::InvalidData => "fix the request",
//!         _ => "contact support",
//!     }
//! }
//!
//! let err = BridgeError::TransportError("failed to contact the partner API".to_owned());
//! assert_eq!(describe(&err), "partner unreachable, try again later");
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from josekit and reqwest"
)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod outcome;
pub mod partner;
pub mod reliability;
pub mod security;
pub mod signing;
pub mod transport;

pub use client::PispClient;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
