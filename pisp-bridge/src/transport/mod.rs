//! Transport abstraction and the retrying partner client.
//!
//! # Architecture
//!
//! - [`Transport`]: one attempt, one exchange. Sealed; [`HttpTransport`] is the
//!   production implementation.
//! - [`ResilientTransport`]: wraps a transport with the bounded retry loop, the
//!   per-attempt logging and secret redaction.
//!
//! Application-level failures (4xx, 5xx) are never errors at this layer: they come
//! back as a [`NormalizedResponse`] and are interpreted by
//! [`partner::errors`](crate::partner::errors).
//!
//! # Examples
//!
//! ```rust,no_run
//! use pisp_bridge::transport::{HttpTransport, PartnerRequest, ResilientTransport, TimeoutConfig};
//!
//! # async fn example() -> pisp_bridge::Result<()> {
//! let http = HttpTransport::with_config(&TimeoutConfig::default())?;
//! let transport = ResilientTransport::new(http, 3, false)?;
//!
//! let url = "https://api.partner.example/payments/pay-42/status".parse().unwrap();
//! let request = PartnerRequest::get(url).header("Accept", "application/json");
//!
//! let response = transport.execute(&request).await?;
//! println!("Status: {}", response.status_line());
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use reqwest::Method;
use tracing::instrument;
use url::Url;

use crate::{
    error::{BridgeError, Result},
    reliability::{RetryPolicy, is_retryable, retry_with_backoff},
    security::redact_headers,
};

pub mod config;
pub mod http;
mod sealed;

pub use config::TimeoutConfig;
pub use http::HttpTransport;

/// An outbound call to the partner API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute target URL.
    pub url: Url,
    /// Request headers, sent in this order.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<Vec<u8>>,
}

impl PartnerRequest {
    /// Creates a request without headers or body.
    #[must_use]
    pub const fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: Vec::new(), body: None }
    }

    /// Creates a GET request.
    #[must_use]
    pub const fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a POST request.
    #[must_use]
    pub const fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// Appends a header.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builders"
    )]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<Vec<u8>> is idiomatic for builders"
    )]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// First value of the named header, compared case-insensitively.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A partner response reduced to what the bridge interprets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Reason phrase for the status code, empty when unknown.
    pub status_message: String,
    /// Response body as text.
    pub body: String,
    /// Response headers.
    pub headers: Vec<(String, String)>,
}

impl NormalizedResponse {
    /// Whether the partner accepted the call: `200 <= status < 400`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pisp_bridge::transport::NormalizedResponse;
    ///
    /// let response = NormalizedResponse {
    ///     status_code: 302,
    ///     status_message: "Found".to_owned(),
    ///     body: String::new(),
    ///     headers: vec![],
    /// };
    /// assert!(response.is_success());
    /// ```
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 400
    }

    /// `"<code> <reason>"`, or just the code when the reason is unknown.
    #[must_use]
    pub fn status_line(&self) -> String {
        if self.status_message.is_empty() {
            self.status_code.to_string()
        } else {
            format!("{} {}", self.status_code, self.status_message)
        }
    }

    /// First value of the named header, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
}

/// Single-attempt transport abstraction.
///
/// This trait is sealed: only implementations within this crate are allowed.
pub trait Transport: sealed::private::Sealed + Send + Sync {
    /// Performs exactly one exchange.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HttpError`] when no response was obtained, or
    /// [`BridgeError::InvalidInput`] for a request that cannot be sent.
    fn send<'a>(
        &'a self,
        request: &'a PartnerRequest,
    ) -> impl Future<Output = Result<NormalizedResponse>> + Send + 'a;

    /// Returns the protocol name for logging.
    fn protocol_name(&self) -> &'static str;
}

/// Transport that retries transient failures and logs every attempt.
///
/// Runs on the caller's runtime: nothing is spawned and nothing outlives the call.
/// Every attempt reuses the same request, so headers such as `X-Request-ID` stay
/// identical across retries.
#[derive(Debug)]
pub struct ResilientTransport<T = HttpTransport> {
    inner: T,
    policy: RetryPolicy,
    verbose: bool,
}

impl<T: Transport> ResilientTransport<T> {
    /// Wraps `inner` with an immediate-retry policy of `retries` total attempts.
    ///
    /// `verbose` adds request and response bodies to the debug logs.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigurationError`] if `retries` is zero.
    pub fn new(inner: T, retries: u32, verbose: bool) -> Result<Self> {
        Self::with_policy(inner, RetryPolicy::with_max_attempts(retries), verbose)
    }

    /// Wraps `inner` with an explicit retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigurationError`] if the policy allows no attempt.
    pub fn with_policy(inner: T, policy: RetryPolicy, verbose: bool) -> Result<Self> {
        if policy.max_attempts == 0 {
            return Err(BridgeError::ConfigurationError(
                "retries must be at least 1".to_owned(),
            ));
        }
        Ok(Self { inner, policy, verbose })
    }

    /// Total attempts per call.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    /// The wrapped single-attempt transport.
    #[must_use]
    pub const fn inner(&self) -> &T {
        &self.inner
    }

    /// Sends `request`, retrying transport failures up to the attempt budget.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::TransportError`] when every attempt failed without a response
    /// - any non-retryable error from the inner transport, unchanged
    #[instrument(
        skip(self, request),
        fields(
            method = %request.method,
            uri = %request.url,
            protocol = self.inner.protocol_name(),
        )
    )]
    pub async fn execute(&self, request: &PartnerRequest) -> Result<NormalizedResponse> {
        let max_attempts = self.policy.max_attempts;

        if self.verbose {
            tracing::debug!(
                headers = ?redact_headers(&request.headers),
                body = %request.body.as_deref().map(String::from_utf8_lossy).unwrap_or_default(),
                "partner request"
            );
        }

        let mut attempt = 0_u32;
        let result = retry_with_backoff(&self.policy, is_retryable, || {
            attempt += 1;
            tracing::info!(
                method = %request.method,
                uri = %request.url,
                attempt,
                max_attempts,
                "sending partner request"
            );
            self.inner.send(request)
        })
        .await;

        match result {
            Ok(response) => {
                tracing::info!(
                    status = response.status_code,
                    status_message = %response.status_message,
                    "partner responded"
                );
                if self.verbose {
                    tracing::debug!(body = %response.body, "partner response");
                }
                Ok(response)
            }
            Err(error) if is_retryable(&error) => {
                tracing::error!(max_attempts, error = %error, "partner API unreachable");
                Err(BridgeError::TransportError(format!(
                    "failed to contact the partner API after {max_attempts} attempt(s): {error}"
                )))
            }
            Err(error) => Err(error),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::{
        testing::{ScriptedTransport, Step},
        *,
    };

    fn request() -> PartnerRequest {
        PartnerRequest::get("https://api.partner.example/payments/p1/status".parse().unwrap())
            .header("X-Request-ID", "7d9f")
    }

    #[test]
    fn test_zero_retries_rejected() {
        let result = ResilientTransport::new(ScriptedTransport::default(), 0, false);
        assert!(matches!(result, Err(BridgeError::ConfigurationError(_))));
    }

    #[test]
    fn test_is_success_range() {
        for (status, expected) in [(199, false), (200, true), (302, true), (399, true), (400, false), (503, false)] {
            assert_eq!(testing::response(status, "").is_success(), expected, "status {status}");
        }
    }

    #[test]
    fn test_status_line() {
        assert_eq!(testing::response(404, "").status_line(), "404 Not Found");
        let mut response = testing::response(404, "");
        response.status_message.clear();
        assert_eq!(response.status_line(), "404");
    }

    #[test]
    fn test_request_builder() {
        let request = PartnerRequest::post("https://api.partner.example/payments".parse().unwrap())
            .header("Content-Type", "application/json")
            .body(b"{}".to_vec());

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.header_value("content-type"), Some("application/json"));
        assert_eq!(request.body.as_deref(), Some(&b"{}"[..]));
    }

    #[tokio::test]
    async fn test_succeeds_on_last_allowed_attempt() {
        let inner = ScriptedTransport::new([
            Step::Fail,
            Step::Fail,
            Step::Respond(200, r#"{"ok":true}"#.to_owned()),
        ]);
        let transport = ResilientTransport::new(inner, 3, false).unwrap();

        let response = transport.execute(&request()).await.unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(transport.inner().calls(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_transport_error() {
        let inner = ScriptedTransport::new([
            Step::Fail,
            Step::Fail,
            Step::Respond(200, String::new()),
        ]);
        let transport = ResilientTransport::new(inner, 2, false).unwrap();

        let err = transport.execute(&request()).await.unwrap_err();

        assert!(
            matches!(err, BridgeError::TransportError(ref msg) if msg.starts_with("failed to contact the partner API"))
        );
        assert_eq!(transport.inner().calls(), 2);
    }

    #[tokio::test]
    async fn test_error_status_is_not_retried() {
        let inner = ScriptedTransport::new([
            Step::Respond(503, r#"{"code":"999"}"#.to_owned()),
            Step::Respond(200, String::new()),
        ]);
        let transport = ResilientTransport::new(inner, 3, false).unwrap();

        let response = transport.execute(&request()).await.unwrap();

        assert_eq!(response.status_code, 503);
        assert!(!response.is_success());
        assert_eq!(transport.inner().calls(), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_budget() {
        let inner = ScriptedTransport::new([Step::Fail, Step::Respond(200, String::new())]);
        let transport = ResilientTransport::new(inner, 1, true).unwrap();

        assert!(matches!(
            transport.execute(&request()).await,
            Err(BridgeError::TransportError(_))
        ));
        assert_eq!(transport.inner().calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_resend_identical_request() {
        let inner = ScriptedTransport::new([Step::Fail, Step::Respond(204, String::new())]);
        let transport = ResilientTransport::new(inner, 2, false).unwrap();

        transport.execute(&request()).await.unwrap();

        let sent = transport.inner().requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
        assert_eq!(sent[1].header_value("x-request-id"), Some("7d9f"));
    }
}
