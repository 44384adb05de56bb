//! Client-credentials token acquisition and caching.

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use crate::{
    error::{BridgeError, Result},
    partner::endpoint,
    signing::RequestSigner,
    transport::{HttpTransport, NormalizedResponse, PartnerRequest, ResilientTransport, Transport},
};

/// Token lifetime assumed when the grant response carries no `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 300;

/// Token type assumed when the grant response carries no `token_type`.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

const GRANT_BODY: &str = "grant_type=client_credentials";

/// Partner API family a token is issued for.
///
/// Each family has its own app name in the signed grant and its own token cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiFamily {
    /// Payment initiation and status APIs.
    PaymentInitiation,
    /// End-user registration APIs.
    UserRegistration,
}

impl ApiFamily {
    /// App name declared in the `app` header of the grant.
    ///
    /// # Examples
    ///
    /// ```
    /// use pisp_bridge::auth::ApiFamily;
    ///
    /// assert_eq!(ApiFamily::PaymentInitiation.app_name(), "PIS");
    /// assert_eq!(ApiFamily::UserRegistration.app_name(), "EUR");
    /// ```
    #[must_use]
    pub const fn app_name(self) -> &'static str {
        match self {
            Self::PaymentInitiation => "PIS",
            Self::UserRegistration => "EUR",
        }
    }
}

impl fmt::Display for ApiFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.app_name())
    }
}

/// A bearer token issued by the partner.
///
/// Immutable: a refresh replaces the whole value.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    token_type: String,
    expires_at: DateTime<Utc>,
}

impl Token {
    /// Creates a token.
    #[must_use]
    pub const fn new(value: String, token_type: String, expires_at: DateTime<Utc>) -> Self {
        Self { value, token_type, expires_at }
    }

    /// Opaque token value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Token type, `"Bearer"` unless the partner said otherwise.
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Absolute expiry instant.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token may still be sent at `now`.
    ///
    /// Strict: a token expiring exactly at `now` is no longer usable. No grace
    /// period is subtracted.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// use pisp_bridge::auth::Token;
    ///
    /// let now = Utc::now();
    /// let token = Token::new("abc".to_owned(), "Bearer".to_owned(), now);
    ///
    /// assert!(!token.is_usable_at(now));
    /// assert!(token.is_usable_at(now - Duration::seconds(1)));
    /// ```
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// `Authorization` header value for business calls: `"<type> <value>"`.
    #[must_use]
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &crate::security::MASK)
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Client identity declared in every grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Registered client name (`client` header).
    pub client_name: String,
    /// Onboarding identifier (`id` header).
    pub onboarding_id: String,
}

#[derive(Debug, Deserialize)]
struct GrantResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct GrantError {
    error: Option<String>,
    error_description: Option<String>,
}

/// Obtains and caches the bearer token of one API family.
///
/// The cache check and the fetch are not one atomic step: two callers that both
/// find the cache empty or expired both send a grant, and the last response
/// stored wins. The lock is never held across an await point.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use pisp_bridge::{
///     auth::{ApiFamily, ClientIdentity, TokenAuthority},
///     signing::{CredentialMaterial, RequestSigner},
///     transport::{HttpTransport, ResilientTransport, TimeoutConfig},
/// };
///
/// # async fn example(credential: Arc<CredentialMaterial>) -> pisp_bridge::Result<()> {
/// let transport = Arc::new(ResilientTransport::new(
///     HttpTransport::with_config(&TimeoutConfig::default())?,
///     3,
///     false,
/// )?);
/// let identity = ClientIdentity {
///     client_name: "acme-shop".to_owned(),
///     onboarding_id: "0f1e2d3c".to_owned(),
/// };
///
/// let authority = TokenAuthority::new(
///     ApiFamily::PaymentInitiation,
///     "https://api.partner.example".parse().unwrap(),
///     identity,
///     RequestSigner::new(credential),
///     transport,
/// );
///
/// let token = authority.authorize().await?;
/// println!("token expires at {}", token.expires_at());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TokenAuthority<T = HttpTransport> {
    family: ApiFamily,
    base_url: Url,
    identity: ClientIdentity,
    signer: RequestSigner,
    transport: Arc<ResilientTransport<T>>,
    cached: RwLock<Option<Token>>,
}

impl<T: Transport> TokenAuthority<T> {
    /// Creates an authority with an empty cache.
    #[must_use]
    pub const fn new(
        family: ApiFamily,
        base_url: Url,
        identity: ClientIdentity,
        signer: RequestSigner,
        transport: Arc<ResilientTransport<T>>,
    ) -> Self {
        Self { family, base_url, identity, signer, transport, cached: RwLock::new(None) }
    }

    /// API family this authority serves.
    #[must_use]
    pub const fn family(&self) -> ApiFamily {
        self.family
    }

    /// Returns the cached token if still usable, otherwise performs a grant.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::AuthError`] / [`BridgeError::UnknownAuthError`] when the
    ///   grant is rejected or its response is malformed
    /// - [`BridgeError::TransportError`] when the token endpoint is unreachable
    /// - [`BridgeError::SigningError`] / [`BridgeError::ConfigurationError`] when the
    ///   grant cannot be signed
    pub async fn authorize(&self) -> Result<Token> {
        self.authorize_at(Utc::now()).await
    }

    /// Drops the cached token, forcing the next [`authorize`](Self::authorize) to
    /// perform a grant.
    pub fn invalidate(&self) {
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Currently cached token, usable or not.
    #[must_use]
    pub fn cached(&self) -> Option<Token> {
        self.cached.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[instrument(skip(self), fields(app = self.family.app_name()))]
    pub(crate) async fn authorize_at(&self, now: DateTime<Utc>) -> Result<Token> {
        if let Some(token) = self.usable_token(now) {
            tracing::debug!(expires_at = %token.expires_at(), "using cached token");
            return Ok(token);
        }

        let request = self.grant_request(now)?;
        tracing::info!(client = %self.identity.client_name, "requesting access token");

        let response = self.transport.execute(&request).await?;
        let token = parse_grant_response(&response, now)?;

        tracing::info!(expires_at = %token.expires_at(), "access token issued");
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());

        Ok(token)
    }

    fn usable_token(&self, now: DateTime<Utc>) -> Option<Token> {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|token| token.is_usable_at(now))
            .cloned()
    }

    fn grant_request(&self, now: DateTime<Utc>) -> Result<PartnerRequest> {
        let url = endpoint(&self.base_url, &["authorize", "token"])?;

        let signed = vec![
            ("app".to_owned(), self.family.app_name().to_owned()),
            ("client".to_owned(), self.identity.client_name.clone()),
            ("id".to_owned(), self.identity.onboarding_id.clone()),
            ("date".to_owned(), imf_fixdate(now)),
        ];
        let set = self.signer.build_signed_headers("POST", url.as_str(), signed)?;

        let mut request = PartnerRequest::post(url);
        request.headers = set.headers;
        Ok(request
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .header("Authorization", set.signature)
            .body(GRANT_BODY))
    }
}

/// Formats `instant` as an RFC 7231 IMF-fixdate, e.g. `Tue, 15 Oct 2024 08:12:31 GMT`.
#[must_use]
pub fn imf_fixdate(instant: DateTime<Utc>) -> String {
    instant.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn parse_grant_response(response: &NormalizedResponse, now: DateTime<Utc>) -> Result<Token> {
    if !response.is_success() {
        let error: GrantError = serde_json::from_str(&response.body).unwrap_or_default();
        let reason = error
            .error_description
            .filter(|d| !d.trim().is_empty())
            .or_else(|| error.error.filter(|c| !c.trim().is_empty()));

        tracing::warn!(status = response.status_code, reason = ?reason, "token grant rejected");
        return Err(match reason {
            Some(reason) => BridgeError::AuthError(reason),
            None => BridgeError::UnknownAuthError { status: response.status_code },
        });
    }

    let grant: GrantResponse = serde_json::from_str(&response.body)
        .map_err(|e| BridgeError::AuthError(format!("malformed token response: {e}")))?;

    let value = grant
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| BridgeError::AuthError("token response has no access_token".to_owned()))?;
    let token_type = grant.token_type.unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_owned());
    let expires_in = grant.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);

    let expires_at = Duration::try_seconds(expires_in)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| BridgeError::AuthError(format!("invalid expires_in: {expires_in}")))?;

    Ok(Token::new(value, token_type, expires_at))
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use chrono::TimeZone;
    use josekit::jws::{JwsVerifier, RS256};

    use super::*;
    use crate::{
        signing::{canonical_string, credential::test_support::IDENTITY},
        transport::testing::{ScriptedTransport, Step},
    };

    fn authority(steps: Vec<Step>) -> TokenAuthority<ScriptedTransport> {
        authority_for(ApiFamily::PaymentInitiation, steps)
    }

    fn authority_for(family: ApiFamily, steps: Vec<Step>) -> TokenAuthority<ScriptedTransport> {
        let transport =
            Arc::new(ResilientTransport::new(ScriptedTransport::new(steps), 3, false).unwrap());
        TokenAuthority::new(
            family,
            "https://api.partner.example/v1".parse().unwrap(),
            ClientIdentity {
                client_name: "acme-shop".to_owned(),
                onboarding_id: "0f1e2d3c".to_owned(),
            },
            RequestSigner::new(IDENTITY.credential()),
            transport,
        )
    }

    fn granted(body: &str) -> Step {
        Step::Respond(200, body.to_owned())
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 15, 8, 12, 31).unwrap()
    }

    #[test]
    fn test_imf_fixdate() {
        assert_eq!(imf_fixdate(fixed_now()), "Tue, 15 Oct 2024 08:12:31 GMT");
    }

    #[test]
    fn test_token_expiry_boundary() {
        let now = fixed_now();
        let token = Token::new("t".to_owned(), "Bearer".to_owned(), now);

        assert!(!token.is_usable_at(now));
        assert!(token.is_usable_at(now - Duration::seconds(1)));
        assert!(!token.is_usable_at(now + Duration::seconds(1)));
    }

    #[test]
    fn test_token_debug_hides_value() {
        let token = Token::new("secret-token".to_owned(), "Bearer".to_owned(), fixed_now());
        let debug = format!("{token:?}");
        assert!(!debug.contains("secret-token"));
        assert_eq!(token.authorization_value(), "Bearer secret-token");
    }

    #[tokio::test]
    async fn test_grant_request_shape() {
        let authority = authority(vec![granted(r#"{"access_token":"abc"}"#)]);
        authority.authorize_at(fixed_now()).await.unwrap();

        let requests = authority.transport.inner().requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];

        assert_eq!(request.method, reqwest::Method::POST);
        assert_eq!(request.url.as_str(), "https://api.partner.example/v1/authorize/token");
        assert_eq!(request.body.as_deref(), Some(GRANT_BODY.as_bytes()));
        assert_eq!(request.header_value("app"), Some("PIS"));
        assert_eq!(request.header_value("client"), Some("acme-shop"));
        assert_eq!(request.header_value("id"), Some("0f1e2d3c"));
        assert_eq!(request.header_value("date"), Some("Tue, 15 Oct 2024 08:12:31 GMT"));
        assert_eq!(
            request.header_value("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert!(request.header_value("authorization").unwrap().starts_with("Signature keyId=\""));
    }

    #[tokio::test]
    async fn test_grant_signature_verifies() {
        let authority = authority(vec![granted(r#"{"access_token":"abc"}"#)]);
        authority.authorize_at(fixed_now()).await.unwrap();

        let request = authority.transport.inner().requests().remove(0);
        let authorization = request.header_value("authorization").unwrap();
        let b64 = authorization.rsplit("signature=\"").next().unwrap().trim_end_matches('"');
        let raw = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();

        let verifier = RS256.verifier_from_pem(&IDENTITY.public_pem).unwrap();
        let signed = canonical_string(&request.headers).unwrap();
        assert!(verifier.verify(signed.as_bytes(), &raw).is_ok());
    }

    #[tokio::test]
    async fn test_registration_family_uses_its_app_name() {
        let authority =
            authority_for(ApiFamily::UserRegistration, vec![granted(r#"{"access_token":"abc"}"#)]);
        authority.authorize_at(fixed_now()).await.unwrap();

        let request = authority.transport.inner().requests().remove(0);
        assert_eq!(request.header_value("app"), Some("EUR"));
    }

    #[tokio::test]
    async fn test_defaults_applied() {
        let authority = authority(vec![granted(r#"{"access_token":"abc"}"#)]);
        let token = authority.authorize_at(fixed_now()).await.unwrap();

        assert_eq!(token.value(), "abc");
        assert_eq!(token.token_type(), "Bearer");
        assert_eq!(token.expires_at(), fixed_now() + Duration::seconds(300));
    }

    #[tokio::test]
    async fn test_explicit_type_and_lifetime() {
        let authority = authority(vec![granted(
            r#"{"access_token":"abc","token_type":"MAC","expires_in":60}"#,
        )]);
        let token = authority.authorize_at(fixed_now()).await.unwrap();

        assert_eq!(token.token_type(), "MAC");
        assert_eq!(token.expires_at(), fixed_now() + Duration::seconds(60));
    }

    #[tokio::test]
    async fn test_cached_token_skips_network() {
        let authority = authority(vec![
            granted(r#"{"access_token":"first"}"#),
            granted(r#"{"access_token":"second"}"#),
        ]);

        let first = authority.authorize_at(fixed_now()).await.unwrap();
        let second = authority.authorize_at(fixed_now()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(authority.transport.inner().calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_at_expiry_instant() {
        let authority = authority(vec![
            granted(r#"{"access_token":"first","expires_in":60}"#),
            granted(r#"{"access_token":"second","expires_in":60}"#),
        ]);
        let first = authority.authorize_at(fixed_now()).await.unwrap();

        let before = authority.authorize_at(first.expires_at() - Duration::seconds(1)).await.unwrap();
        assert_eq!(before.value(), "first");
        assert_eq!(authority.transport.inner().calls(), 1);

        let at = authority.authorize_at(first.expires_at()).await.unwrap();
        assert_eq!(at.value(), "second");
        assert_eq!(authority.transport.inner().calls(), 2);
        assert_eq!(authority.cached(), Some(at));
    }

    #[tokio::test]
    async fn test_invalidate_forces_grant() {
        let authority = authority(vec![
            granted(r#"{"access_token":"first"}"#),
            granted(r#"{"access_token":"second"}"#),
        ]);
        authority.authorize_at(fixed_now()).await.unwrap();
        authority.invalidate();
        assert_eq!(authority.cached(), None);

        let token = authority.authorize_at(fixed_now()).await.unwrap();
        assert_eq!(token.value(), "second");
    }

    #[tokio::test]
    async fn test_missing_access_token() {
        let authority = authority(vec![granted(r#"{"token_type":"Bearer"}"#)]);
        let err = authority.authorize_at(fixed_now()).await.unwrap_err();

        assert!(matches!(err, BridgeError::AuthError(ref msg) if msg.contains("access_token")));
        assert_eq!(authority.cached(), None);
    }

    #[tokio::test]
    async fn test_error_description_preferred() {
        let authority = authority(vec![Step::Respond(
            401,
            r#"{"error":"invalid_client","error_description":"unknown certificate"}"#.to_owned(),
        )]);
        let err = authority.authorize_at(fixed_now()).await.unwrap_err();
        assert!(matches!(err, BridgeError::AuthError(ref msg) if msg == "unknown certificate"));
    }

    #[tokio::test]
    async fn test_error_code_only() {
        let authority =
            authority(vec![Step::Respond(400, r#"{"error":"invalid_grant"}"#.to_owned())]);
        let err = authority.authorize_at(fixed_now()).await.unwrap_err();
        assert!(matches!(err, BridgeError::AuthError(ref msg) if msg == "invalid_grant"));
    }

    #[tokio::test]
    async fn test_unrecognised_error_body() {
        let authority = authority(vec![Step::Respond(500, "<html>oops</html>".to_owned())]);
        let err = authority.authorize_at(fixed_now()).await.unwrap_err();
        assert!(matches!(err, BridgeError::UnknownAuthError { status: 500 }));
    }

    #[tokio::test]
    async fn test_unreachable_token_endpoint() {
        let authority = authority(vec![Step::Fail, Step::Fail, Step::Fail]);
        let err = authority.authorize_at(fixed_now()).await.unwrap_err();

        assert!(matches!(err, BridgeError::TransportError(_)));
        assert_eq!(authority.transport.inner().calls(), 3);
    }
}
