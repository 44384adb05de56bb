//! The composing client: one entry point per partner operation.
//!
//! Each entry point runs behind the same boundary: taxonomy errors pass through
//! unchanged and are logged, a panic anywhere below becomes
//! [`BridgeError::Internal`]. Nothing here retries; retries happen inside
//! [`ResilientTransport`] only.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use crate::{
    auth::{ApiFamily, Token, TokenAuthority},
    config::BridgeConfig,
    error::{BridgeError, Result},
    outcome::{CanonicalOutcome, Failure, FailureKind, Reconciliation},
    partner::{
        Aspsp, PaymentInitiation, PaymentInitiationResponse, PaymentStatusResponse, endpoint,
        reduce, translate, validate_country,
    },
    security::redact_account_reference,
    signing::{CredentialMaterial, RequestSigner},
    transport::{HttpTransport, NormalizedResponse, PartnerRequest, ResilientTransport, Transport},
};

/// Header carrying the per-call correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Client for the partner's payment-initiation API.
///
/// `Send + Sync`; share it behind an [`Arc`]. The only mutable state is the
/// token cache of each API family.
///
/// # Examples
///
/// ```rust,no_run
/// use pisp_bridge::{BridgeConfig, PispClient, outcome::CanonicalOutcome};
///
/// # async fn example() -> pisp_bridge::Result<()> {
/// let config = BridgeConfig::from_file("bridge.toml".as_ref())?;
/// let client = PispClient::new(&config)?;
///
/// match client.payment_status("pay-42").await? {
///     CanonicalOutcome::Success { owner, .. } => println!("settled from {}", owner.bic),
///     other => println!("payment is {}", other.label()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PispClient<T = HttpTransport> {
    base_url: Url,
    settlement_iban: String,
    transport: Arc<ResilientTransport<T>>,
    payments: TokenAuthority<T>,
    registration: TokenAuthority<T>,
}

impl PispClient<HttpTransport> {
    /// Builds a client from configuration, reading the credential files.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigurationError`] or [`BridgeError::SigningError`]
    /// for invalid configuration or unreadable credentials.
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        config.validate()?;
        let credential = Arc::new(config.load_credentials()?);
        Self::with_credential(config, credential)
    }

    /// Builds a client around credential material the host already holds.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigurationError`] for invalid configuration.
    pub fn with_credential(
        config: &BridgeConfig,
        credential: Arc<CredentialMaterial>,
    ) -> Result<Self> {
        let http = HttpTransport::with_config(&config.timeouts)?;
        Self::with_transport(config, credential, http)
    }
}

impl<T: Transport> PispClient<T> {
    pub(crate) fn with_transport(
        config: &BridgeConfig,
        credential: Arc<CredentialMaterial>,
        inner: T,
    ) -> Result<Self> {
        config.validate()?;
        let base_url = config.base_url()?;
        let transport = Arc::new(ResilientTransport::new(inner, config.retries, config.verbose)?);
        let signer = RequestSigner::new(credential);

        let authority = |family| {
            TokenAuthority::new(
                family,
                base_url.clone(),
                config.client_identity(),
                signer.clone(),
                Arc::clone(&transport),
            )
        };
        let payments = authority(ApiFamily::PaymentInitiation);
        let registration = authority(ApiFamily::UserRegistration);

        tracing::info!(
            base_url = %base_url,
            retries = config.retries,
            key_id = %signer.credential().key_id(),
            "partner client ready"
        );

        Ok(Self {
            base_url,
            settlement_iban: config.settlement_iban.clone(),
            transport,
            payments,
            registration,
        })
    }

    /// Initiates a payment.
    ///
    /// Returns [`CanonicalOutcome::Redirecting`] when the PSU must authorise at
    /// their bank, [`CanonicalOutcome::Pending`] when the partner accepted the
    /// payment without a redirect, or a translated [`CanonicalOutcome::Failure`].
    ///
    /// # Errors
    ///
    /// - [`BridgeError::InvalidInput`] if the payment fails validation (no call is made)
    /// - token, transport and configuration errors
    /// - [`BridgeError::PartnerUnknownError`] for an unreadable success body
    pub async fn initiate_payment(&self, payment: &PaymentInitiation) -> Result<CanonicalOutcome> {
        guarded("initiate_payment", self.initiate(payment, new_request_id())).await
    }

    /// Polls the status of a payment and reduces it to a canonical outcome.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::InvalidInput`] for an empty payment id
    /// - [`BridgeError::PartnerUnknownError`] for a status response without status
    /// - token, transport and configuration errors
    pub async fn payment_status(&self, payment_id: &str) -> Result<CanonicalOutcome> {
        guarded("payment_status", self.status(payment_id, new_request_id())).await
    }

    /// Lists the ASPSPs the partner supports in `country`.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::InvalidInput`] for a malformed country code, or a 4xx the
    ///   partner classifies as invalid data
    /// - [`BridgeError::TransportError`] for communication failures
    /// - [`BridgeError::PartnerUnknownError`] for any other rejection
    pub async fn list_aspsps(&self, country: &str) -> Result<Vec<Aspsp>> {
        guarded("list_aspsps", self.aspsps(country, new_request_id())).await
    }

    /// Token for the end-user registration APIs.
    ///
    /// # Errors
    ///
    /// See [`TokenAuthority::authorize`].
    pub async fn registration_token(&self) -> Result<Token> {
        self.token(ApiFamily::UserRegistration).await
    }

    /// Token for the given API family, from cache when still usable.
    ///
    /// # Errors
    ///
    /// See [`TokenAuthority::authorize`].
    pub async fn token(&self, family: ApiFamily) -> Result<Token> {
        guarded("token", self.authority(family).authorize()).await
    }

    /// Drops every cached token.
    pub fn invalidate_tokens(&self) {
        self.payments.invalidate();
        self.registration.invalidate();
    }

    const fn authority(&self, family: ApiFamily) -> &TokenAuthority<T> {
        match family {
            ApiFamily::PaymentInitiation => &self.payments,
            ApiFamily::UserRegistration => &self.registration,
        }
    }

    #[instrument(
        skip(self, payment),
        fields(end_to_end_id = %payment.end_to_end_id, request_id = %request_id)
    )]
    async fn initiate(
        &self,
        payment: &PaymentInitiation,
        request_id: String,
    ) -> Result<CanonicalOutcome> {
        payment.validate()?;

        let body = serde_json::to_vec(&payment.to_request_body(&self.settlement_iban))
            .map_err(|e| BridgeError::Internal(format!("payment body serialisation failed: {e}")))?;
        let url = endpoint(&self.base_url, &["payments"])?;
        let request = PartnerRequest::post(url)
            .header("Content-Type", "application/json")
            .body(body);

        let response = self.send_authorized(request, &request_id).await?;
        let mut reconciliation = Reconciliation {
            payment_id: None,
            end_to_end_id: Some(payment.end_to_end_id.clone()),
        };

        if !response.is_success() {
            return Ok(failure_outcome(translate(&response), reconciliation));
        }

        let parsed: PaymentInitiationResponse = serde_json::from_str(&response.body).map_err(|e| {
            BridgeError::PartnerUnknownError(format!("malformed payment initiation response: {e}"))
        })?;
        let payment_id = parsed.payment_id.filter(|id| !id.trim().is_empty()).ok_or_else(|| {
            BridgeError::PartnerUnknownError("payment initiation response has no paymentId".to_owned())
        })?;
        reconciliation.payment_id = Some(payment_id);

        let outcome = match parsed.redirect_url.filter(|url| !url.trim().is_empty()) {
            Some(redirect_url) => {
                CanonicalOutcome::Redirecting { redirect_url: Some(redirect_url), reconciliation }
            }
            None => CanonicalOutcome::Pending { reconciliation },
        };

        tracing::info!(
            payment_id = outcome.reconciliation().payment_id.as_deref(),
            outcome = outcome.label(),
            "payment initiated"
        );
        Ok(outcome)
    }

    #[instrument(skip(self), fields(request_id = %request_id))]
    async fn status(&self, payment_id: &str, request_id: String) -> Result<CanonicalOutcome> {
        if payment_id.trim().is_empty() {
            return Err(BridgeError::InvalidInput("payment id is required".to_owned()));
        }

        let url = endpoint(&self.base_url, &["payments", payment_id, "status"])?;
        let request = PartnerRequest::get(url);

        let response = self.send_authorized(request, &request_id).await?;
        if !response.is_success() {
            return Ok(failure_outcome(translate(&response), Reconciliation::for_payment(payment_id)));
        }

        let mut parsed: PaymentStatusResponse = serde_json::from_str(&response.body).map_err(|e| {
            BridgeError::PartnerUnknownError(format!("malformed payment status response: {e}"))
        })?;
        parsed.payment_id.get_or_insert_with(|| payment_id.to_owned());

        let outcome = reduce(&parsed, &self.settlement_iban)?;
        if let CanonicalOutcome::Success { owner, .. } = &outcome {
            tracing::info!(
                debtor_account = %redact_account_reference(&owner.account_reference),
                debtor_bic = %owner.bic,
                "payment settled"
            );
        }
        tracing::info!(outcome = outcome.label(), terminal = outcome.is_terminal(), "payment status");
        Ok(outcome)
    }

    #[instrument(skip(self), fields(request_id = %request_id))]
    async fn aspsps(&self, country: &str, request_id: String) -> Result<Vec<Aspsp>> {
        let country = validate_country(country)?;

        let mut url = endpoint(&self.base_url, &["aspsps"])?;
        url.query_pairs_mut().append_pair("country", &country);

        let response = self.send_authorized(PartnerRequest::get(url), &request_id).await?;
        if !response.is_success() {
            return Err(failure_error(translate(&response)));
        }

        let aspsps: Vec<Aspsp> = serde_json::from_str(&response.body).map_err(|e| {
            BridgeError::PartnerUnknownError(format!("malformed ASPSP directory: {e}"))
        })?;
        tracing::info!(country = %country, count = aspsps.len(), "ASPSP directory fetched");
        Ok(aspsps)
    }

    /// Attaches the payment-initiation token and correlation headers, then sends.
    ///
    /// A 401 drops the cached token so the next call performs a fresh grant. The
    /// current call is not repeated.
    async fn send_authorized(
        &self,
        request: PartnerRequest,
        request_id: &str,
    ) -> Result<NormalizedResponse> {
        let token = self.payments.authorize().await?;
        let request = request
            .header("Authorization", token.authorization_value())
            .header("Accept", "application/json")
            .header(REQUEST_ID_HEADER, request_id);

        let response = self.transport.execute(&request).await?;
        if response.status_code == 401 {
            tracing::warn!("partner rejected the access token, dropping it from the cache");
            self.payments.invalidate();
        }
        Ok(response)
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

const fn failure_outcome(failure: Failure, reconciliation: Reconciliation) -> CanonicalOutcome {
    CanonicalOutcome::Failure { failure, reconciliation }
}

/// Turns a translated failure into an error, for operations without an outcome.
fn failure_error(failure: Failure) -> BridgeError {
    match failure.kind {
        FailureKind::CommunicationError => BridgeError::TransportError(failure.message),
        FailureKind::InvalidData => BridgeError::InvalidInput(failure.message),
        _ => BridgeError::PartnerUnknownError(failure.message),
    }
}

/// Entry-point boundary: logs every error and turns a panic into
/// [`BridgeError::Internal`].
async fn guarded<F, O>(operation: &'static str, future: F) -> Result<O>
where
    F: Future<Output = Result<O>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => {
            tracing::error!(
                operation,
                kind = %error.failure_kind(),
                error = %error,
                details = ?error,
                "partner operation failed"
            );
            Err(error)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(operation, panic = %message, "partner operation panicked");
            Err(BridgeError::Internal(format!("{operation} aborted: {message}")))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
