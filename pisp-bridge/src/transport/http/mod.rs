//! HTTP transport implementation.
//!
//! One [`Transport::send`] is exactly one HTTP exchange with the partner. Retrying
//! is [`ResilientTransport`](crate::transport::ResilientTransport)'s job.

use reqwest::Client;
use tracing::instrument;

use crate::{
    error::{BridgeError, Result},
    transport::{NormalizedResponse, PartnerRequest, Transport, config::TimeoutConfig, sealed},
};

const FORBIDDEN_HEADER_CHARS: [char; 3] = ['\r', '\n', '\0'];

/// Rejects header names or values that could split the request.
fn validate_header(name: &str, value: &str) -> Result<()> {
    if name.contains(FORBIDDEN_HEADER_CHARS) {
        return Err(BridgeError::InvalidInput(format!(
            "header name {name:?} contains a line break or NUL"
        )));
    }
    if value.contains(FORBIDDEN_HEADER_CHARS) {
        return Err(BridgeError::InvalidInput(format!(
            "value of header {name} contains a line break or NUL"
        )));
    }
    Ok(())
}

/// Single-attempt HTTP transport using reqwest.
///
/// Connection pooling and keep-alive come from the shared [`Client`]. Connection
/// failures, timeouts and body read errors surface as
/// [`BridgeError::HttpError`]. A request reqwest refuses to build, such as one
/// with a control character in a header value, is [`BridgeError::InvalidInput`]. Every status code, 4xx and 5xx included, is
/// returned as a [`NormalizedResponse`].
///
/// # Examples
///
/// ```rust,no_run
/// use pisp_bridge::transport::{HttpTransport, PartnerRequest, TimeoutConfig, Transport};
///
/// # async fn example() -> pisp_bridge::Result<()> {
/// let transport = HttpTransport::with_config(&TimeoutConfig::default())?;
///
/// let url = "https://api.partner.example/aspsps?country=FR".parse().unwrap();
/// let response = transport.send(&PartnerRequest::get(url)).await?;
/// println!("Status: {}", response.status_line());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl sealed::private::Sealed for HttpTransport {}

impl HttpTransport {
    /// Creates HTTP transport with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigurationError`] if the timeouts are invalid, or
    /// [`BridgeError::HttpError`] if the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use pisp_bridge::transport::{HttpTransport, TimeoutConfig};
    ///
    /// let config = TimeoutConfig { connect_secs: 5, read_secs: 20, overall_secs: 30 };
    /// let transport = HttpTransport::with_config(&config).unwrap();
    /// ```
    pub fn with_config(config: &TimeoutConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(config.connect())
            .read_timeout(config.read())
            .timeout(config.overall())
            .build()
            .map_err(BridgeError::HttpError)?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send<'a>(&'a self, request: &'a PartnerRequest) -> Result<NormalizedResponse> {
        for (name, value) in &request.headers {
            validate_header(name, value)?;
        }

        let mut builder = self.client.request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        // reqwest defers header validation to send(); nothing reached the wire.
        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                BridgeError::InvalidInput(format!("request could not be built: {e}"))
            } else {
                BridgeError::HttpError(e)
            }
        })?;

        let status = response.status();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_owned()))
            .collect();

        // A body that cannot be read is a failed attempt, not a response.
        let body = response.text().await.map_err(BridgeError::HttpError)?;

        Ok(NormalizedResponse {
            status_code: status.as_u16(),
            status_message: status.canonical_reason().unwrap_or_default().to_owned(),
            body,
            headers,
        })
    }

    fn protocol_name(&self) -> &'static str {
        "http"
    }
}
