//! The HTTP client.

use crate::circuit_breaker::BreakerRegistry;
use crate::client::config::ClientConfig;
use crate::client::retry::execute_with_retry;
use crate::core::{ArcTransport, HttpError, HttpResult, RequestBody, RequestOptions, Response};

use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// An HTTP client with retries and optional per-URL circuit breakers.
///
/// Every request path takes a [`CancellationToken`]; cancelling it aborts
/// any pending backoff or round-trip.
///
/// # Example
///
/// ```rust,ignore
/// use httpbridge::prelude::*;
///
/// let client = HttpClient::new(
///     ClientConfig::new()
///         .with_base_url("https://api.local")
///         .with_circuit_breaker(true),
/// )?;
///
/// let cancel = CancellationToken::new();
/// let opts = RequestOptions::new().name("users").retries(3);
/// let response = client.request(&cancel, "/users", &opts).await?;
/// ```
#[derive(Debug)]
pub struct HttpClient {
    config: ClientConfig,
    transport: ArcTransport,
    breakers: BreakerRegistry,
}

impl HttpClient {
    /// Creates a client backed by the reqwest transport.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the configuration is invalid or the
    /// transport cannot be built.
    #[cfg(feature = "reqwest-transport")]
    pub fn new(config: ClientConfig) -> Result<Self, HttpError> {
        let config = config.prepare()?;
        let transport = crate::transport::ReqwestTransport::new(&config)?;
        Ok(Self::from_prepared(config, std::sync::Arc::new(transport)))
    }

    /// Always fails without the `reqwest-transport` feature; use
    /// [`with_transport`](Self::with_transport) instead.
    #[cfg(not(feature = "reqwest-transport"))]
    pub fn new(_config: ClientConfig) -> Result<Self, HttpError> {
        Err(HttpError::configuration(
            "HttpClient::new requires the 'reqwest-transport' feature; use with_transport",
        ))
    }

    /// Creates a client that sends requests through `transport`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the configuration is invalid.
    pub fn with_transport(config: ClientConfig, transport: ArcTransport) -> Result<Self, HttpError> {
        let config = config.prepare()?;
        Ok(Self::from_prepared(config, transport))
    }

    fn from_prepared(config: ClientConfig, transport: ArcTransport) -> Self {
        let breakers = BreakerRegistry::new(config.breaker_config());
        Self {
            config,
            transport,
            breakers,
        }
    }

    /// Returns the prepared configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the base URL, if any.
    pub fn base_url(&self) -> Option<&str> {
        self.config.base_url.as_deref().filter(|b| !b.is_empty())
    }

    /// Returns the circuit breakers created so far.
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Resolves `url` against the base URL.
    ///
    /// Absolute http(s) URLs are returned unchanged. Otherwise the path is
    /// joined onto the base URL with a single `/`, or prefixed with
    /// `http://` when there is no base URL.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match self.base_url() {
            Some(base) if url.is_empty() => base.to_string(),
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            None => format!("http://{url}"),
        }
    }

    /// Sends a request, retrying per `options`.
    ///
    /// With circuit breaking enabled the whole retried request counts as
    /// one call against the breaker for the resolved URL.
    ///
    /// # Errors
    ///
    /// - `CircuitOpen` - the breaker for the URL rejected the call.
    /// - `Request`, `RetriesExhausted`, `Cancelled` - see
    ///   [`execute_with_retry`](crate::client::retry::execute_with_retry).
    pub async fn request(
        &self,
        cancel: &CancellationToken,
        url: &str,
        options: &RequestOptions,
    ) -> HttpResult<Response> {
        let target = self.resolve_url(url);

        if !self.config.circuit_breaker {
            return execute_with_retry(self.transport.as_ref(), cancel, &target, options).await;
        }

        let breaker = self.breakers.get_or_create(&target);
        breaker
            .call(|| execute_with_retry(self.transport.as_ref(), cancel, &target, options))
            .await
    }

    /// Sends a request with the given method and optional body.
    pub async fn req(
        &self,
        cancel: &CancellationToken,
        method: Method,
        url: &str,
        body: Option<RequestBody>,
    ) -> HttpResult<Response> {
        let mut options = RequestOptions::with_method(method);
        options.body = body;
        self.request(cancel, url, &options).await
    }

    /// Sends a GET request.
    pub async fn get(&self, cancel: &CancellationToken, url: &str) -> HttpResult<Response> {
        self.request(cancel, url, &RequestOptions::new()).await
    }

    /// Sends a GET request with query pairs (`["k1", "v1", "k2", "v2"]`).
    pub async fn get_query(
        &self,
        cancel: &CancellationToken,
        url: &str,
        query: &[&str],
    ) -> HttpResult<Response> {
        self.request(cancel, url, &RequestOptions::new().query_pairs(query))
            .await
    }

    /// Sends a POST request.
    pub async fn post(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: impl Into<RequestBody>,
    ) -> HttpResult<Response> {
        self.request(cancel, url, &with_body(Method::POST, body, &[]))
            .await
    }

    /// Sends a POST request with query pairs.
    pub async fn post_query(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: impl Into<RequestBody>,
        query: &[&str],
    ) -> HttpResult<Response> {
        self.request(cancel, url, &with_body(Method::POST, body, query))
            .await
    }

    /// Sends a PUT request.
    pub async fn put(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: impl Into<RequestBody>,
    ) -> HttpResult<Response> {
        self.request(cancel, url, &with_body(Method::PUT, body, &[]))
            .await
    }

    /// Sends a PUT request with query pairs.
    pub async fn put_query(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: impl Into<RequestBody>,
        query: &[&str],
    ) -> HttpResult<Response> {
        self.request(cancel, url, &with_body(Method::PUT, body, query))
            .await
    }

    /// Sends a PATCH request.
    pub async fn patch(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: impl Into<RequestBody>,
    ) -> HttpResult<Response> {
        self.request(cancel, url, &with_body(Method::PATCH, body, &[]))
            .await
    }

    /// Sends a PATCH request with query pairs.
    pub async fn patch_query(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: impl Into<RequestBody>,
        query: &[&str],
    ) -> HttpResult<Response> {
        self.request(cancel, url, &with_body(Method::PATCH, body, query))
            .await
    }

    /// Sends a DELETE request.
    pub async fn delete(&self, cancel: &CancellationToken, url: &str) -> HttpResult<Response> {
        self.request(cancel, url, &RequestOptions::with_method(Method::DELETE))
            .await
    }

    /// Sends a DELETE request with query pairs.
    pub async fn delete_query(
        &self,
        cancel: &CancellationToken,
        url: &str,
        query: &[&str],
    ) -> HttpResult<Response> {
        let options = RequestOptions::with_method(Method::DELETE).query_pairs(query);
        self.request(cancel, url, &options).await
    }

    /// Sends a GET request and decodes the JSON response.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> HttpResult<T> {
        self.get(cancel, url).await?.json()
    }

    /// Sends `body` as JSON in a POST request and decodes the JSON response.
    pub async fn post_json<B, T>(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: &B,
    ) -> HttpResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = RequestBody::json(body)
            .map_err(|e| HttpError::configuration(format!("failed to encode request body: {e}")))?;
        self.post(cancel, url, body).await?.json()
    }
}

pub(crate) fn with_body(
    method: Method,
    body: impl Into<RequestBody>,
    query: &[&str],
) -> RequestOptions {
    RequestOptions::with_method(method)
        .body(body)
        .query_pairs(query)
}
