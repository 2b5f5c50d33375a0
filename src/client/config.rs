//! Client configuration.

use crate::circuit_breaker::{CircuitBreakerConfig, DEFAULT_FAILURE_THRESHOLD, DEFAULT_OPEN_DURATION};
use crate::core::HttpError;

use secrecy::SecretString;
use std::time::Duration;
use url::Url;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("httpbridge/", env!("CARGO_PKG_VERSION"));

/// Configuration for an [`HttpClient`](crate::client::HttpClient).
///
/// Zero or empty values are replaced with defaults by [`prepare`](Self::prepare).
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Base URL relative request paths are joined onto.
    pub base_url: Option<String>,

    /// `User-Agent` header value.
    pub user_agent: Option<String>,

    /// Value sent verbatim in the `Authorization` header of every request.
    pub auth_token: Option<SecretString>,

    /// HTTP(S) proxy for all requests.
    pub proxy_address: Option<String>,

    /// Per-round-trip timeout.
    pub request_timeout: Option<Duration>,

    /// Additional PEM root certificates.
    pub ca_files: Vec<String>,

    /// PEM client certificate.
    pub client_cert_file: Option<String>,

    /// PEM client private key.
    pub client_key_file: Option<String>,

    /// Skip server certificate verification.
    pub insecure: bool,

    /// Log every request and response at debug level.
    pub debug: bool,

    /// Route requests through per-URL circuit breakers.
    pub circuit_breaker: bool,

    /// How long a tripped circuit stays open.
    pub circuit_breaker_timeout: Option<Duration>,

    /// Consecutive failures that trip a circuit.
    pub circuit_breaker_failures: u32,
}

impl ClientConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Sets the `Authorization` header value.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(SecretString::new(token.into().into_boxed_str()));
        self
    }

    /// Sets the proxy address.
    pub fn with_proxy(mut self, address: impl Into<String>) -> Self {
        self.proxy_address = Some(address.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Adds a root CA file.
    pub fn with_ca_file(mut self, path: impl Into<String>) -> Self {
        self.ca_files.push(path.into());
        self
    }

    /// Sets the client certificate and key files.
    pub fn with_client_cert(mut self, cert: impl Into<String>, key: impl Into<String>) -> Self {
        self.client_cert_file = Some(cert.into());
        self.client_key_file = Some(key.into());
        self
    }

    /// Disables server certificate verification.
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Enables debug logging of requests and responses.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enables per-URL circuit breakers.
    pub fn with_circuit_breaker(mut self, enabled: bool) -> Self {
        self.circuit_breaker = enabled;
        self
    }

    /// Sets how long a tripped circuit stays open.
    pub fn with_circuit_breaker_timeout(mut self, timeout: Duration) -> Self {
        self.circuit_breaker_timeout = Some(timeout);
        self
    }

    /// Sets the failures needed to trip a circuit.
    pub fn with_circuit_breaker_failures(mut self, failures: u32) -> Self {
        self.circuit_breaker_failures = failures;
        self
    }

    /// Validates the configuration and fills in defaults.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the base URL or proxy is not an absolute
    /// http(s) URL, or if only one of the client certificate and key is set.
    pub fn prepare(mut self) -> Result<Self, HttpError> {
        if let Some(base) = self.base_url.as_deref() {
            validate_http_url("base URL", base)?;
        }
        if let Some(proxy) = self.proxy_address.as_deref() {
            validate_http_url("proxy address", proxy)?;
        }

        match (&self.client_cert_file, &self.client_key_file) {
            (Some(_), None) => {
                return Err(HttpError::configuration(
                    "client certificate given without a private key",
                ))
            }
            (None, Some(_)) => {
                return Err(HttpError::configuration(
                    "private key given without a client certificate",
                ))
            }
            _ => {}
        }

        if self.request_timeout.map_or(true, |t| t.is_zero()) {
            self.request_timeout = Some(DEFAULT_REQUEST_TIMEOUT);
        }
        if self.user_agent.as_deref().map_or(true, str::is_empty) {
            self.user_agent = Some(DEFAULT_USER_AGENT.to_string());
        }
        if self.circuit_breaker_timeout.map_or(true, |t| t.is_zero()) {
            self.circuit_breaker_timeout = Some(DEFAULT_OPEN_DURATION);
        }
        if self.circuit_breaker_failures == 0 {
            self.circuit_breaker_failures = DEFAULT_FAILURE_THRESHOLD;
        }

        Ok(self)
    }

    /// Returns the request timeout, or the default.
    pub fn timeout(&self) -> Duration {
        self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Breaker configuration derived from the circuit breaker settings.
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::default()
            .with_failure_threshold(if self.circuit_breaker_failures == 0 {
                DEFAULT_FAILURE_THRESHOLD
            } else {
                self.circuit_breaker_failures
            })
            .with_open_duration(
                self.circuit_breaker_timeout
                    .filter(|t| !t.is_zero())
                    .unwrap_or(DEFAULT_OPEN_DURATION),
            )
    }
}

fn validate_http_url(what: &str, value: &str) -> Result<(), HttpError> {
    let parsed = Url::parse(value)
        .map_err(|e| HttpError::configuration(format!("invalid {what} '{value}': {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(HttpError::configuration(format!(
            "invalid {what} '{value}': scheme must be http or https"
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(HttpError::configuration(format!(
            "invalid {what} '{value}': missing host"
        )));
    }
    Ok(())
}
