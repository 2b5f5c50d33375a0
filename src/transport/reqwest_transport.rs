//! reqwest-backed transport.
//!
//! # Requirements
//!
//! - The `reqwest-transport` feature (enabled by default)
//!
//! TLS material named in the [`ClientConfig`] is loaded once when the
//! transport is built; every request afterwards reuses the same connection
//! pool.

use crate::client::ClientConfig;
use crate::core::status::error_for_response;
use crate::core::{HttpError, RequestBody, RequestOptions, Response, TraceInfo, Transport};

use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE};
use secrecy::ExposeSecret;
use std::path::Path;
use std::time::Instant;

const MAX_REDIRECTS: usize = 20;

/// Transport that performs round-trips with a shared `reqwest::Client`.
///
/// # Example
///
/// ```rust,ignore
/// use httpbridge::client::ClientConfig;
/// use httpbridge::transport::ReqwestTransport;
///
/// let config = ClientConfig::new().with_base_url("https://api.local").prepare()?;
/// let transport = ReqwestTransport::new(&config)?;
/// ```
#[derive(Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    debug: bool,
}

impl ReqwestTransport {
    /// Builds the underlying client from a prepared configuration.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a certificate, key, proxy or header value
    /// cannot be used, and `Io` if a certificate file cannot be read.
    pub fn new(config: &ClientConfig) -> Result<Self, HttpError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.insecure)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));

        if let Some(agent) = config.user_agent.as_deref() {
            builder = builder.user_agent(agent);
        }

        if let Some(token) = config.auth_token.as_ref() {
            let mut value = HeaderValue::from_str(token.expose_secret())
                .map_err(|e| HttpError::configuration(format!("invalid auth token: {e}")))?;
            value.set_sensitive(true);
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }

        if let Some(proxy) = config.proxy_address.as_deref() {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| HttpError::configuration(format!("invalid proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }

        for path in &config.ca_files {
            let pem = std::fs::read(path)?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                HttpError::configuration(format!("invalid CA certificate '{path}': {e}"))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if let (Some(cert), Some(key)) = (&config.client_cert_file, &config.client_key_file) {
            let mut pem = std::fs::read(cert)?;
            pem.push(b'\n');
            pem.extend(std::fs::read(key)?);
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                HttpError::configuration(format!("invalid client certificate '{cert}': {e}"))
            })?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| HttpError::configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            debug: config.debug,
        })
    }

    async fn build_request(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<reqwest::RequestBuilder, HttpError> {
        let mut request = self.client.request(options.method.clone(), url);

        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(cookies) = options.cookie_header() {
            request = request.header(COOKIE, cookies);
        }

        if let Some(token) = options.auth_token.as_ref() {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(auth) = options.basic_auth.as_ref() {
            request = request.basic_auth(&auth.user, Some(auth.password.expose_secret()));
        }

        if !options.files.is_empty() {
            let mut form = reqwest::multipart::Form::new();
            for (name, value) in &options.form_data {
                form = form.text(name.clone(), value.clone());
            }
            for (field, path) in &options.files {
                let data = tokio::fs::read(path).await?;
                let file_name = Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| field.clone());
                form = form.part(
                    field.clone(),
                    reqwest::multipart::Part::bytes(data).file_name(file_name),
                );
            }
            request = request.multipart(form);
        } else if !options.form_data.is_empty() {
            request = request.form(&options.form_data);
        }

        request = match &options.body {
            None => request,
            Some(RequestBody::Json(value)) => request.json(value),
            Some(RequestBody::Text(text)) => {
                if !options.headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
                    request = request.header(CONTENT_TYPE, "text/plain; charset=utf-8");
                }
                request.body(text.clone())
            }
            Some(RequestBody::Bytes(bytes)) => request.body(bytes.clone()),
        };

        Ok(request)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, url: &str, options: &RequestOptions) -> Result<Response, HttpError> {
        let url = options.expand_path(url);
        let started = Instant::now();

        if self.debug {
            tracing::debug!(
                method = %options.method,
                url = %url,
                headers = ?options.headers,
                query = ?options.query,
                "Sending request"
            );
        }

        let response = self
            .build_request(&url, options)
            .await?
            .send()
            .await
            .map_err(|e| HttpError::transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let final_url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::transport(format!("failed to read body: {e}")))?;

        if self.debug {
            tracing::debug!(
                status,
                url = %final_url,
                body = %String::from_utf8_lossy(&body),
                "Received response"
            );
        }

        if let Some(err) = error_for_response(status, &body) {
            return Err(err);
        }

        if let Some(path) = options.output_path.as_deref() {
            tokio::fs::write(path, &body).await?;
        }

        Ok(Response {
            status,
            headers,
            url: final_url,
            body,
            forced_content_type: options.force_content_type.clone(),
            trace: options.enable_trace.then(|| TraceInfo {
                total: started.elapsed(),
                attempt: 0,
            }),
        })
    }
}
