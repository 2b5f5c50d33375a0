//! Response type returned by transports.

use crate::core::error::HttpError;

use bytes::Bytes;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Timing information recorded when tracing is enabled for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceInfo {
    /// Time from dispatch until the full body was read.
    pub total: Duration,
    /// Zero-based dispatch number that produced the response.
    pub attempt: u32,
}

/// A completed HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Final URL (after redirects).
    pub url: String,
    /// Response body.
    pub body: Bytes,
    /// Content type forced by the request options, overriding the header.
    pub forced_content_type: Option<String>,
    /// Timing information, if tracing was enabled.
    pub trace: Option<TraceInfo>,
}

impl Response {
    /// Creates a response with the given status and body.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            url: String::new(),
            body: body.into(),
            forced_content_type: None,
            trace: None,
        }
    }

    /// Sets the final URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the effective content type.
    pub fn content_type(&self) -> Option<&str> {
        if let Some(forced) = self.forced_content_type.as_deref() {
            return Some(forced);
        }
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Returns the body as UTF-8 text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::decode(e.to_string()))
    }
}
