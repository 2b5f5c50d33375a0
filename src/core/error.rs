//! Error types for the httpbridge library.
//!
//! Every failure on the request path is a typed `HttpError`. Classification
//! (server error, numeric status code, circuit open) is queried through
//! methods rather than by parsing message text.

use crate::core::status;

use std::fmt;
use thiserror::Error;

/// The main error type for request operations.
#[derive(Debug, Error)]
pub enum HttpError {
    /// A single round-trip failed at the network level.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure (connection refused, timeout, TLS, ...).
        message: String,
    },

    /// The server answered with a non-2xx status.
    #[error("{}", format_status(*code, *reason, message.as_deref()))]
    Status {
        /// Numeric status code used for classification.
        code: u16,
        /// Reason phrase for the code, if it is a known one.
        reason: Option<&'static str>,
        /// Best-effort message extracted from the response body.
        message: Option<String>,
    },

    /// A named request failed without being retried.
    #[error("failed {}request: {source}", request_label(name))]
    Request {
        /// Request name used in logs (may be empty).
        name: String,
        /// The underlying failure.
        #[source]
        source: Box<HttpError>,
    },

    /// Every attempt of a retried request failed.
    #[error("failed {}request after retries, got errors: {errors}", request_label(name))]
    RetriesExhausted {
        /// Request name used in logs (may be empty).
        name: String,
        /// Every failure observed, in attempt order.
        errors: ErrorList,
    },

    /// The caller cancelled the request while it was being retried.
    #[error("request canceled, got errors: {errors}")]
    Cancelled {
        /// Failures observed before cancellation.
        errors: ErrorList,
    },

    /// The circuit breaker for the endpoint rejected the call without attempting it.
    #[error("circuit breaker is open for '{endpoint}'")]
    CircuitOpen {
        /// Endpoint key of the breaker.
        endpoint: String,
        /// When the circuit might close (if known).
        recovery_hint: Option<String>,
    },

    /// A client configuration in a batch was rejected.
    #[error("client {index}: {source}")]
    InvalidClient {
        /// Ordinal of the rejected configuration within the batch.
        index: usize,
        /// Why it was rejected.
        #[source]
        source: Box<HttpError>,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An I/O error occurred (reading attachments, writing output files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A response body could not be decoded.
    #[error("decode error: {message}")]
    Decode {
        /// Description of the decoding failure.
        message: String,
    },
}

fn request_label(name: &str) -> String {
    if name.is_empty() {
        String::new()
    } else {
        format!("{name} ")
    }
}

fn format_status(code: u16, reason: Option<&str>, message: Option<&str>) -> String {
    let head = match reason {
        Some(reason) => format!("code {code}, {reason}"),
        None => format!("code {code}"),
    };
    match message {
        Some(message) => format!("{head}: {message}"),
        None => head,
    }
}

impl HttpError {
    /// Returns `true` if this error stems from an HTTP 5xx response.
    ///
    /// Wrappers are unwrapped; an aggregate is a server error if any of its
    /// members is one.
    pub fn is_server_error(&self) -> bool {
        match self {
            Self::Status { code, .. } => status::classify(*code).is_server_error(),
            Self::Request { source, .. } | Self::InvalidClient { source, .. } => {
                source.is_server_error()
            }
            Self::RetriesExhausted { errors, .. } | Self::Cancelled { errors } => {
                errors.iter().any(HttpError::is_server_error)
            }
            _ => false,
        }
    }

    /// Returns the numeric status code underlying this error, if any.
    ///
    /// For aggregates this is the code of the first member that carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            Self::Request { source, .. } | Self::InvalidClient { source, .. } => {
                source.status_code()
            }
            Self::RetriesExhausted { errors, .. } | Self::Cancelled { errors } => {
                errors.iter().find_map(HttpError::status_code)
            }
            _ => None,
        }
    }

    /// Returns `true` if the call was rejected by an open circuit.
    pub fn is_circuit_open(&self) -> bool {
        match self {
            Self::CircuitOpen { .. } => true,
            Self::Request { source, .. } => source.is_circuit_open(),
            _ => false,
        }
    }

    /// Returns `true` if the request was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns the individual failures of an aggregate error.
    ///
    /// Non-aggregate errors return an empty slice.
    pub fn errors(&self) -> &[HttpError] {
        match self {
            Self::RetriesExhausted { errors, .. } | Self::Cancelled { errors } => errors.as_slice(),
            _ => &[],
        }
    }

    /// Creates a `Transport` error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a `Status` error for the given code, filling in the reason phrase.
    pub fn status(code: u16, message: Option<String>) -> Self {
        Self::Status {
            code,
            reason: status::reason(code),
            message,
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a `Decode` error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// An ordered collection of errors, displayed one per line.
#[derive(Debug, Default)]
pub struct ErrorList(Vec<HttpError>);

impl ErrorList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an error.
    pub fn push(&mut self, error: HttpError) {
        self.0.push(error);
    }

    /// Returns the number of errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no errors were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the errors in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, HttpError> {
        self.0.iter()
    }

    /// Returns the errors as a slice.
    pub fn as_slice(&self) -> &[HttpError] {
        &self.0
    }

    /// Returns the most recent error.
    pub fn last(&self) -> Option<&HttpError> {
        self.0.last()
    }

    /// Consumes the list and returns the errors.
    pub fn into_vec(self) -> Vec<HttpError> {
        self.0
    }
}

impl From<Vec<HttpError>> for ErrorList {
    fn from(errors: Vec<HttpError>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a HttpError;
    type IntoIter = std::slice::Iter<'a, HttpError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A specialized `Result` type for request operations.
pub type HttpResult<T> = Result<T, HttpError>;
