//! Core traits for the httpbridge library.
//!
//! This module defines the `Transport` trait: the single round-trip
//! capability the retry executor and circuit breakers are layered on.

use crate::core::error::HttpError;
use crate::core::options::RequestOptions;
use crate::core::response::Response;

use async_trait::async_trait;
use std::fmt::Debug;

/// Performs one HTTP round-trip.
///
/// Implementations carry no retry or breaker logic of their own. A non-2xx
/// response must be returned as a classified [`HttpError::Status`] (see
/// [`crate::core::status::error_for_response`]) so the retry executor can
/// decide whether it is worth retrying.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use httpbridge::core::{HttpError, RequestOptions, Response, Transport};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct Loopback;
///
/// #[async_trait]
/// impl Transport for Loopback {
///     async fn execute(&self, url: &str, _opts: &RequestOptions) -> Result<Response, HttpError> {
///         Ok(Response::new(200, url.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Sends one request to the fully resolved `url`.
    ///
    /// # Errors
    ///
    /// - `Transport` - the request could not be completed on the network.
    /// - `Status` - the server answered with a status of 400 or above.
    /// - `Io` - attachments could not be read or the output file written.
    async fn execute(&self, url: &str, options: &RequestOptions) -> Result<Response, HttpError>;
}

/// An arc-wrapped transport for shared ownership.
pub type ArcTransport = std::sync::Arc<dyn Transport>;
