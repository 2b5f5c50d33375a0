//! Transport implementations.
//!
//! A transport performs exactly one HTTP round-trip; retrying and circuit
//! breaking are layered on top by [`HttpClient`](crate::client::HttpClient).
//!
//! ## Available Transports
//!
//! - [`mock`] - A scripted transport for tests and demos
//! - [`reqwest_transport`] - reqwest-backed transport (requires `reqwest-transport` feature)
//!
//! ## Implementing a Custom Transport
//!
//! ```rust,ignore
//! use httpbridge::core::{HttpError, RequestOptions, Response, Transport};
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! pub struct MyTransport;
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn execute(&self, url: &str, options: &RequestOptions) -> Result<Response, HttpError> {
//!         // Perform the round-trip
//!         todo!()
//!     }
//! }
//! ```

pub mod mock;

#[cfg(feature = "reqwest-transport")]
pub mod reqwest_transport;

pub use mock::{MockReply, MockTransport};

#[cfg(feature = "reqwest-transport")]
pub use reqwest_transport::ReqwestTransport;
