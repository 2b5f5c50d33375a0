//! # Httpbridge
//!
//! An HTTP client layer with retries, per-endpoint circuit breakers, and
//! fan-out across multiple backend instances.
//!
//! ## Overview
//!
//! Httpbridge wraps a single-round-trip transport in a request pipeline,
//! allowing you to:
//!
//! - Retry failed requests with randomized exponential backoff
//! - Stop hammering a failing endpoint with a circuit breaker per URL
//! - Send one request to many backends and track which of them are broken
//! - Cancel any request, including its backoff waits, with one token
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use httpbridge::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::new(
//!         ClientConfig::new()
//!             .with_base_url("https://api.local")
//!             .with_circuit_breaker(true),
//!     )?;
//!
//!     let cancel = CancellationToken::new();
//!     let opts = RequestOptions::new().name("users").retries(3);
//!     let response = client.request(&cancel, "/users", &opts).await?;
//!
//!     println!("{}", response.text());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - Includes the reqwest transport
//! - `reqwest-transport` - [`transport::ReqwestTransport`] and [`HttpClient::new`]
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! - **Core**: Request options, responses, the transport trait, status classification, errors
//! - **Transport**: reqwest-backed and scripted transports
//! - **Circuit Breaker**: Per-endpoint breakers and their registry
//! - **Client**: URL resolution, backoff, and the retry executor
//! - **Fanout**: Concurrent dispatch across several clients with broken tracking

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod circuit_breaker;
pub mod client;
pub mod core;
pub mod fanout;
pub mod transport;

// Re-export commonly used types at the crate root
pub use crate::core::{
    ErrorList, HttpError, HttpResult, RequestBody, RequestOptions, Response, Transport,
};

pub use crate::circuit_breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerConfig};
pub use crate::client::{ClientConfig, HttpClient};
pub use crate::fanout::{ClientSet, Fanout, FanoutError};

pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports.
///
/// ```rust
/// use httpbridge::prelude::*;
/// ```
pub mod prelude {
    pub use crate::circuit_breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerConfig};
    pub use crate::client::{ClientConfig, HttpClient};
    pub use crate::core::{
        ErrorList, HttpError, HttpResult, RequestBody, RequestOptions, Response, Transport,
    };
    pub use crate::fanout::{ClientFailure, ClientSet, Fanout, FanoutError};
    pub use tokio_util::sync::CancellationToken;
}
