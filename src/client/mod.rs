//! Single-endpoint HTTP client.
//!
//! [`HttpClient`] resolves request URLs against its base URL, guards each
//! resolved URL with its own circuit breaker (when enabled), and retries
//! failed round-trips with randomized exponential backoff.

pub mod backoff;
mod config;
mod http_client;
pub mod retry;

pub use backoff::{backoff_delay, DEFAULT_RETRY_MAX_WAIT, DEFAULT_RETRY_WAIT};
pub use config::{ClientConfig, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT};
pub use http_client::HttpClient;
pub(crate) use http_client::with_body;
pub use retry::{execute_with_retry, RetryPolicy};
