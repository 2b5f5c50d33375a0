//! Circuit breakers for endpoint resilience.
//!
//! The circuit breaker pattern prevents cascading failures by temporarily
//! stopping traffic to failing endpoints and periodically letting a trial
//! call through to detect recovery.
//!
//! ## States
//!
//! - **Closed**: Normal operation; calls pass through.
//! - **Open**: Endpoint is failing; calls are rejected immediately.
//! - **Half-Open**: One trial call is admitted to test recovery.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use httpbridge::circuit_breaker::{BreakerRegistry, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let registry = BreakerRegistry::new(
//!     CircuitBreakerConfig::default()
//!         .with_failure_threshold(5)
//!         .with_open_duration(Duration::from_secs(30)),
//! );
//!
//! let breaker = registry.get_or_create("http://api.local/users");
//! let value = breaker.call(|| async { Ok::<_, HttpError>(42) }).await?;
//! ```

mod breaker;
mod config;
mod registry;
mod state;

pub use breaker::CircuitBreaker;
pub use config::{CircuitBreakerConfig, DEFAULT_FAILURE_THRESHOLD, DEFAULT_OPEN_DURATION};
pub use registry::BreakerRegistry;
pub use state::{BreakerMetrics, BreakerState};
