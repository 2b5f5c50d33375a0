//! Registry of circuit breakers keyed by endpoint.

use crate::circuit_breaker::breaker::CircuitBreaker;
use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::circuit_breaker::state::BreakerState;

use dashmap::DashMap;
use std::sync::Arc;

/// Lazily creates and shares one [`CircuitBreaker`] per endpoint key.
///
/// Lookups for different keys never block each other. Two concurrent
/// `get_or_create` calls for the same new key observe the same breaker.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl BreakerRegistry {
    /// Creates an empty registry; new breakers use `config`.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    /// Returns the breaker for `endpoint`, creating it on first use.
    pub fn get_or_create(&self, endpoint: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(endpoint) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .breakers
            .entry(endpoint.to_string())
            .or_insert_with(|| {
                tracing::debug!(endpoint = %endpoint, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(endpoint, self.config.clone()))
            });
        Arc::clone(entry.value())
    }

    /// Returns the breaker for `endpoint` if one exists.
    pub fn get(&self, endpoint: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .get(endpoint)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the configuration new breakers are created with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Returns the number of tracked endpoints.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Returns `true` if no endpoint has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Snapshot of every breaker's state, sorted by endpoint.
    pub fn states(&self) -> Vec<(String, BreakerState)> {
        let mut states: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    /// Resets every breaker to closed.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }
}
