//! The circuit breaker.

use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::circuit_breaker::state::{BreakerMetrics, BreakerState};
use crate::core::HttpError;

use std::fmt;
use std::future::Future;
use std::sync::{RwLock, RwLockWriteGuard};
use std::time::Instant;

/// A circuit breaker guarding one endpoint.
///
/// Each [`call`](CircuitBreaker::call) is one unit of work; for the HTTP
/// client that is a whole retried request, so one logical request counts
/// once no matter how many attempts it took.
///
/// # States
///
/// - **Closed**: calls pass through and consecutive failures are counted.
/// - **Open**: calls are rejected with [`HttpError::CircuitOpen`] without
///   running the work.
/// - **Half-Open**: one trial call is admitted; its outcome closes or
///   re-opens the circuit.
///
/// # Example
///
/// ```rust,ignore
/// use httpbridge::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
///
/// let breaker = CircuitBreaker::new("http://api.local/users", CircuitBreakerConfig::default());
/// let response = breaker.call(|| client.get(&cancel, "/users")).await?;
/// ```
pub struct CircuitBreaker {
    endpoint: String,
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
    metrics: RwLock<BreakerMetrics>,
}

impl CircuitBreaker {
    /// Creates a closed breaker for `endpoint`.
    pub fn new(endpoint: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
            state: RwLock::new(BreakerState::closed()),
            metrics: RwLock::new(BreakerMetrics::new()),
        }
    }

    /// Creates a closed breaker with the default configuration.
    pub fn with_defaults(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, CircuitBreakerConfig::default())
    }

    /// The endpoint key this breaker guards.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> BreakerState {
        *self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A snapshot of the counters.
    pub fn metrics(&self) -> BreakerMetrics {
        self.metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Trips the circuit regardless of its current state.
    pub fn force_open(&self) {
        *self.state_mut() = BreakerState::open_for(self.config.open_duration);
        self.metrics_mut().times_opened += 1;
    }

    /// Closes the circuit regardless of its current state.
    pub fn force_close(&self) {
        *self.state_mut() = BreakerState::closed();
        self.metrics_mut().times_closed += 1;
    }

    /// Closes the circuit and zeroes the counters.
    pub fn reset(&self) {
        *self.state_mut() = BreakerState::closed();
        *self.metrics_mut() = BreakerMetrics::new();
    }

    /// Runs `work` unless the circuit rejects it.
    ///
    /// A cancelled result counts as neither success nor failure. If the
    /// returned future is dropped early, a half-open trial slot it held is
    /// given back.
    ///
    /// # Errors
    ///
    /// Returns `CircuitOpen` without running `work` when rejected, and
    /// otherwise whatever `work` returns.
    pub async fn call<F, Fut, T>(&self, work: F) -> Result<T, HttpError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, HttpError>>,
    {
        let admission = match self.admit() {
            Ok(admission) => admission,
            Err(rejected) => {
                self.metrics_mut().record_rejection();
                return Err(rejected);
            }
        };

        let mut slot = TrialSlot {
            breaker: self,
            held: admission == Admission::Trial,
        };
        let result = work().await;
        slot.held = false;

        match &result {
            Ok(_) => self.on_success(),
            Err(e) if e.is_cancelled() => {
                if admission == Admission::Trial {
                    self.release_trial();
                }
            }
            Err(_) => self.on_failure(),
        }
        result
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, BreakerState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn metrics_mut(&self) -> RwLockWriteGuard<'_, BreakerMetrics> {
        self.metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn rejection(&self, hint: String) -> HttpError {
        HttpError::CircuitOpen {
            endpoint: self.endpoint.clone(),
            recovery_hint: Some(hint),
        }
    }

    fn admit(&self) -> Result<Admission, HttpError> {
        let mut state = self.state_mut();
        let now = Instant::now();

        match *state {
            BreakerState::Closed { .. } => Ok(Admission::Normal),

            BreakerState::Open { retry_at, .. } if now < retry_at => Err(self.rejection(
                format!("circuit may recover in {:?}", retry_at - now),
            )),

            BreakerState::Open { .. } => {
                tracing::debug!(endpoint = %self.endpoint, "Circuit half-open, admitting trial call");
                *state = BreakerState::HalfOpen {
                    successes: 0,
                    in_flight: 1,
                };
                Ok(Admission::Trial)
            }

            BreakerState::HalfOpen {
                successes,
                in_flight,
            } if in_flight < self.config.max_trials => {
                *state = BreakerState::HalfOpen {
                    successes,
                    in_flight: in_flight + 1,
                };
                Ok(Admission::Trial)
            }

            BreakerState::HalfOpen { .. } => {
                Err(self.rejection("trial call in progress".to_string()))
            }
        }
    }

    fn on_success(&self) {
        let mut state = self.state_mut();
        let mut metrics = self.metrics_mut();
        metrics.record_success();

        match *state {
            BreakerState::Closed { .. } => *state = BreakerState::closed(),

            BreakerState::HalfOpen {
                successes,
                in_flight,
            } => {
                if successes + 1 >= self.config.trials_to_close {
                    tracing::info!(endpoint = %self.endpoint, "Circuit closed");
                    *state = BreakerState::closed();
                    metrics.times_closed += 1;
                } else {
                    *state = BreakerState::HalfOpen {
                        successes: successes + 1,
                        in_flight: in_flight.saturating_sub(1),
                    };
                }
            }

            // Admitted before the circuit tripped; the open window stands.
            BreakerState::Open { .. } => {}
        }
    }

    fn on_failure(&self) {
        let mut state = self.state_mut();
        let mut metrics = self.metrics_mut();
        metrics.record_failure();

        match *state {
            BreakerState::Closed {
                consecutive_failures,
            } if consecutive_failures + 1 >= self.config.failure_threshold => {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    failures = consecutive_failures + 1,
                    open_for = ?self.config.open_duration,
                    "Circuit opened"
                );
                *state = BreakerState::open_for(self.config.open_duration);
                metrics.times_opened += 1;
            }

            BreakerState::Closed {
                consecutive_failures,
            } => {
                *state = BreakerState::Closed {
                    consecutive_failures: consecutive_failures + 1,
                };
            }

            BreakerState::HalfOpen { .. } => {
                tracing::warn!(endpoint = %self.endpoint, "Trial call failed, circuit re-opened");
                *state = BreakerState::open_for(self.config.open_duration);
                metrics.times_opened += 1;
            }

            BreakerState::Open { .. } => {}
        }
    }

    fn release_trial(&self) {
        let mut state = self.state_mut();
        if let BreakerState::HalfOpen {
            successes,
            in_flight,
        } = *state
        {
            *state = BreakerState::HalfOpen {
                successes,
                in_flight: in_flight.saturating_sub(1),
            };
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

/// Gives a trial slot back if the call is dropped mid-flight.
struct TrialSlot<'a> {
    breaker: &'a CircuitBreaker,
    held: bool,
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        if self.held {
            self.breaker.release_trial();
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorList;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    async fn fail(calls: &AtomicU32) -> Result<(), HttpError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(HttpError::status(500, None))
    }

    async fn succeed(calls: &AtomicU32) -> Result<(), HttpError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn quick_recovery() -> CircuitBreakerConfig {
        CircuitBreakerConfig::default().with_open_duration(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_closed_passes_through() {
        let breaker = CircuitBreaker::with_defaults("e");
        let calls = AtomicU32::new(0);

        breaker.call(|| succeed(&calls)).await.unwrap();

        assert!(breaker.state().is_closed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.metrics().successes, 1);
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_rejects_without_running() {
        let breaker =
            CircuitBreaker::new("e", CircuitBreakerConfig::default().with_failure_threshold(3));
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let _ = breaker.call(|| fail(&calls)).await;
        }
        assert!(breaker.state().is_open());
        assert_eq!(breaker.metrics().times_opened, 1);

        let err = breaker.call(|| succeed(&calls)).await.unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(breaker.metrics().rejections, 1);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let breaker =
            CircuitBreaker::new("e", CircuitBreakerConfig::default().with_failure_threshold(3));
        let calls = AtomicU32::new(0);

        let _ = breaker.call(|| fail(&calls)).await;
        let _ = breaker.call(|| fail(&calls)).await;
        breaker.call(|| succeed(&calls)).await.unwrap();
        let _ = breaker.call(|| fail(&calls)).await;
        let _ = breaker.call(|| fail(&calls)).await;

        assert_eq!(breaker.state().consecutive_failures(), Some(2));
    }

    #[tokio::test]
    async fn test_trial_success_closes() {
        let breaker = CircuitBreaker::new("e", quick_recovery());
        let calls = AtomicU32::new(0);

        breaker.force_open();
        tokio::time::sleep(Duration::from_millis(30)).await;

        breaker.call(|| succeed(&calls)).await.unwrap();
        assert!(breaker.state().is_closed());
        assert_eq!(breaker.metrics().times_closed, 1);
    }

    #[tokio::test]
    async fn test_trial_failure_reopens() {
        let breaker = CircuitBreaker::new(
            "e",
            CircuitBreakerConfig::default().with_open_duration(Duration::from_millis(50)),
        );
        let calls = AtomicU32::new(0);

        breaker.force_open();
        tokio::time::sleep(Duration::from_millis(80)).await;

        let err = breaker.call(|| fail(&calls)).await.unwrap_err();
        assert!(!err.is_circuit_open());
        assert!(breaker.state().is_open());

        let err = breaker.call(|| succeed(&calls)).await.unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_half_open_admits_single_trial() {
        let breaker = CircuitBreaker::new("e", quick_recovery());
        breaker.force_open();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let (release, wait) = tokio::sync::oneshot::channel::<()>();
        let trial = breaker.call(|| async move {
            let _ = wait.await;
            Ok::<_, HttpError>(())
        });
        let contender = async {
            tokio::task::yield_now().await;
            let res = breaker.call(|| async { Ok::<_, HttpError>(()) }).await;
            let _ = release.send(());
            res
        };

        let (first, second) = tokio::join!(trial, contender);

        assert!(first.is_ok());
        assert!(second.unwrap_err().is_circuit_open());
        assert!(breaker.state().is_closed());
    }

    #[tokio::test]
    async fn test_cancelled_trial_frees_slot() {
        let breaker = CircuitBreaker::new("e", quick_recovery());
        breaker.force_open();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let err = breaker
            .call(|| async {
                Err::<(), _>(HttpError::Cancelled {
                    errors: ErrorList::new(),
                })
            })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(breaker.state().is_half_open());
        assert_eq!(breaker.metrics().failures, 0);

        let calls = AtomicU32::new(0);
        breaker.call(|| succeed(&calls)).await.unwrap();
        assert!(breaker.state().is_closed());
    }

    #[tokio::test]
    async fn test_dropped_trial_frees_slot() {
        let breaker = CircuitBreaker::new("e", quick_recovery());
        breaker.force_open();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let stuck = breaker.call(std::future::pending::<Result<(), HttpError>>);
        let timed_out = tokio::time::timeout(Duration::from_millis(10), stuck).await;
        assert!(timed_out.is_err());

        let calls = AtomicU32::new(0);
        breaker.call(|| succeed(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_force_open_close_reset() {
        let breaker = CircuitBreaker::with_defaults("e");
        assert!(breaker.state().is_closed());

        breaker.force_open();
        assert!(breaker.state().is_open());

        breaker.force_close();
        assert!(breaker.state().is_closed());

        breaker.reset();
        assert_eq!(breaker.metrics(), BreakerMetrics::new());
    }
}
