//! Breaker state and counters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Where a circuit breaker currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass through; consecutive failures are counted.
    Closed {
        /// Failures since the last success.
        consecutive_failures: u32,
    },

    /// Calls are rejected until `retry_at`.
    Open {
        /// When the circuit tripped.
        opened_at: Instant,
        /// When the next call is admitted as a trial.
        retry_at: Instant,
    },

    /// Trial calls are being admitted to test recovery.
    HalfOpen {
        /// Trials that succeeded so far.
        successes: u32,
        /// Trials currently running.
        in_flight: u32,
    },
}

impl BreakerState {
    /// A closed circuit with no recorded failures.
    pub fn closed() -> Self {
        Self::Closed {
            consecutive_failures: 0,
        }
    }

    /// An open circuit that admits a trial after `open_for`.
    pub fn open_for(open_for: Duration) -> Self {
        let now = Instant::now();
        Self::Open {
            opened_at: now,
            retry_at: now + open_for,
        }
    }

    /// Returns `true` if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Returns `true` if the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Returns `true` if the circuit is half-open.
    pub fn is_half_open(&self) -> bool {
        matches!(self, Self::HalfOpen { .. })
    }

    /// Consecutive failures, when closed.
    pub fn consecutive_failures(&self) -> Option<u32> {
        match self {
            Self::Closed {
                consecutive_failures,
            } => Some(*consecutive_failures),
            _ => None,
        }
    }

    /// Time left before an open circuit admits a trial.
    pub fn retry_in(&self, now: Instant) -> Option<Duration> {
        match self {
            Self::Open { retry_at, .. } => Some(retry_at.saturating_duration_since(now)),
            _ => None,
        }
    }

    /// Short lowercase name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed { .. } => "closed",
            Self::Open { .. } => "open",
            Self::HalfOpen { .. } => "half_open",
        }
    }
}

impl Default for BreakerState {
    fn default() -> Self {
        Self::closed()
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifetime counters of one breaker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerMetrics {
    /// Calls seen, rejected ones included.
    pub total_calls: u64,
    /// Calls that succeeded.
    pub successes: u64,
    /// Calls that failed.
    pub failures: u64,
    /// Calls turned away by an open circuit.
    pub rejections: u64,
    /// Transitions into the open state.
    pub times_opened: u64,
    /// Transitions from half-open back to closed.
    pub times_closed: u64,
}

impl BreakerMetrics {
    /// Zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_success(&mut self) {
        self.total_calls += 1;
        self.successes += 1;
    }

    pub(crate) fn record_failure(&mut self) {
        self.total_calls += 1;
        self.failures += 1;
    }

    pub(crate) fn record_rejection(&mut self) {
        self.total_calls += 1;
        self.rejections += 1;
    }

    /// Share of completed calls (successes plus failures) that failed.
    pub fn failure_rate(&self) -> f64 {
        let completed = self.successes + self.failures;
        if completed == 0 {
            return 0.0;
        }
        self.failures as f64 / completed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_closed() {
        let state = BreakerState::default();
        assert!(state.is_closed());
        assert_eq!(state.consecutive_failures(), Some(0));
        assert_eq!(state.to_string(), "closed");
    }

    #[test]
    fn test_open_for_reports_retry_time() {
        let state = BreakerState::open_for(Duration::from_secs(10));
        assert!(state.is_open());
        assert_eq!(state.name(), "open");
        assert_eq!(state.consecutive_failures(), None);

        let left = state.retry_in(Instant::now()).unwrap();
        assert!(left <= Duration::from_secs(10));
        assert!(left > Duration::from_secs(9));

        assert!(BreakerState::closed().retry_in(Instant::now()).is_none());
    }

    #[test]
    fn test_half_open_name() {
        let state = BreakerState::HalfOpen {
            successes: 0,
            in_flight: 1,
        };
        assert!(state.is_half_open());
        assert_eq!(state.to_string(), "half_open");
    }

    #[test]
    fn test_failure_rate_ignores_rejections() {
        let mut metrics = BreakerMetrics::new();
        assert_eq!(metrics.failure_rate(), 0.0);

        metrics.record_success();
        metrics.record_failure();
        metrics.record_rejection();
        metrics.record_rejection();

        assert_eq!(metrics.total_calls, 4);
        assert_eq!(metrics.rejections, 2);
        assert!((metrics.failure_rate() - 0.5).abs() < f64::EPSILON);
    }
}
