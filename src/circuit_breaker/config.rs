//! Breaker tuning knobs.

use std::time::Duration;

/// Default consecutive failures before a circuit opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time a circuit stays open before admitting a trial call.
pub const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(30);

/// Thresholds shared by every breaker a registry creates.
///
/// Counts are clamped to at least one by the `with_*` setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed calls that trip a closed circuit.
    pub failure_threshold: u32,
    /// Open window before a trial call is let through.
    pub open_duration: Duration,
    /// Successful trials needed to close a half-open circuit.
    pub trials_to_close: u32,
    /// Trial calls allowed in flight while half-open.
    pub max_trials: u32,
}

impl CircuitBreakerConfig {
    /// The default thresholds.
    pub fn new() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            open_duration: DEFAULT_OPEN_DURATION,
            trials_to_close: 1,
            max_trials: 1,
        }
    }

    /// Trip after `failures` consecutive failed calls.
    pub fn with_failure_threshold(self, failures: u32) -> Self {
        Self {
            failure_threshold: failures.max(1),
            ..self
        }
    }

    /// Stay open for `open_for` before trialling.
    pub fn with_open_duration(self, open_for: Duration) -> Self {
        Self {
            open_duration: open_for,
            ..self
        }
    }

    /// Close after `trials` successful trial calls.
    pub fn with_trials_to_close(self, trials: u32) -> Self {
        Self {
            trials_to_close: trials.max(1),
            ..self
        }
    }

    /// Allow up to `trials` concurrent trial calls.
    pub fn with_max_trials(self, trials: u32) -> Self {
        Self {
            max_trials: trials.max(1),
            ..self
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::new()
    }
}
