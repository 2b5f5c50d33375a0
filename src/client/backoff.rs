//! Randomized exponential backoff.

use rand::Rng;
use std::time::Duration;

/// Starting wait between retries when none is configured.
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(1);

/// Upper bound on the wait between retries when none is configured.
pub const DEFAULT_RETRY_MAX_WAIT: Duration = Duration::from_secs(10);

// 2^62 keeps the float finite for any realistic `min`.
const MAX_EXPONENT: u32 = 62;

/// Returns the wait before retry number `attempt` (1-based).
///
/// The wait is drawn uniformly from `[min, min * 2^attempt)` and clamped to
/// `max`. A `max` below `min` is raised to `min`, so the result always lies
/// in `[min, max]`.
pub fn backoff_delay(attempt: u32, min: Duration, max: Duration) -> Duration {
    let max = max.max(min);
    let min_secs = min.as_secs_f64();
    let max_secs = max.as_secs_f64();

    let base = min_secs * 2f64.powi(attempt.min(MAX_EXPONENT) as i32);
    let jitter: f64 = rand::thread_rng().gen();
    let secs = min_secs + (base - min_secs) * jitter;

    // `max_secs` rounds up past `Duration::MAX` when `max` is near it.
    Duration::try_from_secs_f64(secs.min(max_secs).max(min_secs)).unwrap_or(max)
}
