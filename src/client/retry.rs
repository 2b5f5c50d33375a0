//! Retry executor.
//!
//! Dispatches a request through a [`Transport`], retrying failed attempts
//! with randomized exponential backoff until the budget is spent, the
//! request succeeds, or the caller cancels.

use crate::client::backoff::{backoff_delay, DEFAULT_RETRY_MAX_WAIT, DEFAULT_RETRY_WAIT};
use crate::core::{ErrorList, HttpError, HttpResult, RequestOptions, Response, Transport};

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry policy resolved from a request's options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total dispatches allowed; `None` retries until success or cancellation.
    pub budget: Option<u32>,
    /// Starting wait between retries.
    pub min_wait: Duration,
    /// Maximum wait between retries.
    pub max_wait: Duration,
    /// Only 5xx failures are retried.
    pub only_server_errors: bool,
    /// Suppress retry warnings.
    pub quiet: bool,
}

impl RetryPolicy {
    /// Resolves the policy for `options`, applying the default waits.
    pub fn from_options(options: &RequestOptions) -> Self {
        Self {
            budget: if options.infinite_retry {
                None
            } else {
                Some(options.retry_count)
            },
            min_wait: options
                .retry_wait_time
                .filter(|d| !d.is_zero())
                .unwrap_or(DEFAULT_RETRY_WAIT),
            max_wait: options
                .retry_max_wait_time
                .filter(|d| !d.is_zero())
                .unwrap_or(DEFAULT_RETRY_MAX_WAIT),
            only_server_errors: options.retry_only_server_errors,
            quiet: options.no_log_retry_error,
        }
    }

    /// Returns `true` if `err` from the first dispatch should be retried.
    pub fn should_retry(&self, err: &HttpError) -> bool {
        if self.budget == Some(0) {
            return false;
        }
        !(self.only_server_errors && !err.is_server_error())
    }
}

/// Sends `options` to `url`, retrying according to the request's policy.
///
/// # Errors
///
/// - `Request` - the first dispatch failed and was not eligible for retry.
/// - `RetriesExhausted` - every dispatch failed; holds all failures in order.
/// - `Cancelled` - `cancel` fired; holds the failures seen until then.
pub async fn execute_with_retry(
    transport: &dyn Transport,
    cancel: &CancellationToken,
    url: &str,
    options: &RequestOptions,
) -> HttpResult<Response> {
    let policy = RetryPolicy::from_options(options);
    let name = options.name_or_empty();
    let mut errors = ErrorList::new();

    let first = match dispatch(transport, cancel, url, options, 0, &mut errors).await? {
        Ok(response) => return Ok(response),
        Err(err) => err,
    };

    if !policy.should_retry(&first) {
        return Err(HttpError::Request {
            name: name.to_string(),
            source: Box::new(first),
        });
    }

    if !policy.quiet {
        let retries = policy
            .budget
            .map_or_else(|| "infinite".to_string(), |n| n.to_string());
        tracing::warn!(
            request = name,
            retries = %retries,
            address = url,
            error = %first,
            "Request failed, retrying"
        );
    }
    errors.push(first);

    let mut attempt: u32 = 1;
    while policy.budget.map_or(true, |budget| attempt < budget) {
        let delay = backoff_delay(attempt, policy.min_wait, policy.max_wait);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HttpError::Cancelled { errors }),
            _ = tokio::time::sleep(delay) => {}
        }

        match dispatch(transport, cancel, url, options, attempt, &mut errors).await? {
            Ok(response) => return Ok(response),
            Err(err) => {
                if !policy.quiet {
                    tracing::warn!(
                        request = name,
                        retry = attempt,
                        address = url,
                        error = %err,
                        "Retry failed"
                    );
                }
                errors.push(err);
            }
        }
        attempt = attempt.saturating_add(1);
    }

    Err(HttpError::RetriesExhausted {
        name: name.to_string(),
        errors,
    })
}

/// One round-trip raced against cancellation.
///
/// The outer `Err` is the terminal cancellation error; the inner result is
/// the attempt's own outcome.
async fn dispatch(
    transport: &dyn Transport,
    cancel: &CancellationToken,
    url: &str,
    options: &RequestOptions,
    attempt: u32,
    errors: &mut ErrorList,
) -> Result<HttpResult<Response>, HttpError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HttpError::Cancelled {
            errors: std::mem::take(errors),
        }),
        result = transport.execute(url, options) => Ok(result.map(|mut response| {
            if let Some(trace) = response.trace.as_mut() {
                trace.attempt = attempt;
            }
            response
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn fast(options: RequestOptions) -> RequestOptions {
        options.retry_wait(Duration::from_millis(1), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_success_without_retry() {
        let transport = MockTransport::new();
        let cancel = CancellationToken::new();

        let resp = execute_with_retry(&transport, &cancel, "http://a/x", &RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_retry_wraps_error() {
        let transport = MockTransport::new().with_default_status(500);
        let cancel = CancellationToken::new();

        let err = execute_with_retry(
            &transport,
            &cancel,
            "http://a/x",
            &RequestOptions::new().name("users"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, HttpError::Request { .. }));
        assert!(err.is_server_error());
        assert!(err.to_string().starts_with("failed users request"));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let transport = MockTransport::new().fail_times(2, 503);
        let cancel = CancellationToken::new();

        let resp = execute_with_retry(
            &transport,
            &cancel,
            "http://a/x",
            &fast(RequestOptions::new().retries(5)),
        )
        .await
        .unwrap();

        assert!(resp.is_success());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_collects_every_error() {
        let transport = MockTransport::new().with_default_status(502);
        let cancel = CancellationToken::new();

        let err = execute_with_retry(
            &transport,
            &cancel,
            "http://a/x",
            &fast(RequestOptions::new().retries(3).quiet_retries(true)),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, HttpError::RetriesExhausted { .. }));
        assert_eq!(err.errors().len(), 3);
        assert_eq!(transport.calls(), 3);
        assert!(err.to_string().contains("after retries"));
    }

    #[tokio::test]
    async fn test_retry_only_server_errors_skips_client_errors() {
        let transport = MockTransport::new().with_default_status(400);
        let cancel = CancellationToken::new();

        let err = execute_with_retry(
            &transport,
            &cancel,
            "http://a/x",
            &fast(RequestOptions::new().retries(4).retry_only_server_errors(true)),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, HttpError::Request { .. }));
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_only_server_errors_retries_5xx() {
        let transport = MockTransport::new().fail_times(1, 500);
        let cancel = CancellationToken::new();

        execute_with_retry(
            &transport,
            &cancel,
            "http://a/x",
            &fast(RequestOptions::new().retries(2).retry_only_server_errors(true)),
        )
        .await
        .unwrap();

        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_returns_promptly() {
        let transport = MockTransport::new().with_default_status(500);
        let cancel = CancellationToken::new();
        let options = RequestOptions::new()
            .retries(10)
            .retry_wait(Duration::from_secs(30), Duration::from_secs(60));

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let err = execute_with_retry(&transport, &cancel, "http://a/x", &options)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.errors().len(), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_infinite_retry_stops_on_cancel() {
        let transport = MockTransport::new().with_default_status(503);
        let cancel = CancellationToken::new();
        let options = fast(RequestOptions::new().infinite_retry(true).quiet_retries(true));

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = execute_with_retry(&transport, &cancel, "http://a/x", &options)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(transport.calls() > 1);
        assert_eq!(err.errors().len() as u64, transport.calls());
    }

    #[tokio::test]
    async fn test_infinite_retry_until_success() {
        let transport = MockTransport::new().fail_times(4, 500);
        let cancel = CancellationToken::new();
        let options = fast(RequestOptions::new().infinite_retry(true));

        let resp = execute_with_retry(&transport, &cancel, "http://a/x", &options)
            .await
            .unwrap();

        assert!(resp.is_success());
        assert_eq!(transport.calls(), 5);
    }

    #[tokio::test]
    async fn test_options_not_mutated() {
        let transport = MockTransport::new().fail_times(1, 500);
        let cancel = CancellationToken::new();
        let options = fast(RequestOptions::new().retries(2));
        let before = format!("{options:?}");

        execute_with_retry(&transport, &cancel, "http://a/x", &options)
            .await
            .unwrap();

        assert_eq!(format!("{options:?}"), before);
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::from_options(&RequestOptions::new());
        assert_eq!(policy.budget, Some(0));
        assert_eq!(policy.min_wait, DEFAULT_RETRY_WAIT);
        assert_eq!(policy.max_wait, DEFAULT_RETRY_MAX_WAIT);
        assert!(!policy.should_retry(&HttpError::status(500, None)));

        let policy = RetryPolicy::from_options(&RequestOptions::new().infinite_retry(true));
        assert_eq!(policy.budget, None);
        assert!(policy.should_retry(&HttpError::transport("reset")));
    }
}
