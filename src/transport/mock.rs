//! Mock transport for testing.
//!
//! This module provides a scripted transport that can be used in tests and
//! demos to simulate server behavior without a network.

use crate::core::status::error_for_response;
use crate::core::{HttpError, RequestOptions, Response, TraceInfo, Transport};

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// A scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer with a status code and body.
    Status {
        /// Status code.
        code: u16,
        /// Response body.
        body: Bytes,
    },
    /// Fail the round-trip before any response.
    TransportError(String),
}

impl MockReply {
    /// A reply with the given status and an empty body.
    pub fn status(code: u16) -> Self {
        Self::Status {
            code,
            body: Bytes::new(),
        }
    }

    /// A reply with the given status and body.
    pub fn with_body(code: u16, body: impl Into<Bytes>) -> Self {
        Self::Status {
            code,
            body: body.into(),
        }
    }
}

/// A transport that answers from a script.
///
/// Replies are looked up by the resolved URL, falling back to a default
/// (200 with an empty body unless configured).
///
/// # Examples
///
/// ```rust
/// use httpbridge::transport::{MockReply, MockTransport};
/// use std::time::Duration;
///
/// // Fails twice with 503, then answers 200
/// let transport = MockTransport::new().fail_times(2, 503);
///
/// // Per-URL replies with simulated latency
/// let transport = MockTransport::new()
///     .with_route("http://api.local/users", MockReply::with_body(200, "[]"))
///     .with_latency(Duration::from_millis(10));
/// ```
#[derive(Debug)]
pub struct MockTransport {
    /// Replies keyed by resolved URL.
    routes: RwLock<HashMap<String, MockReply>>,
    /// Reply for URLs without a route.
    default_reply: RwLock<MockReply>,
    /// Status returned by the next N calls before the script applies.
    fail_status: u16,
    fail_remaining: AtomicU32,
    /// Simulated latency per round-trip.
    latency: Option<Duration>,
    /// Total calls.
    call_count: AtomicU64,
    /// Calls per URL.
    url_calls: RwLock<HashMap<String, u64>>,
}

impl MockTransport {
    /// Creates a transport that answers 200 to everything.
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            default_reply: RwLock::new(MockReply::status(200)),
            fail_status: 500,
            fail_remaining: AtomicU32::new(0),
            latency: None,
            call_count: AtomicU64::new(0),
            url_calls: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the status of the default reply.
    pub fn with_default_status(self, code: u16) -> Self {
        self.set_default_reply(MockReply::status(code));
        self
    }

    /// Sets the default reply.
    pub fn with_default_reply(self, reply: MockReply) -> Self {
        self.set_default_reply(reply);
        self
    }

    /// Adds a reply for a specific URL.
    pub fn with_route(self, url: impl Into<String>, reply: MockReply) -> Self {
        self.add_route(url, reply);
        self
    }

    /// Answers the next `times` calls with `status` before the script applies.
    pub fn fail_times(mut self, times: u32, status: u16) -> Self {
        self.fail_status = status;
        self.fail_remaining = AtomicU32::new(times);
        self
    }

    /// Sets the simulated latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Replaces the default reply (mutable version).
    pub fn set_default_reply(&self, reply: MockReply) {
        *self
            .default_reply
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = reply;
    }

    /// Adds a reply for a specific URL (mutable version).
    pub fn add_route(&self, url: impl Into<String>, reply: MockReply) {
        self.routes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(url.into(), reply);
    }

    /// Returns the total number of round-trips.
    pub fn calls(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Returns the number of round-trips to `url`.
    pub fn calls_for(&self, url: &str) -> u64 {
        self.url_calls
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    fn take_scripted_failure(&self) -> bool {
        self.fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn reply_for(&self, url: &str) -> MockReply {
        if self.take_scripted_failure() {
            return MockReply::status(self.fail_status);
        }
        let routed = self
            .routes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(url)
            .cloned();
        routed.unwrap_or_else(|| {
            self.default_reply
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        })
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, url: &str, options: &RequestOptions) -> Result<Response, HttpError> {
        let started = Instant::now();
        let url = options.expand_path(url);

        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .url_calls
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(url.clone())
            .or_insert(0) += 1;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let (code, body) = match self.reply_for(&url) {
            MockReply::TransportError(message) => return Err(HttpError::transport(message)),
            MockReply::Status { code, body } => (code, body),
        };

        if let Some(err) = error_for_response(code, &body) {
            return Err(err);
        }

        let mut response = Response::new(code, body).with_url(url);
        response.forced_content_type = options.force_content_type.clone();
        if options.enable_trace {
            response.trace = Some(TraceInfo {
                total: started.elapsed(),
                attempt: 0,
            });
        }
        Ok(response)
    }
}
