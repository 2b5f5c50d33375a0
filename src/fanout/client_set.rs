//! The client set.

use crate::client::{with_body, ClientConfig, HttpClient};
use crate::core::{HttpError, RequestBody, RequestOptions};
use crate::fanout::outcome::{ClientFailure, Fanout, FanoutError};

use dashmap::DashSet;
use futures::future::join_all;
use http::Method;
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Sends the same request to several clients concurrently.
///
/// A client whose request fails is marked broken; a later success clears
/// the mark. Requests go only to healthy clients by default, and only to
/// broken ones through the view returned by [`use_broken`](Self::use_broken).
#[derive(Debug, Clone, Default)]
pub struct ClientSet {
    clients: Vec<Arc<HttpClient>>,
    broken: Arc<DashSet<usize>>,
    use_broken: bool,
}

impl ClientSet {
    /// Creates a set from already-built clients.
    pub fn new(clients: impl IntoIterator<Item = HttpClient>) -> Self {
        Self {
            clients: clients.into_iter().map(Arc::new).collect(),
            ..Self::default()
        }
    }

    /// Creates a set with one reqwest-backed client per configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` naming the first configuration that failed.
    pub fn from_configs(configs: impl IntoIterator<Item = ClientConfig>) -> Result<Self, HttpError> {
        let mut set = Self::default();
        set.add(configs)?;
        Ok(set)
    }

    /// Builds one reqwest-backed client per configuration and appends them.
    ///
    /// Nothing is appended unless every configuration is valid.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` with the ordinal of the failing configuration
    /// within `configs`.
    pub fn add(&mut self, configs: impl IntoIterator<Item = ClientConfig>) -> Result<(), HttpError> {
        self.add_with(configs, HttpClient::new)
    }

    /// Like [`add`](Self::add), building each client with `build`.
    pub fn add_with<F>(
        &mut self,
        configs: impl IntoIterator<Item = ClientConfig>,
        mut build: F,
    ) -> Result<(), HttpError>
    where
        F: FnMut(ClientConfig) -> Result<HttpClient, HttpError>,
    {
        let built = configs
            .into_iter()
            .enumerate()
            .map(|(index, config)| {
                build(config).map_err(|source| HttpError::InvalidClient {
                    index,
                    source: Box::new(source),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.clients.extend(built.into_iter().map(Arc::new));
        Ok(())
    }

    /// Returns a view that dispatches only to broken clients, or `None` if
    /// no client is broken.
    ///
    /// The view shares the broken set: a success through it clears the mark
    /// for the original set too.
    pub fn use_broken(&self) -> Option<ClientSet> {
        if self.broken.is_empty() {
            return None;
        }
        Some(Self {
            clients: self.clients.clone(),
            broken: Arc::clone(&self.broken),
            use_broken: true,
        })
    }

    /// Returns `true` if this is a broken-only view.
    pub fn is_broken_view(&self) -> bool {
        self.use_broken
    }

    /// Indices of broken clients, sorted.
    pub fn broken(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.broken.iter().map(|i| *i).collect();
        indices.sort_unstable();
        indices
    }

    /// Clears the broken mark of the given clients.
    pub fn delete_broken(&self, indices: &[usize]) {
        for index in indices {
            self.broken.remove(index);
        }
    }

    /// Returns the client at `index`.
    pub fn client(&self, index: usize) -> Option<&Arc<HttpClient>> {
        self.clients.get(index)
    }

    /// Returns the number of clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if the set has no clients.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Sends the request through every selected client concurrently.
    ///
    /// Each client runs its own retry and breaker pipeline. Results are
    /// attributed by client index regardless of completion order. Dropping
    /// the returned future aborts the requests still in flight and leaves
    /// the broken set untouched.
    pub async fn request(
        &self,
        cancel: &CancellationToken,
        url: &str,
        options: &RequestOptions,
    ) -> Fanout {
        self.dispatch(cancel, url, options, false).await
    }

    async fn dispatch(
        &self,
        cancel: &CancellationToken,
        url: &str,
        options: &RequestOptions,
        needs_base_url: bool,
    ) -> Fanout {
        let selected: Vec<usize> = (0..self.clients.len())
            .filter(|index| self.broken.contains(index) == self.use_broken)
            .collect();

        let tasks: Vec<_> = selected
            .iter()
            .map(|&index| {
                let client = Arc::clone(&self.clients[index]);
                let cancel = cancel.clone();
                let url = url.to_string();
                let options = options.clone();
                tokio::spawn(async move {
                    if needs_base_url && client.base_url().is_none() {
                        return Err(HttpError::configuration("client has no base URL"));
                    }
                    client.request(&cancel, &url, &options).await
                })
            })
            .collect();

        let _in_flight = AbortOnDrop(tasks.iter().map(JoinHandle::abort_handle).collect());
        let outcomes = join_all(tasks).await;

        let mut responses = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (index, outcome) in selected.into_iter().zip(outcomes) {
            let result = outcome.unwrap_or_else(|e| {
                tracing::error!(client = index, error = %e, "Client request task panicked");
                Err(HttpError::transport(format!("request task failed: {e}")))
            });

            match result {
                Ok(response) => {
                    self.broken.remove(&index);
                    responses.push((index, response));
                }
                Err(error) => {
                    // Cancellation says nothing about the client's health.
                    if !error.is_cancelled() {
                        self.broken.insert(index);
                    }
                    tracing::debug!(client = index, error = %error, "Client request failed");
                    failures.push(ClientFailure { index, error });
                }
            }
        }

        Fanout {
            responses,
            error: (!failures.is_empty()).then_some(FanoutError { failures }),
        }
    }

    /// POSTs `body` to each selected client's base URL.
    ///
    /// # Errors
    ///
    /// Returns every per-client failure. A client without a base URL fails
    /// with `Configuration` and is never dispatched.
    pub async fn send(
        &self,
        cancel: &CancellationToken,
        body: impl Into<RequestBody>,
        query: &[&str],
    ) -> Result<(), FanoutError> {
        let options = with_body(Method::POST, body, query);
        self.dispatch(cancel, "", &options, true)
            .await
            .into_result()
            .map(|_| ())
    }

    /// Sends a request with the given method and optional body.
    pub async fn req(
        &self,
        cancel: &CancellationToken,
        method: Method,
        url: &str,
        body: Option<RequestBody>,
    ) -> Fanout {
        let mut options = RequestOptions::with_method(method);
        options.body = body;
        self.request(cancel, url, &options).await
    }

    /// Sends a GET request.
    pub async fn get(&self, cancel: &CancellationToken, url: &str) -> Fanout {
        self.request(cancel, url, &RequestOptions::new()).await
    }

    /// Sends a GET request with query pairs.
    pub async fn get_query(&self, cancel: &CancellationToken, url: &str, query: &[&str]) -> Fanout {
        self.request(cancel, url, &RequestOptions::new().query_pairs(query))
            .await
    }

    /// Sends a POST request.
    pub async fn post(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: impl Into<RequestBody>,
    ) -> Fanout {
        self.request(cancel, url, &with_body(Method::POST, body, &[]))
            .await
    }

    /// Sends a POST request with query pairs.
    pub async fn post_query(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: impl Into<RequestBody>,
        query: &[&str],
    ) -> Fanout {
        self.request(cancel, url, &with_body(Method::POST, body, query))
            .await
    }

    /// Sends a PUT request.
    pub async fn put(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: impl Into<RequestBody>,
    ) -> Fanout {
        self.request(cancel, url, &with_body(Method::PUT, body, &[]))
            .await
    }

    /// Sends a PUT request with query pairs.
    pub async fn put_query(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: impl Into<RequestBody>,
        query: &[&str],
    ) -> Fanout {
        self.request(cancel, url, &with_body(Method::PUT, body, query))
            .await
    }

    /// Sends a PATCH request.
    pub async fn patch(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: impl Into<RequestBody>,
    ) -> Fanout {
        self.request(cancel, url, &with_body(Method::PATCH, body, &[]))
            .await
    }

    /// Sends a PATCH request with query pairs.
    pub async fn patch_query(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: impl Into<RequestBody>,
        query: &[&str],
    ) -> Fanout {
        self.request(cancel, url, &with_body(Method::PATCH, body, query))
            .await
    }

    /// Sends a DELETE request.
    pub async fn delete(&self, cancel: &CancellationToken, url: &str) -> Fanout {
        self.request(cancel, url, &RequestOptions::with_method(Method::DELETE))
            .await
    }

    /// Sends a DELETE request with query pairs.
    pub async fn delete_query(&self, cancel: &CancellationToken, url: &str, query: &[&str]) -> Fanout {
        let options = RequestOptions::with_method(Method::DELETE).query_pairs(query);
        self.request(cancel, url, &options).await
    }
}

/// Aborts the spawned requests when the fan-out future goes away early.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Response, Transport};
    use crate::transport::{MockReply, MockTransport};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails with a 500 after a delay, counting the requests that got there.
    #[derive(Debug, Default)]
    struct SlowTransport {
        finished: AtomicU32,
    }

    #[async_trait::async_trait]
    impl Transport for SlowTransport {
        async fn execute(&self, _url: &str, _options: &RequestOptions) -> Result<Response, HttpError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Err(HttpError::status(500, None))
        }
    }

    fn mock_client(index: usize, transport: &Arc<MockTransport>) -> HttpClient {
        HttpClient::with_transport(
            ClientConfig::new().with_base_url(format!("http://backend-{index}")),
            transport.clone(),
        )
        .unwrap()
    }

    /// Three clients; the one at `failing` answers 500.
    fn three_clients(failing: usize) -> (ClientSet, Vec<Arc<MockTransport>>) {
        let transports: Vec<_> = (0..3)
            .map(|i| {
                let status = if i == failing { 500 } else { 200 };
                Arc::new(MockTransport::new().with_default_status(status))
            })
            .collect();
        let clients = transports
            .iter()
            .enumerate()
            .map(|(i, t)| mock_client(i, t));
        (ClientSet::new(clients), transports)
    }

    #[tokio::test]
    async fn test_partial_failure_marks_broken() {
        let (set, transports) = three_clients(1);
        let cancel = CancellationToken::new();

        let fanout = set.get(&cancel, "/status").await;

        assert_eq!(fanout.responses.len(), 2);
        assert_eq!(
            fanout.responses.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![0, 2]
        );
        let err = fanout.error.unwrap();
        assert_eq!(err.indices(), vec![1]);
        assert!(err.to_string().contains("client 1"));
        assert_eq!(set.broken(), vec![1]);
        assert!(transports.iter().all(|t| t.calls() == 1));
    }

    #[tokio::test]
    async fn test_healthy_mode_skips_broken() {
        let (set, transports) = three_clients(1);
        let cancel = CancellationToken::new();

        set.get(&cancel, "/status").await;
        let fanout = set.get(&cancel, "/status").await;

        assert!(fanout.is_complete());
        assert_eq!(fanout.responses.len(), 2);
        assert_eq!(transports[1].calls(), 1);
        assert_eq!(transports[0].calls(), 2);
    }

    #[tokio::test]
    async fn test_use_broken_dispatches_only_to_broken() {
        let (set, transports) = three_clients(1);
        let cancel = CancellationToken::new();

        assert!(set.use_broken().is_none());
        set.get(&cancel, "/status").await;

        let broken_view = set.use_broken().unwrap();
        assert!(broken_view.is_broken_view());
        let fanout = broken_view.get(&cancel, "/status").await;

        assert!(fanout.responses.is_empty());
        assert_eq!(transports[0].calls(), 1);
        assert_eq!(transports[1].calls(), 2);
        assert_eq!(transports[2].calls(), 1);

        transports[1].set_default_reply(MockReply::status(200));
        let fanout = broken_view.get(&cancel, "/status").await;
        assert!(fanout.is_complete());
        assert!(set.broken().is_empty());
    }

    #[tokio::test]
    async fn test_delete_broken() {
        let (set, _) = three_clients(2);
        let cancel = CancellationToken::new();

        set.get(&cancel, "/").await;
        assert_eq!(set.broken(), vec![2]);

        set.delete_broken(&[2, 7]);
        assert!(set.broken().is_empty());
    }

    #[tokio::test]
    async fn test_send_posts_to_base_url() {
        let (set, transports) = three_clients(usize::MAX);
        let cancel = CancellationToken::new();

        set.send(&cancel, serde_json::json!({"event": "ping"}), &["source", "test"])
            .await
            .unwrap();

        for (i, transport) in transports.iter().enumerate() {
            assert_eq!(transport.calls_for(&format!("http://backend-{i}")), 1);
        }
    }

    #[tokio::test]
    async fn test_send_reports_failures() {
        let (set, _) = three_clients(0);
        let cancel = CancellationToken::new();

        let err = set.send(&cancel, "payload", &[]).await.unwrap_err();
        assert_eq!(err.indices(), vec![0]);
        assert_eq!(set.broken(), vec![0]);
    }

    #[tokio::test]
    async fn test_cancellation_keeps_broken_set() {
        let transport = Arc::new(MockTransport::new().with_latency(Duration::from_secs(30)));
        let set = ClientSet::new(vec![mock_client(0, &transport)]);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let fanout = set.get(&cancel, "/slow").await;
        let err = fanout.error.unwrap();
        assert!(err.failures[0].error.is_cancelled());
        assert!(set.broken().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_fanout_aborts_requests() {
        let transport = Arc::new(SlowTransport::default());
        let client = HttpClient::with_transport(
            ClientConfig::new().with_base_url("http://slow-backend"),
            transport.clone(),
        )
        .unwrap();
        let set = ClientSet::new(vec![client]);
        let cancel = CancellationToken::new();

        let timed_out = tokio::time::timeout(Duration::from_millis(10), set.get(&cancel, "/x")).await;
        assert!(timed_out.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.finished.load(Ordering::SeqCst), 0);
        assert!(set.broken().is_empty());
    }

    #[tokio::test]
    async fn test_send_without_base_url_is_configuration_error() {
        let transport = Arc::new(MockTransport::new());
        let without_base = HttpClient::with_transport(ClientConfig::new(), transport.clone()).unwrap();
        let set = ClientSet::new(vec![mock_client(0, &transport), without_base]);
        let cancel = CancellationToken::new();

        let err = set.send(&cancel, "payload", &[]).await.unwrap_err();

        assert_eq!(err.indices(), vec![1]);
        assert!(matches!(err.failure(1), Some(HttpError::Configuration { .. })));
        assert_eq!(transport.calls(), 1);
        assert_eq!(transport.calls_for("http://backend-0"), 1);
    }

    #[test]
    fn test_add_with_reports_failing_ordinal() {
        let transport = Arc::new(MockTransport::new());
        let mut set = ClientSet::default();
        let build = |config: ClientConfig| HttpClient::with_transport(config, transport.clone());

        set.add_with(vec![ClientConfig::new()], build).unwrap();
        assert_eq!(set.len(), 1);

        let err = set
            .add_with(
                vec![
                    ClientConfig::new().with_base_url("http://ok"),
                    ClientConfig::new().with_base_url("ftp://bad"),
                ],
                build,
            )
            .unwrap_err();

        assert!(matches!(err, HttpError::InvalidClient { index: 1, .. }));
        assert!(err.to_string().starts_with("client 1:"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_client_accessor() {
        let transport = Arc::new(MockTransport::new());
        let set = ClientSet::new(vec![mock_client(0, &transport)]);

        assert_eq!(
            set.client(0).and_then(|c| c.base_url()),
            Some("http://backend-0")
        );
        assert!(set.client(1).is_none());
    }
}
