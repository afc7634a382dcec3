use super::client::ProxyClient;
use super::lifecycle::{RequestTracker, Supersede};
use super::state::{HookState, MUTATION_ERROR_MESSAGE};
use crate::dispatch::Method;
use crate::error::{FetchError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Invoker-triggered write through the proxy for a fixed `(path, method)`.
///
/// Overlapping [`mutate`](MutationHook::mutate) calls all run to completion and
/// each returns its own result, but only the most recently started call may
/// write hook state.
pub struct MutationHook<T> {
    client: ProxyClient,
    path: String,
    method: Method,
    tracker: RequestTracker,
    state: watch::Sender<HookState<T>>,
}

impl<T> MutationHook<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// `method` must be POST, PUT or DELETE
    pub fn new(client: ProxyClient, path: impl Into<String>, method: Method) -> Result<Self> {
        if method == Method::Get {
            return Err(FetchError::InvalidMethod(
                "mutations cannot use GET".to_string(),
            ));
        }

        let (state, _) = watch::channel(HookState::idle());

        Ok(Self {
            client,
            path: path.into(),
            method,
            tracker: RequestTracker::new(),
            state,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Send the mutation.
    ///
    /// Returns [`FetchError::Cancelled`] if the hook is deactivated while the
    /// request is in flight; in that case hook state is left untouched.
    pub async fn mutate(&self, body: Option<Value>) -> Result<T> {
        let flight = self.tracker.issue(Supersede::Keep);
        let generation = flight.generation();

        self.tracker.commit(generation, || {
            self.state.send_replace(HookState::loading());
        });

        let result = flight
            .run(self.client.request::<T>(self.method, &self.path, body.as_ref()))
            .await;

        match result {
            Ok(data) => {
                let committed = self.tracker.commit(generation, || {
                    self.state.send_replace(HookState::success(data.clone()));
                });
                if committed.is_none() {
                    debug!(path = %self.path, generation, "Mutation superseded, state left as is");
                }
                Ok(data)
            }
            Err(e) if e.is_cancelled() => {
                debug!(path = %self.path, generation, "Mutation cancelled");
                Err(e)
            }
            Err(e) => {
                warn!(method = %self.method, path = %self.path, error = %e, "Mutation failed");
                self.tracker.commit(generation, || {
                    self.state
                        .send_replace(HookState::failed(MUTATION_ERROR_MESSAGE));
                });
                Err(e)
            }
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> HookState<T> {
        self.state.borrow().clone()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<HookState<T>> {
        self.state.subscribe()
    }

    /// Return to idle; in-flight calls still settle for their callers but no longer write state
    pub fn reset(&self) {
        self.tracker.invalidate();
        self.state.send_replace(HookState::idle());
    }

    /// Abort in-flight calls; they resolve to [`FetchError::Cancelled`]
    pub fn deactivate(&self) {
        self.tracker.deactivate();
    }
}

impl<T> Drop for MutationHook<T> {
    fn drop(&mut self) {
        self.tracker.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::Status;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_body(server: &MockServer, body: Value, status: u16, reply: Value, delay_ms: u64) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "body": body })))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(reply)
                    .set_delay(Duration::from_millis(delay_ms)),
            )
            .mount(server)
            .await;
    }

    fn hook(server: &MockServer) -> Arc<MutationHook<Value>> {
        let client = ProxyClient::new(server.uri()).unwrap();
        Arc::new(MutationHook::new(client, "/items", Method::Post).unwrap())
    }

    #[test]
    fn test_get_is_rejected() {
        let client = ProxyClient::new("http://localhost:8080/api/proxy").unwrap();
        let result = MutationHook::<Value>::new(client, "/items", Method::Get);
        assert!(matches!(result, Err(FetchError::InvalidMethod(_))));
    }

    #[tokio::test]
    async fn test_mutate_success() {
        let server = MockServer::start().await;
        mock_body(&server, json!({"name": "x"}), 201, json!({"id": 1}), 0).await;

        let hook = hook(&server);
        assert_eq!(hook.state().status(), Status::Idle);

        let value = hook.mutate(Some(json!({"name": "x"}))).await.unwrap();
        assert_eq!(value, json!({"id": 1}));

        let state = hook.state();
        assert_eq!(state.data, Some(json!({"id": 1})));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_mutate_failure_sets_error_and_returns_err() {
        let server = MockServer::start().await;
        mock_body(&server, json!({"name": "bad"}), 500, json!({"error": "Request failed"}), 0).await;

        let hook = hook(&server);
        let err = hook.mutate(Some(json!({"name": "bad"}))).await.unwrap_err();
        assert!(matches!(err, FetchError::Upstream { status: 500 }));

        let state = hook.state();
        assert_eq!(state.error.as_deref(), Some(MUTATION_ERROR_MESSAGE));
        assert!(state.data.is_none());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_latest_invocation_wins() {
        let server = MockServer::start().await;
        mock_body(&server, json!({"n": 1}), 200, json!({"n": 1}), 300).await;
        mock_body(&server, json!({"n": 2}), 200, json!({"n": 2}), 0).await;

        let hook = hook(&server);

        let first = tokio::spawn({
            let hook = hook.clone();
            async move { hook.mutate(Some(json!({"n": 1}))).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = hook.mutate(Some(json!({"n": 2}))).await.unwrap();
        assert_eq!(second, json!({"n": 2}));
        assert_eq!(hook.state().data, Some(json!({"n": 2})));

        // The earlier call still settles for its own caller.
        let first = first.await.unwrap().unwrap();
        assert_eq!(first, json!({"n": 1}));
        assert_eq!(hook.state().data, Some(json!({"n": 2})));
    }

    #[tokio::test]
    async fn test_deactivate_mid_flight() {
        let server = MockServer::start().await;
        mock_body(&server, json!({"n": 1}), 200, json!({"n": 1}), 5_000).await;

        let hook = hook(&server);
        let pending = tokio::spawn({
            let hook = hook.clone();
            async move { hook.mutate(Some(json!({"n": 1}))).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(hook.state().loading);

        hook.deactivate();

        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(FetchError::Cancelled)));

        let state = hook.state();
        assert!(state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_reset_detaches_in_flight_call() {
        let server = MockServer::start().await;
        mock_body(&server, json!({"n": 1}), 200, json!({"n": 1}), 200).await;

        let hook = hook(&server);
        let pending = tokio::spawn({
            let hook = hook.clone();
            async move { hook.mutate(Some(json!({"n": 1}))).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        hook.reset();
        assert_eq!(pending.await.unwrap().unwrap(), json!({"n": 1}));
        assert_eq!(hook.state().status(), Status::Idle);
    }
}
