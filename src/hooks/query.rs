use super::client::ProxyClient;
use super::lifecycle::{RequestTracker, Supersede};
use super::state::{HookState, QUERY_ERROR_MESSAGE};
use crate::dispatch::Method;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Fetches `path` through the proxy whenever it is activated.
///
/// Activating with a new path aborts the previous request; only the most
/// recent activation can ever write state. Dropping the hook (or calling
/// [`QueryHook::deactivate`]) aborts the in-flight request and freezes state.
///
/// Activation spawns onto the current Tokio runtime.
pub struct QueryHook<T> {
    client: ProxyClient,
    tracker: Arc<RequestTracker>,
    state: Arc<watch::Sender<HookState<T>>>,
    path: Mutex<Option<String>>,
}

impl<T> QueryHook<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Idle hook, nothing requested yet
    pub fn new(client: ProxyClient) -> Self {
        let (state, _) = watch::channel(HookState::idle());

        Self {
            client,
            tracker: Arc::new(RequestTracker::new()),
            state: Arc::new(state),
            path: Mutex::new(None),
        }
    }

    /// Create the hook and immediately activate it for `path`
    pub fn mount(client: ProxyClient, path: impl Into<String>) -> Self {
        let hook = Self::new(client);
        hook.set_path(path);
        hook
    }

    /// Activate for `path`. Returns `None` if `path` is already the active one.
    pub fn set_path(&self, path: impl Into<String>) -> Option<JoinHandle<()>> {
        let path = path.into();
        {
            let mut current = self.path.lock().unwrap_or_else(PoisonError::into_inner);
            if current.as_deref() == Some(path.as_str()) {
                return None;
            }
            *current = Some(path.clone());
        }

        Some(self.activate(path))
    }

    /// Re-issue the request for the current path
    pub fn refetch(&self) -> Option<JoinHandle<()>> {
        let path = self.path()?;
        Some(self.activate(path))
    }

    pub fn path(&self) -> Option<String> {
        self.path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> HookState<T> {
        self.state.borrow().clone()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<HookState<T>> {
        self.state.subscribe()
    }

    /// Abort the in-flight request; later completions are ignored
    pub fn deactivate(&self) {
        self.tracker.deactivate();
    }

    fn activate(&self, path: String) -> JoinHandle<()> {
        let flight = self.tracker.issue(Supersede::Cancel);
        let generation = flight.generation();

        self.tracker.commit(generation, || {
            self.state.send_replace(HookState::loading());
        });

        let client = self.client.clone();
        let tracker = self.tracker.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            let result = flight
                .run(client.request::<T>(Method::Get, &path, None))
                .await;

            let next = match result {
                Ok(data) => HookState::success(data),
                Err(e) if e.is_cancelled() => {
                    debug!(path = %path, generation, "Query cancelled");
                    return;
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Query failed");
                    HookState::failed(QUERY_ERROR_MESSAGE)
                }
            };

            if tracker
                .commit(generation, || {
                    state.send_replace(next);
                })
                .is_none()
            {
                debug!(path = %path, generation, "Discarding stale query result");
            }
        })
    }
}

impl<T> Drop for QueryHook<T> {
    fn drop(&mut self) {
        self.tracker.deactivate();
    }
}
