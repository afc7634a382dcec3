//! Per-hook request generations.
//!
//! Every request a hook issues gets the next generation number and a child
//! cancellation token. A completion may only write hook state while its
//! generation is still the latest one; the check and the write happen under
//! the same lock.

use crate::error::{FetchError, Result};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

pub type Generation = u64;

/// What happens to the previous in-flight request when a new one is issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Supersede {
    /// Abort it; its outcome is irrelevant (query path changes)
    Cancel,
    /// Let it finish for its caller, but it may no longer write state (mutations)
    Keep,
}

/// Handle for one issued request
#[derive(Debug, Clone)]
pub struct InFlight {
    generation: Generation,
    token: CancellationToken,
}

impl InFlight {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive `fut` until it completes or this handle is cancelled
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(FetchError::Cancelled),
            result = fut => result,
        }
    }
}

#[derive(Debug)]
struct TrackerState {
    generation: Generation,
    current: Option<CancellationToken>,
    active: bool,
}

/// Issues generations and gates state writes for a single hook instance
#[derive(Debug)]
pub struct RequestTracker {
    root: CancellationToken,
    state: Mutex<TrackerState>,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            state: Mutex::new(TrackerState {
                generation: 0,
                current: None,
                active: true,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue the next generation. After deactivation the handle comes back already cancelled.
    pub fn issue(&self, supersede: Supersede) -> InFlight {
        let mut state = self.lock();
        state.generation += 1;

        if supersede == Supersede::Cancel {
            if let Some(previous) = state.current.take() {
                previous.cancel();
            }
        }

        let token = self.root.child_token();
        state.current = Some(token.clone());

        InFlight {
            generation: state.generation,
            token,
        }
    }

    pub fn current_generation(&self) -> Generation {
        self.lock().generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        let state = self.lock();
        state.active && state.generation == generation
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    /// Run `apply` only if `generation` is still the latest issued one
    pub fn commit<R>(&self, generation: Generation, apply: impl FnOnce() -> R) -> Option<R> {
        let state = self.lock();
        if state.active && state.generation == generation {
            Some(apply())
        } else {
            None
        }
    }

    /// Make every issued handle stale without aborting its request
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.current = None;
    }

    /// Cancel everything in flight and refuse all further commits
    pub fn deactivate(&self) {
        let mut state = self.lock();
        state.active = false;
        state.generation += 1;
        state.current = None;
        self.root.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_generations_increase() {
        let tracker = RequestTracker::new();
        let first = tracker.issue(Supersede::Keep);
        let second = tracker.issue(Supersede::Keep);
        assert!(second.generation() > first.generation());
        assert_eq!(tracker.current_generation(), second.generation());
    }

    #[test]
    fn test_only_latest_generation_commits() {
        let tracker = RequestTracker::new();
        let stale = tracker.issue(Supersede::Keep);
        let latest = tracker.issue(Supersede::Keep);

        assert_eq!(tracker.commit(stale.generation(), || "stale"), None);
        assert_eq!(tracker.commit(latest.generation(), || "latest"), Some("latest"));
        assert!(!stale.is_cancelled());
    }

    #[test]
    fn test_cancel_supersede_aborts_previous() {
        let tracker = RequestTracker::new();
        let first = tracker.issue(Supersede::Cancel);
        let second = tracker.issue(Supersede::Cancel);

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn test_invalidate_makes_handles_inert() {
        let tracker = RequestTracker::new();
        let flight = tracker.issue(Supersede::Keep);
        tracker.invalidate();

        assert!(!tracker.is_current(flight.generation()));
        assert!(!flight.is_cancelled());
    }

    #[test]
    fn test_deactivate_cancels_and_blocks_commits() {
        let tracker = RequestTracker::new();
        let flight = tracker.issue(Supersede::Keep);
        tracker.deactivate();

        assert!(flight.is_cancelled());
        assert!(!tracker.is_active());
        assert_eq!(tracker.commit(flight.generation(), || ()), None);

        let late = tracker.issue(Supersede::Cancel);
        assert!(late.is_cancelled());
        assert_eq!(tracker.commit(late.generation(), || ()), None);
    }

    #[tokio::test]
    async fn test_run_returns_cancelled() {
        let tracker = RequestTracker::new();
        let flight = tracker.issue(Supersede::Cancel);

        let pending = flight.run(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, FetchError>(1)
        });

        tracker.issue(Supersede::Cancel);
        let result = pending.await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let tracker = RequestTracker::new();
        let flight = tracker.issue(Supersede::Keep);
        let value = flight.run(async { Ok::<_, FetchError>(42) }).await;
        assert_eq!(tokio_test::assert_ok!(value), 42);
    }
}
