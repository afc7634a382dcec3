//! Client-side query and mutation hooks.
//!
//! Hooks only ever talk to the proxy endpoint through a [`ProxyClient`]; they
//! never hold the upstream token. Each hook owns a [`RequestTracker`] that
//! decides which completion is still allowed to write state.

pub mod client;
pub mod lifecycle;
pub mod mutation;
pub mod query;
pub mod state;

pub use client::ProxyClient;
pub use lifecycle::{Generation, InFlight, RequestTracker, Supersede};
pub use mutation::MutationHook;
pub use query::QueryHook;
pub use state::{HookState, Status, MUTATION_ERROR_MESSAGE, QUERY_ERROR_MESSAGE};
