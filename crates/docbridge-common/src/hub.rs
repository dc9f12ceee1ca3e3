//! Lazy single-value initializer
//!
//! A [`Hub`] memoizes the result of one asynchronous factory. The first call to
//! [`Hub::get`] launches the factory and stores the in-flight future before it
//! is awaited, so callers arriving while it runs join the same attempt instead
//! of starting another one.
//!
//! ```ignore
//! use docbridge_common::Hub;
//!
//! let hub = Hub::new(|| async { Ok::<_, docbridge_common::BridgeError>(42) });
//! assert_eq!(hub.get().await?, 42);
//! ```

use std::fmt;
use std::future::Future;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use crate::Result;

type Factory<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;
type InFlight<T> = Shared<BoxFuture<'static, Result<T>>>;

/// What a [`Hub`] does after its factory fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Deliver the failure to every caller awaiting that attempt, then go back
    /// to the unstarted state so the next `get` runs the factory again.
    #[default]
    Retry,
    /// Memoize the failure; every later `get` returns the same error.
    Cache,
}

enum State<T> {
    Unstarted,
    InFlight(InFlight<T>),
    Settled(Result<T>),
}

/// Memoized asynchronous value, computed at most once per successful attempt.
pub struct Hub<T> {
    factory: Factory<T>,
    policy: FailurePolicy,
    state: Mutex<State<T>>,
}

impl<T> Hub<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a hub with the default [`FailurePolicy::Retry`].
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self::with_policy(factory, FailurePolicy::default())
    }

    /// Create a hub with an explicit failure policy.
    pub fn with_policy<F, Fut>(factory: F, policy: FailurePolicy) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            factory: Box::new(move || factory().boxed()),
            policy,
            state: Mutex::new(State::Unstarted),
        }
    }

    /// Get the memoized value, running the factory if nothing is cached or
    /// in flight.
    pub async fn get(&self) -> Result<T> {
        let attempt = {
            let mut state = self.state.lock();
            match &*state {
                State::Settled(result) => return result.clone(),
                State::InFlight(attempt) => attempt.clone(),
                State::Unstarted => {
                    debug!("Launching hub factory");
                    let attempt = (self.factory)().shared();
                    *state = State::InFlight(attempt.clone());
                    attempt
                }
            }
        };

        let result = attempt.clone().await;
        self.settle(&attempt, &result);
        result
    }

    /// Returns true once a successful value is cached.
    pub fn is_settled(&self) -> bool {
        matches!(&*self.state.lock(), State::Settled(Ok(_)))
    }

    /// The failure policy this hub was built with.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    // Only the waiter whose attempt is still the current one moves the state.
    fn settle(&self, attempt: &InFlight<T>, result: &Result<T>) {
        let mut state = self.state.lock();
        let current = matches!(&*state, State::InFlight(inflight) if inflight.ptr_eq(attempt));
        if !current {
            return;
        }

        match (result, self.policy) {
            (Ok(_), _) | (Err(_), FailurePolicy::Cache) => {
                debug!(ok = result.is_ok(), "Hub settled");
                *state = State::Settled(result.clone());
            }
            (Err(e), FailurePolicy::Retry) => {
                debug!(error = %e, "Hub factory failed, next call will retry");
                *state = State::Unstarted;
            }
        }
    }
}

impl<T> fmt::Debug for Hub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.lock() {
            State::Unstarted => "unstarted",
            State::InFlight(_) => "in-flight",
            State::Settled(Ok(_)) => "settled",
            State::Settled(Err(_)) => "failed",
        };
        f.debug_struct("Hub")
            .field("policy", &self.policy)
            .field("state", &state)
            .finish()
    }
}
