//! Deferred values that settle exactly once.
//!
//! A [`Promise`] represents the eventual outcome of a computation. It starts
//! out pending and settles into fulfillment or rejection, never both and never
//! twice. Observers attach through [`Promise::then`], [`Promise::catch`] and
//! [`Promise::finally`]; every observer runs on a later turn of an injected
//! [`Scheduler`], never inline with the call that attached it.
//!
//! Settlement values are dynamic [`Value`]s. A value that exposes a `then`
//! capability (a foreign thenable, or another promise) is adopted rather than
//! stored, so arbitrarily deep chains of deferred values collapse into a
//! single terminal outcome.
//!
//! # Examples
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use eventual::{Promise, QueueScheduler, Value};
//!
//! let scheduler = Arc::new(QueueScheduler::new());
//! let seen = Arc::new(Mutex::new(None));
//! let stash = seen.clone();
//!
//! let promise = Promise::new(scheduler.clone(), |resolve, _reject| {
//!     resolve.call(Value::from(41));
//!     Ok(())
//! });
//! promise.then(move |value| {
//!     *stash.lock().unwrap() = value.as_int();
//!     Ok(value)
//! });
//!
//! // Dispatch always crosses the scheduler, even for a settled promise.
//! assert_eq!(*seen.lock().unwrap(), None);
//! scheduler.run_until_idle();
//! assert_eq!(*seen.lock().unwrap(), Some(41));
//! ```

pub mod promise;
pub mod scheduler;
pub mod value;

mod combine;

pub use promise::{FinallyFn, Handler, Promise, Settle, Settled, State};
pub use scheduler::{Job, QueueScheduler, Scheduler, SchedulerRef, ThreadScheduler};
pub use value::{NativeFn, ThenCapability, ThenFn, Value};

/// Infrastructure faults.
///
/// Rejection reasons are never `Error`: any [`Value`] can serve as a reason.
/// This type only covers the machinery a promise depends on.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The scheduler behind a promise stopped accepting jobs.
    #[error("scheduler is no longer accepting jobs")]
    SchedulerClosed,
}
