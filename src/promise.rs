//! The settle-once state machine and its chaining surface.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::scheduler::SchedulerRef;
use crate::value::Value;

/// Where a promise is in its lifecycle. Transitions are monotonic:
/// `Pending` moves to exactly one of the other two and stays there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

/// A user observer. `Err` models a handler that raises instead of returning.
pub type Handler = Box<dyn FnOnce(Value) -> Result<Value, Value> + Send>;

/// A cleanup observer for [`Promise::finally`]. Sees no settlement value.
pub type FinallyFn = Box<dyn FnOnce() -> Result<(), Value> + Send>;

/// Settlement-wired callback, one half of a queued pair.
type Dispatch = Box<dyn FnOnce(Value) + Send>;

struct HandlerPair {
    on_fulfilled: Option<Dispatch>,
    on_reject: Option<Dispatch>,
}

struct Inner {
    state: State,
    value: Option<Value>,
    // Populated only while pending; flushed in registration order on
    // settlement, then cleared.
    handlers: Vec<HandlerPair>,
}

type Shared = Arc<Mutex<Inner>>;

/// A value that arrives later.
///
/// Cloning shares the same underlying settlement; a `Promise` is a handle,
/// not the state itself.
#[derive(Clone)]
pub struct Promise {
    inner: Shared,
    scheduler: SchedulerRef,
}

/// A guarded settle callback.
///
/// `Settle`s come in pairs sharing one `done` flag: the first call of either
/// member wins and every later call on the pair is a no-op. They may be
/// cloned, stashed, and called from other threads.
#[derive(Clone)]
pub struct Settle {
    done: Arc<AtomicBool>,
    act: Arc<dyn Fn(Value) + Send + Sync>,
}

impl Settle {
    /// Builds a fresh pair over two actions sharing one first-call-wins flag.
    pub fn pair<F, R>(on_ok: F, on_err: R) -> (Settle, Settle)
    where
        F: Fn(Value) + Send + Sync + 'static,
        R: Fn(Value) + Send + Sync + 'static,
    {
        let done = Arc::new(AtomicBool::new(false));
        let ok = Settle {
            done: done.clone(),
            act: Arc::new(on_ok),
        };
        let err = Settle {
            done,
            act: Arc::new(on_err),
        };
        (ok, err)
    }

    /// Runs the underlying action unless the pair already fired.
    pub fn call(&self, value: Value) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        (self.act)(value)
    }
}

impl fmt::Debug for Settle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settle")
            .field("done", &self.done.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Settle pair wired into a promise's resolution procedure.
fn settle_pair(inner: &Shared) -> (Settle, Settle) {
    let ok = {
        let inner = inner.clone();
        move |value| resolve_value(&inner, value)
    };
    let err = {
        let inner = inner.clone();
        move |reason| reject_value(&inner, reason)
    };
    Settle::pair(ok, err)
}

/// Offers `value` as a success. A value with a `then` capability is not
/// stored; the capability is invoked with a fresh guarded pair that feeds
/// back into this same procedure, so nested deferred values collapse to one
/// terminal settlement. A capability that fails synchronously funnels into
/// rejection under that pair's guard.
fn resolve_value(inner: &Shared, value: Value) {
    match value.then_capability() {
        Some(capability) => {
            let (ok, err) = settle_pair(inner);
            let guard = err.clone();
            if let Err(reason) = capability.invoke(ok, err) {
                guard.call(reason);
            }
        }
        None => finalize(inner, State::Fulfilled, value),
    }
}

/// Settles as rejected. The reason is stored as-is, never probed.
fn reject_value(inner: &Shared, reason: Value) {
    finalize(inner, State::Rejected, reason);
}

/// The one-time transition. Later attempts, whichever variant, are no-ops.
fn finalize(inner: &Shared, state: State, value: Value) {
    let flushed = {
        let mut guard = inner.lock().unwrap();
        if guard.state != State::Pending {
            return;
        }
        guard.state = state;
        guard.value = Some(value.clone());
        std::mem::take(&mut guard.handlers)
    };
    for pair in flushed {
        dispatch(state, &value, pair);
    }
}

/// Runs the half of a pair that matches the settlement, if present.
fn dispatch(state: State, value: &Value, pair: HandlerPair) {
    let callback = match state {
        State::Fulfilled => pair.on_fulfilled,
        State::Rejected => pair.on_reject,
        State::Pending => None,
    };
    if let Some(callback) = callback {
        callback(value.clone());
    }
}

/// The deferred half of registration: queue while pending, run the matching
/// callback otherwise. Always entered from a scheduler turn.
fn attach(inner: &Shared, pair: HandlerPair) {
    let (state, value) = {
        let mut guard = inner.lock().unwrap();
        if guard.state == State::Pending {
            guard.handlers.push(pair);
            return;
        }
        (guard.state, guard.value.clone().unwrap_or(Value::Null))
    };
    dispatch(state, &value, pair);
}

impl Promise {
    /// Runs `executor` synchronously with a guarded settle pair. Returning
    /// `Err` before either callback fired rejects the promise with that
    /// value; after one fired it is ignored, first call wins.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use eventual::{Promise, QueueScheduler, State, Value};
    ///
    /// let scheduler = Arc::new(QueueScheduler::new());
    /// let promise = Promise::new(scheduler.clone(), |resolve, _reject| {
    ///     resolve.call(Value::from("done"));
    ///     Ok(())
    /// });
    /// assert_eq!(promise.state(), State::Fulfilled);
    /// ```
    pub fn new<E>(scheduler: SchedulerRef, executor: E) -> Promise
    where
        E: FnOnce(Settle, Settle) -> Result<(), Value>,
    {
        let promise = Promise::pending(scheduler);
        let (ok, err) = settle_pair(&promise.inner);
        let guard = err.clone();
        if let Err(reason) = executor(ok, err) {
            guard.call(reason);
        }
        promise
    }

    pub(crate) fn pending(scheduler: SchedulerRef) -> Promise {
        Promise {
            inner: Arc::new(Mutex::new(Inner {
                state: State::Pending,
                value: None,
                handlers: Vec::new(),
            })),
            scheduler,
        }
    }

    /// A promise tracking `value`: finalized outright for a plain value,
    /// adopted for a thenable or another promise. Observers are still
    /// dispatched on a later turn either way.
    pub fn resolve(scheduler: SchedulerRef, value: Value) -> Promise {
        let promise = Promise::pending(scheduler);
        resolve_value(&promise.inner, value);
        promise
    }

    /// A promise rejected with `reason`. The reason is never probed for a
    /// `then` capability.
    pub fn reject(scheduler: SchedulerRef, reason: Value) -> Promise {
        let promise = Promise::pending(scheduler);
        reject_value(&promise.inner, reason);
        promise
    }

    pub fn state(&self) -> State {
        self.inner.lock().unwrap().state
    }

    /// Whether two handles share one settlement.
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Registration primitive: hand the pair to the scheduler. Dispatch
    /// never happens inline with the registering call, settled or not.
    fn subscribe(&self, pair: HandlerPair) {
        let inner = self.inner.clone();
        let job = Box::new(move || attach(&inner, pair));
        if let Err(err) = self.scheduler.schedule(job) {
            log::warn!("dropping handler dispatch: {err}");
        }
    }

    /// The full two-slot chaining contract.
    ///
    /// Returns a new promise settled from the receiver's outcome: a callable
    /// slot maps the settlement (its `Err` rejects, its `Ok` resolves, with
    /// adoption); a missing slot passes the settlement through unchanged.
    pub fn then_with(
        &self,
        on_fulfilled: Option<Handler>,
        on_reject: Option<Handler>,
    ) -> Promise {
        let derived = Promise::pending(self.scheduler.clone());
        let fulfil_target = derived.inner.clone();
        let reject_target = derived.inner.clone();
        let ok: Dispatch = Box::new(move |value| match on_fulfilled {
            Some(handler) => match handler(value) {
                Ok(result) => resolve_value(&fulfil_target, result),
                Err(reason) => reject_value(&fulfil_target, reason),
            },
            None => resolve_value(&fulfil_target, value),
        });
        let err: Dispatch = Box::new(move |reason| match on_reject {
            Some(handler) => match handler(reason) {
                Ok(result) => resolve_value(&reject_target, result),
                Err(reason) => reject_value(&reject_target, reason),
            },
            None => reject_value(&reject_target, reason),
        });
        self.subscribe(HandlerPair {
            on_fulfilled: Some(ok),
            on_reject: Some(err),
        });
        derived
    }

    /// Maps the fulfillment value; rejections pass through.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use eventual::{Promise, QueueScheduler, State, Value};
    ///
    /// let scheduler = Arc::new(QueueScheduler::new());
    /// let doubled = Promise::resolve(scheduler.clone(), Value::from(21))
    ///     .then(|value| Ok(Value::from(value.as_int().unwrap_or(0) * 2)));
    /// scheduler.run_until_idle();
    /// assert_eq!(doubled.state(), State::Fulfilled);
    /// ```
    pub fn then<F>(&self, on_fulfilled: F) -> Promise
    where
        F: FnOnce(Value) -> Result<Value, Value> + Send + 'static,
    {
        self.then_with(Some(Box::new(on_fulfilled)), None)
    }

    /// Maps the rejection reason; fulfillments pass through. Returning `Ok`
    /// recovers: the derived promise fulfills.
    pub fn catch<R>(&self, on_reject: R) -> Promise
    where
        R: FnOnce(Value) -> Result<Value, Value> + Send + 'static,
    {
        self.then_with(None, Some(Box::new(on_reject)))
    }

    /// Optional-slot variant of [`Promise::catch`]. Without a handler there
    /// is nothing to alter, so the receiver itself is handed back rather
    /// than a new promise.
    pub fn catch_with(&self, on_reject: Option<Handler>) -> Promise {
        match on_reject {
            Some(handler) => self.then_with(None, Some(handler)),
            None => self.clone(),
        }
    }

    /// Runs `on_finally` once the receiver settles, on either branch, then
    /// propagates the original settlement. On the fulfillment branch a
    /// failing callback rejects with its error; on the rejection branch the
    /// callback's error is discarded and the original reason still wins.
    pub fn finally<F>(&self, on_finally: F) -> Promise
    where
        F: FnOnce() -> Result<(), Value> + Send + 'static,
    {
        self.finally_with(Some(Box::new(on_finally)))
    }

    pub fn finally_with(&self, on_finally: Option<FinallyFn>) -> Promise {
        let hook = match on_finally {
            Some(hook) => hook,
            None => return self.then_with(None, None),
        };
        let derived = Promise::pending(self.scheduler.clone());
        let fulfil_target = derived.inner.clone();
        let reject_target = derived.inner.clone();
        // Only one branch runs; the hook moves to whichever fires first.
        let hook = Arc::new(Mutex::new(Some(hook)));
        let hook_on_reject = hook.clone();
        let ok: Dispatch = Box::new(move |value| {
            match hook.lock().unwrap().take().map(|hook| hook()) {
                Some(Err(reason)) => reject_value(&fulfil_target, reason),
                _ => resolve_value(&fulfil_target, value),
            }
        });
        let err: Dispatch = Box::new(move |reason| {
            if let Some(hook) = hook_on_reject.lock().unwrap().take() {
                // The original reason wins even when the hook fails.
                let _ = hook();
            }
            reject_value(&reject_target, reason);
        });
        self.subscribe(HandlerPair {
            on_fulfilled: Some(ok),
            on_reject: Some(err),
        });
        derived
    }

    /// An awaitable view of the settlement.
    ///
    /// The handle is wired through the ordinary chaining contract, so it
    /// resolves only after the scheduler has run the dispatch turn.
    pub fn settled(&self) -> Settled {
        let shared = Arc::new(Mutex::new(WaitInner {
            outcome: None,
            waker: None,
        }));
        let on_ok = shared.clone();
        let on_err = shared.clone();
        self.then_with(
            Some(Box::new(move |value| {
                store(&on_ok, Ok(value.clone()));
                Ok(value)
            })),
            Some(Box::new(move |reason| {
                store(&on_err, Err(reason.clone()));
                Err(reason)
            })),
        );
        Settled { shared }
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct WaitInner {
    outcome: Option<Result<Value, Value>>,
    waker: Option<Waker>,
}

/// Future yielding a promise's outcome: `Ok` for fulfillment, `Err` for
/// rejection. Stays pending as long as the promise does.
#[derive(Debug)]
pub struct Settled {
    shared: Arc<Mutex<WaitInner>>,
}

fn store(shared: &Arc<Mutex<WaitInner>>, outcome: Result<Value, Value>) {
    let waker = {
        let mut wait = shared.lock().unwrap();
        wait.outcome = Some(outcome);
        wait.waker.take()
    };
    if let Some(waker) = waker {
        waker.wake()
    }
}

impl Future for Settled {
    type Output = Result<Value, Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut wait = self.shared.lock().unwrap();
        match wait.outcome.take() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                wait.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
