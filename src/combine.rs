//! Aggregate combinators over collections of deferred values.
//!
//! Both combinators sit on the public chaining contract: members are
//! observed through their `then` capability, and the combinator settles
//! through the same guarded pair an executor gets. No promise internals
//! are touched.

use std::sync::{Arc, Mutex};

use crate::promise::{Promise, Settle};
use crate::scheduler::SchedulerRef;
use crate::value::{ThenCapability, Value};

struct Slots {
    filled: usize,
    results: Vec<Option<Value>>,
}

/// Wires one collection member to a pair of callbacks. Plain values are
/// wrapped first so every member reports through a `then` capability. A
/// foreign `then` may fail synchronously; the failure is returned to the
/// caller instead of being funneled anywhere.
fn observe<F, R>(scheduler: &SchedulerRef, member: Value, on_ok: F, on_err: R) -> Result<(), Value>
where
    F: Fn(Value) + Send + Sync + 'static,
    R: Fn(Value) + Send + Sync + 'static,
{
    let capability = match member.then_capability() {
        Some(capability) => capability,
        None => ThenCapability::Own(Promise::resolve(scheduler.clone(), member)),
    };
    let (ok, err) = Settle::pair(on_ok, on_err);
    capability.invoke(ok, err)
}

impl Promise {
    /// Settles with every member's result, in input order.
    ///
    /// Accepts a [`Value::List`] of promises, thenables and plain values, or
    /// a [`Value::Text`] whose characters are each wrapped via
    /// [`Promise::resolve`] and combined recursively. Rejects as soon as any
    /// member rejects; the other members keep running, their settlements are
    /// simply ignored. An empty collection fulfills with an empty list.
    /// Any other input shape rejects.
    ///
    /// A member whose `then` fails during attachment is surfaced as a
    /// last-resort unhandled-rejection diagnostic before rejecting the
    /// combinator.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use eventual::{Promise, QueueScheduler, State, Value};
    ///
    /// let scheduler = Arc::new(QueueScheduler::new());
    /// let combined = Promise::all(scheduler.clone(), Value::List(vec![
    ///     Value::Promise(Promise::resolve(scheduler.clone(), Value::from(1))),
    ///     Value::from(2),
    /// ]));
    /// scheduler.run_until_idle();
    /// assert_eq!(combined.state(), State::Fulfilled);
    /// ```
    pub fn all(scheduler: SchedulerRef, input: Value) -> Promise {
        match input {
            Value::Text(text) => {
                let wrapped: Vec<Value> = text
                    .chars()
                    .map(|ch| {
                        Value::Promise(Promise::resolve(scheduler.clone(), Value::from(ch)))
                    })
                    .collect();
                Promise::all(scheduler, Value::List(wrapped))
            }
            Value::List(members) => {
                let member_scheduler = scheduler.clone();
                Promise::new(scheduler, move |resolve, reject| {
                    if members.is_empty() {
                        resolve.call(Value::List(Vec::new()));
                        return Ok(());
                    }
                    let count = members.len();
                    let slots = Arc::new(Mutex::new(Slots {
                        filled: 0,
                        results: vec![None; count],
                    }));
                    for (index, member) in members.into_iter().enumerate() {
                        let resolve = resolve.clone();
                        let slots = slots.clone();
                        let on_ok = move |value: Value| {
                            let finished = {
                                let mut slots = slots.lock().unwrap();
                                slots.results[index] = Some(value);
                                slots.filled += 1;
                                slots.filled == slots.results.len()
                            };
                            if finished {
                                let results: Vec<Value> = slots
                                    .lock()
                                    .unwrap()
                                    .results
                                    .iter_mut()
                                    .map(|slot| slot.take().unwrap_or(Value::Null))
                                    .collect();
                                resolve.call(Value::List(results));
                            }
                        };
                        let lose = reject.clone();
                        let on_err = move |reason: Value| lose.call(reason);
                        if let Err(reason) = observe(&member_scheduler, member, on_ok, on_err) {
                            log::error!(
                                "unhandled rejection while attaching member {index}: {reason}"
                            );
                            reject.call(reason);
                        }
                    }
                    Ok(())
                })
            }
            other => Promise::reject(
                scheduler,
                Value::Text(format!("all expects a list or text, got {other}")),
            ),
        }
    }

    /// Settles with the first member to settle, fulfillment or rejection.
    ///
    /// Accepts the same inputs as [`Promise::all`]. Text is special-cased to
    /// resolve its first character only (empty text resolves null). Later
    /// settlements of other members are observed but change nothing; a race
    /// with no contestants stays pending forever.
    pub fn race(scheduler: SchedulerRef, input: Value) -> Promise {
        match input {
            Value::Text(text) => {
                let first = text.chars().next().map(Value::from).unwrap_or(Value::Null);
                let member_scheduler = scheduler.clone();
                Promise::new(scheduler, move |resolve, reject| {
                    let win = move |value: Value| resolve.call(value);
                    let lose = move |reason: Value| reject.call(reason);
                    observe(&member_scheduler, first, win, lose)
                })
            }
            Value::List(members) => {
                let member_scheduler = scheduler.clone();
                Promise::new(scheduler, move |resolve, reject| {
                    for (index, member) in members.into_iter().enumerate() {
                        let win = resolve.clone();
                        let lose = reject.clone();
                        let on_ok = move |value: Value| win.call(value);
                        let on_err = move |reason: Value| lose.call(reason);
                        if let Err(reason) = observe(&member_scheduler, member, on_ok, on_err) {
                            log::error!(
                                "unhandled rejection while attaching contestant {index}: {reason}"
                            );
                            reject.call(reason);
                        }
                    }
                    Ok(())
                })
            }
            other => Promise::reject(
                scheduler,
                Value::Text(format!("race expects a list or text, got {other}")),
            ),
        }
    }
}
