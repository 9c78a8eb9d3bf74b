use std::sync::Arc;
use std::thread;
use std::time::Duration;

use futures::executor::block_on;

use eventual::{Error, Promise, Scheduler, ThreadScheduler, Value};

#[test]
fn resolve_from_another_thread() {
    let scheduler = Arc::new(ThreadScheduler::new());
    let mut handle = None;
    let promise = Promise::new(scheduler.clone(), |resolve, _reject| {
        handle = Some(resolve);
        Ok(())
    });
    let resolve = handle.expect("executor runs synchronously");

    let settler = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        resolve.call(Value::from("ready"));
    });

    assert_eq!(block_on(promise.settled()), Ok(Value::from("ready")));
    settler.join().expect("the settling thread has panicked");
}

#[test]
fn a_chain_settles_end_to_end() {
    let scheduler = Arc::new(ThreadScheduler::new());
    let chained = Promise::resolve(scheduler.clone(), Value::from(20))
        .then(|value| Ok(Value::from(value.as_int().unwrap_or(0) + 1)))
        .then(|_| Err(Value::from("interrupt")))
        .catch(Ok);
    assert_eq!(block_on(chained.settled()), Ok(Value::from("interrupt")));
}

#[test]
fn finally_runs_and_keeps_the_settlement() {
    let scheduler = Arc::new(ThreadScheduler::new());
    let kept = Promise::reject(scheduler.clone(), Value::from("e"))
        .finally(|| Ok(()))
        .catch(Ok);
    assert_eq!(block_on(kept.settled()), Ok(Value::from("e")));
}

#[test]
fn foreign_thenables_settle_across_threads() {
    let scheduler = Arc::new(ThreadScheduler::new());
    let thenable = Value::thenable(|resolve, _reject| {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            resolve.call(Value::from(7));
        });
        Ok(())
    });
    let adopted = Promise::resolve(scheduler.clone(), thenable);
    assert_eq!(block_on(adopted.settled()), Ok(Value::from(7)));
}

#[test]
fn all_waits_for_slow_members() {
    let scheduler = Arc::new(ThreadScheduler::new());
    let mut handle = None;
    let slow = Promise::new(scheduler.clone(), |resolve, _reject| {
        handle = Some(resolve);
        Ok(())
    });
    let resolve = handle.expect("executor runs synchronously");

    let settler = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        resolve.call(Value::from(1));
    });

    let combined = Promise::all(
        scheduler.clone(),
        Value::List(vec![
            Value::Promise(slow),
            Value::Promise(Promise::resolve(scheduler.clone(), Value::from(2))),
        ]),
    );
    assert_eq!(
        block_on(combined.settled()),
        Ok(Value::List(vec![Value::from(1), Value::from(2)]))
    );
    settler.join().expect("the settling thread has panicked");
}

#[test]
fn race_prefers_whoever_settles_first() {
    let scheduler = Arc::new(ThreadScheduler::new());
    let mut handle = None;
    let slow = Promise::new(scheduler.clone(), |resolve, _reject| {
        handle = Some(resolve);
        Ok(())
    });
    let resolve = handle.expect("executor runs synchronously");

    let settler = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        resolve.call(Value::from("slow"));
    });

    let winner = Promise::race(
        scheduler.clone(),
        Value::List(vec![
            Value::Promise(slow),
            Value::Promise(Promise::resolve(scheduler.clone(), Value::from("fast"))),
        ]),
    );
    assert_eq!(block_on(winner.settled()), Ok(Value::from("fast")));
    settler.join().expect("the settling thread has panicked");
}

#[test]
fn scheduler_shutdown_is_observable() {
    let scheduler = ThreadScheduler::new();
    scheduler.shutdown().unwrap();
    assert_eq!(scheduler.shutdown(), Err(Error::SchedulerClosed));
    assert_eq!(
        scheduler.schedule(Box::new(|| {})),
        Err(Error::SchedulerClosed)
    );
}
