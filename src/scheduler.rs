//! Task-queue capability behind deferred dispatch.
//!
//! A promise never runs an observer inline; it hands a [`Job`] to its
//! [`Scheduler`] and the scheduler runs it on a later turn. The concrete
//! mechanism is interchangeable: [`ThreadScheduler`] hops onto a worker
//! thread, [`QueueScheduler`] holds jobs until the caller drains them.

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::Error;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send>;

/// Shared handle to a scheduler.
pub type SchedulerRef = Arc<dyn Scheduler>;

/// Runs jobs on a strictly later turn than the call that scheduled them,
/// in the order they were scheduled.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, job: Job) -> Result<(), Error>;
}

/// Scheduler backed by a dedicated worker thread.
///
/// Jobs travel over an mpsc channel and run one at a time on the worker, so
/// the later-turn and in-order guarantees hold even when jobs are scheduled
/// from several threads at once.
pub struct ThreadScheduler {
    sender: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadScheduler {
    pub fn new() -> ThreadScheduler {
        let (sender, receiver) = channel::<Job>();
        let worker = thread::spawn(move || {
            while let Ok(job) = receiver.recv() {
                job();
            }
        });
        ThreadScheduler {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Stops accepting jobs, lets the worker finish what is already queued,
    /// and joins it. Fails with [`Error::SchedulerClosed`] on a second call.
    pub fn shutdown(&self) -> Result<(), Error> {
        let sender = self.sender.lock().unwrap().take();
        if sender.is_none() {
            return Err(Error::SchedulerClosed);
        }
        drop(sender);
        if let Some(worker) = self.worker.lock().unwrap().take() {
            let _ = worker.join();
        }
        Ok(())
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, job: Job) -> Result<(), Error> {
        match self.sender.lock().unwrap().as_ref() {
            Some(sender) => sender.send(job).map_err(|_| Error::SchedulerClosed),
            None => Err(Error::SchedulerClosed),
        }
    }
}

impl Drop for ThreadScheduler {
    // Disconnect the channel; the worker drains whatever is queued and exits.
    // Joining here could deadlock when the last handle is dropped by a job.
    fn drop(&mut self) {
        self.sender.lock().unwrap().take();
    }
}

/// Deterministic scheduler for tests and synchronous-but-deferred embeddings.
///
/// Jobs accumulate until the owner drains them, which makes "has this run
/// yet?" assertions exact.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use eventual::{QueueScheduler, Scheduler};
///
/// let scheduler = QueueScheduler::new();
/// let ran = Arc::new(AtomicBool::new(false));
/// let flag = ran.clone();
/// scheduler.schedule(Box::new(move || flag.store(true, Ordering::SeqCst))).unwrap();
///
/// assert!(!ran.load(Ordering::SeqCst));
/// scheduler.run_until_idle();
/// assert!(ran.load(Ordering::SeqCst));
/// ```
#[derive(Default)]
pub struct QueueScheduler {
    jobs: Mutex<VecDeque<Job>>,
}

impl QueueScheduler {
    pub fn new() -> QueueScheduler {
        QueueScheduler::default()
    }

    /// Runs the next queued job. Returns `false` when the queue is empty.
    pub fn step(&self) -> bool {
        let job = self.jobs.lock().unwrap().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Drains the queue, including jobs enqueued by the jobs themselves.
    /// Returns how many jobs ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.step() {
            ran += 1;
        }
        ran
    }

    pub fn is_idle(&self) -> bool {
        self.jobs.lock().unwrap().is_empty()
    }
}

impl Scheduler for QueueScheduler {
    fn schedule(&self, job: Job) -> Result<(), Error> {
        self.jobs.lock().unwrap().push_back(job);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    #[test]
    fn queued_jobs_run_in_fifo_order() {
        let scheduler = QueueScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 1..=3 {
            let order = order.clone();
            scheduler
                .schedule(Box::new(move || order.lock().unwrap().push(tag)))
                .unwrap();
        }
        assert_eq!(scheduler.run_until_idle(), 3);
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn jobs_may_enqueue_more_work() {
        let scheduler = Arc::new(QueueScheduler::new());
        let inner = scheduler.clone();
        scheduler
            .schedule(Box::new(move || {
                inner.schedule(Box::new(|| {})).unwrap();
            }))
            .unwrap();
        assert_eq!(scheduler.run_until_idle(), 2);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn thread_scheduler_runs_jobs_off_thread() {
        let scheduler = ThreadScheduler::new();
        let (sender, receiver) = channel();
        scheduler
            .schedule(Box::new(move || {
                sender.send(thread::current().id()).unwrap();
            }))
            .unwrap();
        let worker = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(worker, thread::current().id());
    }

    #[test]
    fn shutdown_rejects_further_jobs() {
        let scheduler = ThreadScheduler::new();
        scheduler.shutdown().unwrap();
        assert_eq!(scheduler.shutdown(), Err(Error::SchedulerClosed));
        assert_eq!(
            scheduler.schedule(Box::new(|| {})),
            Err(Error::SchedulerClosed)
        );
    }
}
