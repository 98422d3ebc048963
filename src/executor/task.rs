//! Tasks: Deferred computations with a single-claim guarantee.
//!
//! A task can be reached from two places: the queue it was pushed to, and the
//! [`TaskFuture`] handed back to the submitter. When the submitter waits on
//! the future from the worker thread itself, the task runs inline instead of
//! deadlocking. The atomic claim flag makes sure the copy still sitting in the
//! queue is skipped afterwards.

use crate::error::ExecutorError;
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, Weak};
use std::thread::{self, ThreadId};

/// Task priority classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    /// Drained completely before each normal-priority task.
    High,
    /// FIFO, subject to the executor's capacity.
    #[default]
    Normal,
}

/// Type-erased task body.
pub(crate) type Job = Box<dyn FnOnce() + Send>;

/// A queued unit of work.
pub(crate) struct Task {
    /// Set by whoever runs the task first.
    claimed: AtomicBool,
    /// The body, taken by the claimant.
    job: Mutex<Option<Job>>,
}

impl Task {
    /// Wrap a job.
    pub(crate) fn new(job: Job) -> Self {
        Self {
            claimed: AtomicBool::new(false),
            job: Mutex::new(Some(job)),
        }
    }

    /// Run the task unless it has already been claimed.
    ///
    /// Returns `false` when another caller won the claim.
    pub(crate) fn try_run(&self) -> bool {
        if self.claimed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let job = self
            .job
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(job) = job {
            job();
        }
        true
    }

    /// Check whether the task has been claimed.
    pub(crate) fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("claimed", &self.is_claimed())
            .finish_non_exhaustive()
    }
}

/// Outcome sent from a task body to its future. `Err` carries a panic message.
pub(crate) type Outcome<R> = Result<R, String>;

/// The result channel of a submitted task.
///
/// Dropping the future does not cancel the task.
pub struct TaskFuture<R> {
    /// Receives the task outcome.
    rx: Receiver<Outcome<R>>,
    /// The task and its worker, for inline execution on the worker thread.
    origin: Option<(Weak<Task>, ThreadId)>,
}

impl<R> TaskFuture<R> {
    /// Create a future bound to a queued task.
    pub(crate) fn pending(rx: Receiver<Outcome<R>>, task: Weak<Task>, worker: ThreadId) -> Self {
        Self {
            rx,
            origin: Some((task, worker)),
        }
    }

    /// Create a future that is already resolved.
    pub fn ready(value: R) -> Self {
        let (tx, rx) = bounded(1);
        let _ = tx.send(Ok(value));
        Self { rx, origin: None }
    }

    /// Check whether the result is available without blocking.
    pub fn is_ready(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Block until the task has run and return its result.
    ///
    /// On the worker thread that owns the task, the task runs inline.
    pub fn get(self) -> Result<R, ExecutorError> {
        self.run_inline_on_worker();
        match self.rx.recv() {
            Ok(outcome) => outcome.map_err(ExecutorError::Panicked),
            Err(_) => Err(ExecutorError::Abandoned),
        }
    }

    /// Return the result if available, or the future itself if not.
    pub fn try_get(self) -> Result<Result<R, ExecutorError>, Self> {
        match self.rx.try_recv() {
            Ok(outcome) => Ok(outcome.map_err(ExecutorError::Panicked)),
            Err(TryRecvError::Disconnected) => Ok(Err(ExecutorError::Abandoned)),
            Err(TryRecvError::Empty) => Err(self),
        }
    }

    /// Claim and run the task here if we are its worker thread.
    fn run_inline_on_worker(&self) {
        if let Some((task, worker)) = &self.origin {
            if *worker == thread::current().id() {
                if let Some(task) = task.upgrade() {
                    task.try_run();
                }
            }
        }
    }
}

impl<R> fmt::Debug for TaskFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_task_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let task = {
            let count = Arc::clone(&count);
            Task::new(Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }))
        };

        assert!(task.try_run());
        assert!(!task.try_run());
        assert!(task.is_claimed());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_future_ready() {
        let future = TaskFuture::ready(7);
        assert!(future.is_ready());
        assert_eq!(future.get().unwrap(), 7);
    }

    #[test]
    fn test_future_abandoned_when_task_dropped() {
        let (tx, rx) = bounded::<Outcome<u32>>(1);
        let task = Arc::new(Task::new(Box::new(move || {
            let _ = tx.send(Ok(1));
        })));
        let future = TaskFuture::pending(rx, Arc::downgrade(&task), thread::current().id());

        // Dropping the only strong handle drops the body and its sender.
        drop(task);
        assert!(matches!(future.get(), Err(ExecutorError::Abandoned)));
    }

    #[test]
    fn test_future_runs_inline_on_owner_thread() {
        let (tx, rx) = bounded::<Outcome<u32>>(1);
        let task = Arc::new(Task::new(Box::new(move || {
            let _ = tx.send(Ok(42));
        })));
        let future = TaskFuture::pending(rx, Arc::downgrade(&task), thread::current().id());

        assert_eq!(future.get().unwrap(), 42);
        // The queued copy lost the claim.
        assert!(!task.try_run());
    }

    #[test]
    fn test_future_try_get_pending() {
        let (tx, rx) = bounded::<Outcome<u32>>(1);
        let task = Arc::new(Task::new(Box::new(|| {})));
        let other = thread::spawn(|| thread::current().id()).join().unwrap();
        let future = TaskFuture::pending(rx, Arc::downgrade(&task), other);

        let future = future.try_get().unwrap_err();
        tx.send(Err("boom".to_string())).unwrap();
        match future.try_get() {
            Ok(Err(ExecutorError::Panicked(message))) => assert_eq!(message, "boom"),
            _ => panic!("Expected a panicked outcome"),
        }
    }
}
