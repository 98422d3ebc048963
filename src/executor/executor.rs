//! Executor: A dedicated worker thread draining two priority queues.
//!
//! Every stateful component that must only be touched from one thread owns an
//! executor and routes all of its public operations through it. Callers on
//! other threads block on (or hold) a [`TaskFuture`]; callers already on the
//! worker thread run inline so a task can call back into its own executor.

use super::queue::BoundedQueue;
use super::task::{Outcome, Priority, Task, TaskFuture};
use crate::error::{panic_message, ExecutorError};
use crossbeam_channel::{bounded, unbounded, Receiver, SendError, Sender};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

/// Receives faults that no caller is waiting for.
///
/// Injected at construction so each executor decides where its task
/// failures go.
pub trait FaultSink: Send + Sync {
    /// Report a fault raised on the named executor.
    fn report(&self, executor: &str, message: &str);
}

/// Fault sink that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl FaultSink for TracingSink {
    fn report(&self, executor: &str, message: &str) {
        tracing::error!(executor, "unhandled task fault: {message}");
    }
}

/// Configuration for an [`Executor`].
#[derive(Clone)]
pub struct ExecutorConfig {
    /// Name used for the worker thread and in log output.
    pub name: String,
    /// Capacity of the normal-priority queue (`None` = unbounded).
    pub capacity: Option<usize>,
    /// Where unobserved task faults are reported.
    pub sink: Arc<dyn FaultSink>,
}

impl ExecutorConfig {
    /// Default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "executor".to_string(),
            capacity: None,
            sink: Arc::new(TracingSink),
        }
    }
}

impl fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Entry in the normal-priority queue.
enum Entry {
    /// A task to run.
    Task(Arc<Task>),
    /// Wakes the worker so it re-checks the queues.
    Wake,
}

/// State shared between the executor handle and its worker thread.
struct Shared {
    /// Executor name.
    name: String,
    /// Cleared by `stop()`.
    running: AtomicBool,
    /// High-priority lane (unbounded).
    high_tx: Sender<Arc<Task>>,
    /// High-priority lane, drained by the worker.
    high_rx: Receiver<Arc<Task>>,
    /// Normal-priority lane (bounded).
    normal: BoundedQueue<Entry>,
    /// Fault reporting.
    sink: Arc<dyn FaultSink>,
}

impl Shared {
    /// One scheduling step: pop one normal entry, drain all high-priority
    /// tasks, then run the popped entry.
    fn yield_once(&self) {
        let entry = self.normal.pop();

        while let Ok(task) = self.high_rx.try_recv() {
            task.try_run();
        }

        if let Some(Entry::Task(task)) = entry {
            task.try_run();
        }
    }

    /// Discard all queued tasks. Returns how many were dropped.
    fn discard_pending(&self) -> usize {
        let normal = self.normal.drain();
        let high: Vec<Arc<Task>> = self.high_rx.try_iter().collect();
        let count = high.len()
            + normal
                .iter()
                .filter(|entry| matches!(entry, Entry::Task(_)))
                .count();
        // Dropped here, outside the queue lock: task bodies may own handles
        // whose destructors submit new work.
        drop(normal);
        drop(high);
        count
    }

    /// Main worker loop.
    fn run_loop(&self) {
        let _span = tracing::info_span!("executor", name = %self.name).entered();
        tracing::debug!("worker started");

        while self.running.load(Ordering::Acquire) {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.yield_once())) {
                self.sink.report(&self.name, &panic_message(payload.as_ref()));
            }
        }

        let discarded = self.discard_pending();
        tracing::debug!(discarded, "worker stopped");
    }
}

/// A single-threaded task executor with high and normal priorities.
pub struct Executor {
    /// State shared with the worker.
    shared: Arc<Shared>,
    /// Worker thread handle, taken by `join()`.
    handle: Mutex<Option<JoinHandle<()>>>,
    /// Worker thread id.
    worker: ThreadId,
}

impl Executor {
    /// Spawn an executor with default configuration and the given name.
    pub fn new(name: impl Into<String>) -> Result<Self, ExecutorError> {
        Self::with_config(ExecutorConfig::named(name))
    }

    /// Spawn an executor with custom configuration.
    pub fn with_config(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        let (high_tx, high_rx) = unbounded();
        let shared = Arc::new(Shared {
            name: config.name,
            running: AtomicBool::new(true),
            high_tx,
            high_rx,
            normal: BoundedQueue::new(config.capacity.unwrap_or(usize::MAX)),
            sink: config.sink,
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("playout-{}", shared.name))
            .spawn(move || worker_shared.run_loop())
            .map_err(ExecutorError::Spawn)?;
        let worker = handle.thread().id();

        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
            worker,
        })
    }

    /// Executor name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Check whether the calling thread is this executor's worker.
    #[inline]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.worker
    }

    /// Check whether the executor still accepts tasks.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Number of queued entries across both queues.
    pub fn size(&self) -> usize {
        self.shared.normal.len() + self.shared.high_rx.len()
    }

    /// Capacity of the normal-priority queue.
    pub fn capacity(&self) -> usize {
        self.shared.normal.capacity()
    }

    /// Set the capacity of the normal-priority queue.
    ///
    /// Submitting beyond capacity blocks the submitting thread, except on the
    /// worker thread itself.
    pub fn set_capacity(&self, capacity: usize) {
        self.shared.normal.set_capacity(capacity);
    }

    /// Submit a normal-priority task.
    pub fn begin_invoke<F, R>(&self, func: F) -> Result<TaskFuture<R>, ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.begin_invoke_with(Priority::Normal, func)
    }

    /// Submit a task with the given priority and return its future.
    pub fn begin_invoke_with<F, R>(
        &self,
        priority: Priority,
        func: F,
    ) -> Result<TaskFuture<R>, ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if !self.is_running() {
            return Err(self.not_running());
        }

        let (tx, rx) = bounded::<Outcome<R>>(1);
        let sink = Arc::clone(&self.shared.sink);
        let name = self.shared.name.clone();
        let task = Arc::new(Task::new(Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(func))
                .map_err(|payload| panic_message(payload.as_ref()));
            // Nobody is listening: the fault would otherwise go unseen.
            if let Err(SendError(Err(message))) = tx.send(outcome) {
                sink.report(&name, &message);
            }
        })));
        let future = TaskFuture::pending(rx, Arc::downgrade(&task), self.worker);

        let queued = match priority {
            Priority::High => {
                // The receiver lives in `shared`, so this cannot fail.
                let _ = self.shared.high_tx.send(task);
                self.push_normal(Entry::Wake)
            }
            Priority::Normal => self.push_normal(Entry::Task(task)),
        };

        // Stopped mid-submission: the worker may already have drained the
        // queues, so nothing else would release what was just queued.
        if queued.is_err() || !self.is_running() {
            self.shared.discard_pending();
        }
        queued.map(|()| future)
    }

    /// Run a normal-priority task and wait for its result.
    pub fn invoke<F, R>(&self, func: F) -> Result<R, ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.invoke_with(Priority::Normal, func)
    }

    /// Run a task with the given priority and wait for its result.
    ///
    /// On the worker thread the task runs inline, regardless of queue depth.
    pub fn invoke_with<F, R>(&self, priority: Priority, func: F) -> Result<R, ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return panic::catch_unwind(AssertUnwindSafe(func))
                .map_err(|payload| ExecutorError::Panicked(panic_message(payload.as_ref())));
        }
        self.begin_invoke_with(priority, func)?.get()
    }

    /// Run one scheduling step on the worker thread.
    ///
    /// Blocks for one normal-priority entry, runs every pending high-priority
    /// task, then runs the normal entry.
    pub fn yield_now(&self) -> Result<(), ExecutorError> {
        if !self.is_current() {
            return Err(ExecutorError::InvalidOperation(
                "executor can only yield inside of its worker thread",
            ));
        }
        self.shared.yield_once();
        Ok(())
    }

    /// Block until everything submitted so far has run.
    pub fn wait(&self) -> Result<(), ExecutorError> {
        self.invoke(|| {})
    }

    /// Discard all queued tasks without running them.
    ///
    /// Futures of discarded tasks resolve to [`ExecutorError::Abandoned`].
    pub fn clear(&self) {
        let discarded = self.shared.discard_pending();
        tracing::debug!(executor = %self.shared.name, discarded, "cleared queued tasks");
    }

    /// Stop accepting tasks and wake the worker so it can exit.
    ///
    /// A task that is already running still completes.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::AcqRel) {
            self.shared.normal.close();
            tracing::debug!(executor = %self.shared.name, "stop requested");
        }
    }

    /// Wait for the worker thread to exit.
    pub fn join(&self) -> Result<(), ExecutorError> {
        if self.is_current() {
            return Err(ExecutorError::InvalidOperation(
                "executor cannot join its own worker thread",
            ));
        }
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Push to the normal queue. The worker never blocks on its own queue.
    fn push_normal(&self, entry: Entry) -> Result<(), ExecutorError> {
        let pushed = if self.is_current() {
            self.shared.normal.force_push(entry)
        } else {
            self.shared.normal.push(entry)
        };
        pushed.map_err(|_| self.not_running())
    }

    fn not_running(&self) -> ExecutorError {
        ExecutorError::NotRunning {
            name: self.shared.name.clone(),
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("name", &self.shared.name)
            .field("running", &self.is_running())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.stop();
        // Dropped from inside one of its own tasks: the worker exits on its
        // own once that task returns.
        if !self.is_current() {
            let _ = self.join();
        }
    }
}
