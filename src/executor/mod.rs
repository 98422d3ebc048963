//! Executor: The single concurrency primitive of the playout core.
//!
//! An [`Executor`] owns one worker thread and two queues:
//! - **High**: unbounded; fully drained before every normal task
//! - **Normal**: FIFO, bounded by a tunable capacity (blocking push)
//!
//! # Architecture
//!
//! ```text
//!  any thread                         worker thread
//! ┌──────────────┐  begin_invoke   ┌─────────────────────────────┐
//! │   caller     │ ──────────────▶ │ pop normal ─▶ drain high ─▶ │
//! │              │ ◀────────────── │ run normal                  │
//! └──────────────┘   TaskFuture    └─────────────────────────────┘
//! ```
//!
//! Calls made from the worker thread itself (`invoke`, `TaskFuture::get`)
//! run inline so a task can call back into its own executor.

#[allow(clippy::module_inception)]
mod executor;
mod queue;
mod task;

pub use executor::{Executor, ExecutorConfig, FaultSink, TracingSink};
pub use task::{Priority, TaskFuture};
