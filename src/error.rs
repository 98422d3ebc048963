//! Error types shared across the executor, producers and the stage.
//!
//! Each module boundary has its own enum:
//! - [`ExecutorError`]: submission, lifecycle and task failures
//! - [`ProducerError`]: faults raised by a frame producer
//! - [`StageError`]: stage-level failures, wrapping executor errors

use std::any::Any;
use std::io;

/// Errors raised by an [`Executor`](crate::executor::Executor) or observed
/// through a [`TaskFuture`](crate::executor::TaskFuture).
#[derive(thiserror::Error, Debug)]
pub enum ExecutorError {
    /// A task was submitted after the executor was stopped.
    #[error("executor '{name}' is not running")]
    NotRunning {
        /// Name of the executor.
        name: String,
    },

    /// The operation is not allowed from the calling thread.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// The task panicked while running.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was discarded before it ran (cleared or torn down).
    #[error("task was discarded before it ran")]
    Abandoned,

    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread")]
    Spawn(#[source] io::Error),
}

/// Faults reported by a [`FrameProducer`](crate::producer::FrameProducer).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    /// The producer failed while producing a frame.
    #[error("producer fault: {0}")]
    Fault(String),

    /// The producer does not understand the command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The producer panicked.
    #[error("producer panicked: {0}")]
    Panicked(String),
}

/// Errors raised by [`Stage`](crate::stage::Stage) operations.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    /// The stage executor rejected or lost the operation.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// No easing function is registered under this name.
    #[error("unknown tween: {0}")]
    UnknownTween(String),

    /// No blend mode is registered under this name.
    #[error("unknown blend mode: {0}")]
    UnknownBlendMode(String),

    /// No video format is registered under this name.
    #[error("unknown video format: {0}")]
    UnknownFormat(String),
}

/// Convenience result type for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
