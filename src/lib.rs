//! # Playout
//!
//! The scheduling and frame-pipeline core of a broadcast playout engine.
//!
//! A playout channel renders a fixed number of frames per second while
//! operators load, play, swap and animate layers from any thread. This crate
//! keeps those two worlds apart without locking layer state.
//!
//! ## Core Concepts
//!
//! - **Executor**: One worker thread per component, with a high-priority
//!   queue drained before every normal task and reentrant `invoke`
//! - **Layer**: A foreground/background producer pair with auto-play,
//!   preview and per-layer fault isolation
//! - **Stage**: The layers of one channel plus their animated transforms,
//!   ticked on its executor and paced by per-tick tokens
//! - **Monitor**: Path-addressed events fanned out through scoped subjects
//!
//! ## Example
//!
//! ```rust,ignore
//! use playout::{ChannelTarget, LoadOptions, Stage, StageConfig};
//! use std::sync::Arc;
//!
//! let (target, frames) = ChannelTarget::new(2);
//! let stage = Stage::new(Arc::new(target), StageConfig::default())?;
//! stage.load(10, producer, LoadOptions::auto_play(0))?;
//! stage.spawn_token()?;
//!
//! for tick in frames {
//!     composite(&tick.frames);
//!     // Dropping `tick` releases its token and schedules the next tick.
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod compositor;
pub mod error;
pub mod executor;
pub mod frame;
pub mod monitor;
pub mod producer;
pub mod stage;

// Re-exports for convenience
pub use compositor::{BlendMode, ChannelTarget, Compositor, FrameFactory, FrameTarget};
pub use error::{ExecutorError, ProducerError, StageError, StageResult};
pub use executor::{Executor, ExecutorConfig, FaultSink, Priority, TaskFuture, TracingSink};
pub use frame::{
    FieldMode, Frame, FrameFlags, FrameTransform, PixelFormatDesc, Pull, Tweener, VideoFormatDesc,
};
pub use monitor::{Event, MonitorPath, Observer, Param, Subject};
pub use producer::{empty_producer, ColorProducer, FrameCount, FrameProducer};
pub use stage::{LayerInfo, LayerSlot, LayerStatus, LoadOptions, Stage, StageConfig, StageFrames, StageInfo};
