//! Stage: Per-channel layer state and the tick loop that feeds a compositor.
//!
//! # Architecture
//!
//! ```text
//!  callers (any thread)              stage worker
//! ┌─────────────────┐  high   ┌──────────────────────────────┐
//! │ load/play/swap  │ ──────▶ │ mutate layers & transforms   │
//! └─────────────────┘         │                              │
//!                     normal  │ tick: per layer, in order    │   StageFrames
//!   token released ─────────▶ │   advance transform          │ ─────────────▶ target
//!                             │   receive frame              │
//!                             └──────────────────────────────┘
//! ```
//!
//! The target releases each tick's [`Token`] once it is done with the frames;
//! the release schedules the next tick.

mod info;
mod layer;
#[allow(clippy::module_inception)]
mod stage;
mod token;

pub use info::{LayerInfo, LayerStatus, StageInfo};
pub use layer::{Layer, LoadOptions};
pub use stage::{LayerSlot, Stage, StageConfig, StageFrames};
pub use token::Token;
