//! Frame module: What flows from producers through layers to the compositor.
//!
//! This module contains:
//! - [`Frame`]: Shared frame handle with per-handle transform and mute state
//! - [`FrameFlags`]: Pull hints for producers
//! - [`FrameTransform`] and [`TweenedTransform`]: Placement and its animation
//! - [`VideoFormatDesc`] and [`PixelFormatDesc`]: Timing and pixel layout

mod format;
#[allow(clippy::module_inception)]
mod frame;
mod transform;

pub use format::{FieldMode, PixelFormat, PixelFormatDesc, PlaneDesc, VideoFormatDesc};
pub use frame::{Frame, FrameData, FrameFlags, FrameTag, Pull};
pub use transform::{FrameTransform, TweenedTransform, Tweener};
