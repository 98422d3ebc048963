//! Compositor interface: Where a stage's per-tick output goes.
//!
//! The pixel blender itself is external. The stage only needs a
//! [`FrameTarget`] to hand each tick's frames to; producers need a
//! [`FrameFactory`] to allocate frames. A full [`Compositor`] is both, plus
//! per-layer blend modes and a status snapshot.

use crate::error::StageError;
use crate::executor::TaskFuture;
use crate::frame::{FrameData, FrameTag, PixelFormatDesc};
use crate::stage::StageFrames;
use crossbeam_channel::{bounded, Receiver, SendError, Sender};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Receives the output of each stage tick.
pub trait FrameTarget: Send + Sync {
    /// Accept one tick's frames. The bundle's token is released by dropping
    /// it once the frames are no longer read.
    ///
    /// A target that can no longer accept frames hands the bundle back; the
    /// stage then stops scheduling ticks for that token.
    fn send(&self, frames: StageFrames) -> Result<(), StageFrames>;
}

/// Allocates frames for producers.
pub trait FrameFactory: Send + Sync {
    /// Allocate a writable frame with the given layout.
    fn create_frame(&self, tag: FrameTag, desc: &PixelFormatDesc) -> FrameData;
}

/// A frame blender fed by a stage.
pub trait Compositor: FrameTarget + FrameFactory {
    /// Set how a layer is blended onto the layers below it.
    fn set_blend_mode(&self, index: i32, mode: BlendMode);

    /// Status snapshot.
    fn info(&self) -> TaskFuture<serde_json::Value>;
}

/// How a layer is blended onto the layers below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Alpha over.
    #[default]
    Normal,
    /// Keep the lighter of both.
    Lighten,
    /// Keep the darker of both.
    Darken,
    /// Multiply colors.
    Multiply,
    /// Average colors.
    Average,
    /// Add colors.
    Add,
    /// Subtract colors.
    Subtract,
    /// Absolute difference.
    Difference,
    /// Inverted multiply.
    Screen,
    /// Multiply or screen depending on the base.
    Overlay,
    /// Soft overlay.
    SoftLight,
    /// Overlay with layers swapped.
    HardLight,
    /// Brighten the base.
    ColorDodge,
    /// Darken the base.
    ColorBurn,
}

/// Registered blend mode names.
const BLEND_MODES: &[(&str, BlendMode)] = &[
    ("normal", BlendMode::Normal),
    ("lighten", BlendMode::Lighten),
    ("darken", BlendMode::Darken),
    ("multiply", BlendMode::Multiply),
    ("average", BlendMode::Average),
    ("add", BlendMode::Add),
    ("subtract", BlendMode::Subtract),
    ("difference", BlendMode::Difference),
    ("screen", BlendMode::Screen),
    ("overlay", BlendMode::Overlay),
    ("soft_light", BlendMode::SoftLight),
    ("hard_light", BlendMode::HardLight),
    ("color_dodge", BlendMode::ColorDodge),
    ("color_burn", BlendMode::ColorBurn),
];

impl BlendMode {
    /// Canonical name.
    pub fn name(self) -> &'static str {
        BLEND_MODES
            .iter()
            .find(|(_, mode)| *mode == self)
            .map_or("normal", |(name, _)| name)
    }
}

impl FromStr for BlendMode {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.replace('-', "_");
        BLEND_MODES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&wanted))
            .map(|&(_, mode)| mode)
            .ok_or_else(|| StageError::UnknownBlendMode(s.to_string()))
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A [`FrameTarget`] that forwards each tick into a bounded channel.
///
/// When the channel is full, the stage worker blocks until the consumer
/// catches up.
#[derive(Debug, Clone)]
pub struct ChannelTarget {
    /// Tick sender.
    tx: Sender<StageFrames>,
}

impl ChannelTarget {
    /// Create a target and the receiver its ticks arrive on.
    pub fn new(capacity: usize) -> (Self, Receiver<StageFrames>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }
}

impl FrameTarget for ChannelTarget {
    fn send(&self, frames: StageFrames) -> Result<(), StageFrames> {
        self.tx.send(frames).map_err(SendError::into_inner)
    }
}
