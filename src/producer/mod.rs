//! Producers: The external capability that yields frames on demand.
//!
//! Concrete producers (file decoders, live inputs, templates) live outside
//! this crate. A layer only needs the [`FrameProducer`] trait, plus the
//! well-known [`empty_producer`] that stands for "nothing loaded".

mod color;
mod empty;

pub use color::ColorProducer;
pub use empty::{empty_producer, is_empty_producer, EmptyProducer};

use crate::error::ProducerError;
use crate::frame::{Frame, FrameFlags, Pull};
use serde::Serialize;
use std::sync::{Arc, Weak};

/// Total length of a producer's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FrameCount {
    /// A fixed number of frames.
    Finite(i64),
    /// No fixed length (live input, still image).
    Unbounded,
}

impl FrameCount {
    /// Frame count, or `-1` when unbounded.
    #[inline]
    pub const fn or_unbounded_marker(self) -> i64 {
        match self {
            Self::Finite(count) => count,
            Self::Unbounded => -1,
        }
    }
}

/// A source of frames driven by a layer.
///
/// All methods are called on the owning stage's worker thread; producers
/// shared elsewhere use interior mutability.
pub trait FrameProducer: Send + Sync {
    /// Short name used in logs and monitor events.
    fn name(&self) -> &str;

    /// Pull the next frame.
    fn receive(&self, flags: FrameFlags) -> Result<Pull, ProducerError>;

    /// The most recently produced frame.
    fn last_frame(&self) -> Frame;

    /// Total number of frames this producer will yield.
    fn frame_count(&self) -> FrameCount {
        FrameCount::Unbounded
    }

    /// Receive the producer being replaced, for lead-in transitions.
    fn set_leading_producer(&self, _leading: Weak<dyn FrameProducer>) {}

    /// Producer to continue with once this one reaches its end.
    fn following_producer(&self) -> Option<Arc<dyn FrameProducer>> {
        None
    }

    /// Handle a textual command.
    fn call(&self, _foreground: bool, command: &str) -> Result<String, ProducerError> {
        Err(ProducerError::UnknownCommand(command.to_string()))
    }

    /// Status snapshot.
    fn info(&self) -> serde_json::Value {
        serde_json::json!({ "type": self.name() })
    }
}
