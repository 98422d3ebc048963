//! The empty producer singleton.

use super::{FrameCount, FrameProducer};
use crate::error::ProducerError;
use crate::frame::{Frame, FrameFlags, Pull};
use std::sync::{Arc, OnceLock};

/// Producer that yields nothing. Compared by identity.
#[derive(Debug, Default)]
pub struct EmptyProducer;

impl FrameProducer for EmptyProducer {
    fn name(&self) -> &str {
        "empty"
    }

    fn receive(&self, _flags: FrameFlags) -> Result<Pull, ProducerError> {
        Ok(Pull::Frame(Frame::empty()))
    }

    fn last_frame(&self) -> Frame {
        Frame::empty()
    }

    fn frame_count(&self) -> FrameCount {
        FrameCount::Unbounded
    }

    fn info(&self) -> serde_json::Value {
        serde_json::json!({ "type": "empty-producer" })
    }
}

/// The shared "nothing loaded" producer.
pub fn empty_producer() -> Arc<dyn FrameProducer> {
    static EMPTY: OnceLock<Arc<dyn FrameProducer>> = OnceLock::new();
    Arc::clone(EMPTY.get_or_init(|| Arc::new(EmptyProducer)))
}

/// Check whether `producer` is the empty producer singleton.
pub fn is_empty_producer(producer: &Arc<dyn FrameProducer>) -> bool {
    Arc::ptr_eq(producer, &empty_producer())
}
