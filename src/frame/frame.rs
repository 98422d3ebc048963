//! Frame: An immutable, cheaply cloned handle to produced pixels and audio.
//!
//! Frames are what producers hand to layers and what the stage hands to the
//! compositor. Pixel data is shared; each handle carries its own transform
//! and mute state, so the same source frame can appear with different
//! placements (e.g. the two fields of an interlaced frame).

use super::format::{FieldMode, PixelFormatDesc};
use super::transform::FrameTransform;
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Hints passed to a producer when pulling a frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FrameFlags: u8 {
        /// Only the alpha channel will be used (key layer).
        const ALPHA_ONLY = 0b0000_0001;
        /// The output needs progressive content.
        const DEINTERLACE = 0b0000_0010;
    }
}

/// Identifies the allocator of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameTag(pub u64);

/// Pixel planes and audio samples of a produced frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameData {
    /// Allocator tag.
    tag: FrameTag,
    /// Pixel layout.
    desc: PixelFormatDesc,
    /// One buffer per plane.
    planes: Vec<Vec<u8>>,
    /// Interleaved audio samples.
    audio: Vec<i32>,
}

impl FrameData {
    /// Allocate zeroed planes for the given layout.
    pub fn alloc(tag: FrameTag, desc: PixelFormatDesc) -> Self {
        let planes = desc.planes.iter().map(|plane| vec![0; plane.size()]).collect();
        Self {
            tag,
            desc,
            planes,
            audio: Vec::new(),
        }
    }

    /// Allocator tag.
    #[inline]
    pub const fn tag(&self) -> FrameTag {
        self.tag
    }

    /// Pixel layout.
    #[inline]
    pub const fn desc(&self) -> &PixelFormatDesc {
        &self.desc
    }

    /// Pixel data of a plane.
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        self.planes.get(index).map(Vec::as_slice)
    }

    /// Mutable pixel data of a plane.
    pub fn plane_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.planes.get_mut(index).map(Vec::as_mut_slice)
    }

    /// Audio samples.
    pub fn audio(&self) -> &[i32] {
        &self.audio
    }

    /// Replace the audio samples.
    pub fn set_audio(&mut self, samples: Vec<i32>) {
        self.audio = samples;
    }
}

/// What a frame handle points at.
#[derive(Debug, Clone)]
enum Content {
    /// Nothing (transparent, silent).
    Empty,
    /// A produced frame.
    Data(Arc<FrameData>),
    /// Two fields woven into one interlaced frame.
    Fields {
        mode: FieldMode,
        first: Box<Frame>,
        second: Box<Frame>,
    },
}

/// A frame handle with its own transform and mute state.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Shared content.
    content: Content,
    /// Placement applied by the compositor.
    transform: FrameTransform,
    /// Audio is suppressed.
    muted: bool,
}

impl Frame {
    /// The designated empty frame.
    pub const fn empty() -> Self {
        Self {
            content: Content::Empty,
            transform: FrameTransform::IDENTITY,
            muted: false,
        }
    }

    /// Wrap produced data.
    pub fn from_data(data: FrameData) -> Self {
        Self::from_shared(Arc::new(data))
    }

    /// Wrap already shared data.
    pub fn from_shared(data: Arc<FrameData>) -> Self {
        Self {
            content: Content::Data(data),
            transform: FrameTransform::IDENTITY,
            muted: false,
        }
    }

    /// A frozen copy of `frame` with its audio muted.
    pub fn silence(frame: &Self) -> Self {
        Self {
            muted: true,
            ..frame.clone()
        }
    }

    /// Weave two fields into one frame.
    ///
    /// Progressive output only keeps `second`.
    pub fn interlace(first: Self, second: Self, mode: FieldMode) -> Self {
        if !mode.is_interlaced() {
            return second;
        }
        if first.is_empty() && second.is_empty() {
            return Self::empty();
        }
        Self {
            content: Content::Fields {
                mode,
                first: Box::new(first),
                second: Box::new(second),
            },
            transform: FrameTransform::IDENTITY,
            muted: false,
        }
    }

    /// Check whether this is the empty frame.
    pub const fn is_empty(&self) -> bool {
        matches!(self.content, Content::Empty)
    }

    /// Check whether audio is suppressed.
    #[inline]
    pub const fn is_muted(&self) -> bool {
        self.muted
    }

    /// Produced data, if this is a whole frame.
    pub const fn data(&self) -> Option<&Arc<FrameData>> {
        match &self.content {
            Content::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Field order and the two fields, if interlaced.
    pub fn fields(&self) -> Option<(FieldMode, &Self, &Self)> {
        match &self.content {
            Content::Fields {
                mode,
                first,
                second,
            } => Some((*mode, first.as_ref(), second.as_ref())),
            _ => None,
        }
    }

    /// Allocator tag of the underlying data.
    pub fn tag(&self) -> Option<FrameTag> {
        match &self.content {
            Content::Empty => None,
            Content::Data(data) => Some(data.tag()),
            Content::Fields { first, second, .. } => first.tag().or_else(|| second.tag()),
        }
    }

    /// Check whether two handles share the same produced data.
    pub fn same_source(&self, other: &Self) -> bool {
        match (&self.content, &other.content) {
            (Content::Data(a), Content::Data(b)) => Arc::ptr_eq(a, b),
            (Content::Empty, Content::Empty) => true,
            _ => false,
        }
    }

    /// Placement applied by the compositor.
    #[inline]
    pub const fn transform(&self) -> &FrameTransform {
        &self.transform
    }

    /// Replace the placement.
    pub fn set_transform(&mut self, transform: FrameTransform) {
        self.transform = transform;
    }

    /// Builder form of [`Frame::set_transform`].
    #[must_use]
    pub fn with_transform(mut self, transform: FrameTransform) -> Self {
        self.transform = transform;
        self
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::empty()
    }
}

/// Outcome of pulling a frame from a producer.
#[derive(Debug, Clone)]
pub enum Pull {
    /// A new frame.
    Frame(Frame),
    /// No frame is ready yet; the previous one should be repeated.
    Late,
    /// The producer has nothing more to give.
    Eof,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_frame(tag: u64) -> Frame {
        Frame::from_data(FrameData::alloc(FrameTag(tag), PixelFormatDesc::bgra(2, 2)))
    }

    #[test]
    fn test_frame_empty() {
        let frame = Frame::empty();
        assert!(frame.is_empty());
        assert!(frame.tag().is_none());
        assert_eq!(*frame.transform(), FrameTransform::IDENTITY);
    }

    #[test]
    fn test_frame_alloc() {
        let frame = data_frame(3);
        let data = frame.data().unwrap();
        assert_eq!(data.plane(0).unwrap().len(), 16);
        assert!(data.plane(1).is_none());
        assert_eq!(frame.tag(), Some(FrameTag(3)));
    }

    #[test]
    fn test_frame_silence_shares_data() {
        let frame = data_frame(1);
        let silent = Frame::silence(&frame);
        assert!(silent.is_muted());
        assert!(!frame.is_muted());
        assert!(silent.same_source(&frame));
    }

    #[test]
    fn test_frame_interlace() {
        let frame = data_frame(1);
        let progressive = Frame::interlace(frame.clone(), data_frame(2), FieldMode::Progressive);
        assert_eq!(progressive.tag(), Some(FrameTag(2)));

        let woven = Frame::interlace(frame.clone(), frame, FieldMode::Upper);
        let (mode, first, second) = woven.fields().unwrap();
        assert_eq!(mode, FieldMode::Upper);
        assert!(first.same_source(second));

        let empty = Frame::interlace(Frame::empty(), Frame::empty(), FieldMode::Lower);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_frame_flags() {
        let flags = FrameFlags::ALPHA_ONLY | FrameFlags::DEINTERLACE;
        assert!(flags.contains(FrameFlags::ALPHA_ONLY));
        assert_eq!(FrameFlags::default(), FrameFlags::empty());
    }

    #[test]
    fn test_frame_data_mutation() {
        let mut data = FrameData::alloc(FrameTag(0), PixelFormatDesc::bgra(1, 1));
        data.plane_mut(0).unwrap().copy_from_slice(&[1, 2, 3, 4]);
        data.set_audio(vec![5, 6]);
        assert_eq!(data.plane(0).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(data.audio(), &[5, 6]);
    }
}
