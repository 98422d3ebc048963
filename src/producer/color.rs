//! Color Producer: A solid color of unbounded length.

use super::{FrameCount, FrameProducer};
use crate::compositor::FrameFactory;
use crate::error::ProducerError;
use crate::frame::{Frame, FrameFlags, FrameTag, PixelFormatDesc, Pull};

/// Tag used for frames allocated by color producers.
const COLOR_TAG: FrameTag = FrameTag(0xC010);

/// Produces a single 1x1 BGRA frame, scaled up by the compositor.
#[derive(Debug, Clone)]
pub struct ColorProducer {
    /// Color as `0xAARRGGBB`.
    argb: u32,
    /// The one frame this producer ever yields.
    frame: Frame,
}

impl ColorProducer {
    /// Create a producer for the color `0xAARRGGBB`.
    pub fn new(factory: &dyn FrameFactory, argb: u32) -> Self {
        let mut data = factory.create_frame(COLOR_TAG, &PixelFormatDesc::bgra(1, 1));
        if let Some(pixel) = data.plane_mut(0).and_then(|plane| plane.get_mut(..4)) {
            let [a, r, g, b] = argb.to_be_bytes();
            pixel.copy_from_slice(&[b, g, r, a]);
        }
        Self {
            argb,
            frame: Frame::from_data(data),
        }
    }

    /// Parse `#RRGGBB` or `#AARRGGBB` (the `#` is optional).
    pub fn parse(factory: &dyn FrameFactory, color: &str) -> Result<Self, ProducerError> {
        let hex = color.strip_prefix('#').unwrap_or(color);
        if !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(ProducerError::Fault(format!("invalid color: {color}")));
        }
        let value = u32::from_str_radix(hex, 16)
            .map_err(|_| ProducerError::Fault(format!("invalid color: {color}")))?;
        let argb = match hex.len() {
            6 => 0xFF00_0000 | value,
            8 => value,
            _ => return Err(ProducerError::Fault(format!("invalid color: {color}"))),
        };
        Ok(Self::new(factory, argb))
    }

    /// Color as `0xAARRGGBB`.
    #[inline]
    pub const fn argb(&self) -> u32 {
        self.argb
    }
}

impl FrameProducer for ColorProducer {
    fn name(&self) -> &str {
        "color"
    }

    fn receive(&self, _flags: FrameFlags) -> Result<Pull, ProducerError> {
        Ok(Pull::Frame(self.frame.clone()))
    }

    fn last_frame(&self) -> Frame {
        self.frame.clone()
    }

    fn frame_count(&self) -> FrameCount {
        FrameCount::Unbounded
    }

    fn info(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "color-producer",
            "color": format!("#{:08X}", self.argb),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameData;

    struct HeapFactory;

    impl FrameFactory for HeapFactory {
        fn create_frame(&self, tag: FrameTag, desc: &PixelFormatDesc) -> FrameData {
            FrameData::alloc(tag, desc.clone())
        }
    }

    #[test]
    fn test_color_producer_pixel() {
        let producer = ColorProducer::parse(&HeapFactory, "#FF8000").unwrap();
        assert_eq!(producer.argb(), 0xFFFF_8000);

        let frame = producer.last_frame();
        let data = frame.data().unwrap();
        assert_eq!(data.plane(0).unwrap(), &[0x00, 0x80, 0xFF, 0xFF]);
        assert_eq!(frame.tag(), Some(COLOR_TAG));
    }

    #[test]
    fn test_color_producer_repeats_frame() {
        let producer = ColorProducer::new(&HeapFactory, 0x8000_00FF);
        let Pull::Frame(first) = producer.receive(FrameFlags::empty()).unwrap() else {
            panic!("Expected a frame");
        };
        let Pull::Frame(second) = producer.receive(FrameFlags::empty()).unwrap() else {
            panic!("Expected a frame");
        };
        assert!(first.same_source(&second));
        assert_eq!(producer.info()["color"], "#800000FF");
    }

    #[test]
    fn test_color_producer_invalid() {
        assert!(ColorProducer::parse(&HeapFactory, "#12345").is_err());
        assert!(ColorProducer::parse(&HeapFactory, "nothex").is_err());
        assert!(ColorProducer::parse(&HeapFactory, "+FFFFFFF").is_err());
        assert!(ColorProducer::parse(&HeapFactory, "#-FFFFF").is_err());
    }

    /// Hands out planes of the wrong size.
    struct TinyFactory;

    impl FrameFactory for TinyFactory {
        fn create_frame(&self, tag: FrameTag, _desc: &PixelFormatDesc) -> FrameData {
            FrameData::alloc(tag, PixelFormatDesc::bgra(0, 0))
        }
    }

    #[test]
    fn test_color_producer_short_plane() {
        let producer = ColorProducer::new(&TinyFactory, 0xFFFF_0000);
        assert_eq!(producer.argb(), 0xFFFF_0000);
        assert_eq!(producer.last_frame().tag(), Some(COLOR_TAG));
    }
}
