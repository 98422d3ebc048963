//! Layer: A foreground/background producer pair with auto-play and pause.
//!
//! A layer is Stopped while its foreground is the empty producer, otherwise
//! Paused or Playing. It is only ever touched on its stage's worker thread.

use super::info::{LayerInfo, LayerStatus};
use crate::error::{panic_message, ProducerError};
use crate::frame::{Frame, FrameFlags, Pull};
use crate::monitor::{Event, Observer};
use crate::producer::{empty_producer, is_empty_producer, FrameCount, FrameProducer};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Longest chain of following producers walked within one pull.
const MAX_FOLLOW: usize = 16;

/// How a producer is loaded into a layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Show the first frame frozen on the foreground.
    pub preview: bool,
    /// Take the background to air this many frames before the foreground
    /// ends. On a stopped layer, play immediately.
    pub auto_play_delta: Option<i32>,
}

impl LoadOptions {
    /// Load for preview.
    pub const fn preview() -> Self {
        Self {
            preview: true,
            auto_play_delta: None,
        }
    }

    /// Load with an auto-play delta.
    pub const fn auto_play(delta: i32) -> Self {
        Self {
            preview: false,
            auto_play_delta: Some(delta),
        }
    }
}

/// One output layer of a stage.
#[derive(Clone)]
pub struct Layer {
    /// The producer on air.
    foreground: Arc<dyn FrameProducer>,
    /// The producer armed for the next `play`.
    background: Arc<dyn FrameProducer>,
    /// Frames pulled since the foreground went on air, while auto-play is armed.
    frame_number: i64,
    /// Auto-play lead, in frames.
    auto_play_delta: Option<i32>,
    /// Frozen on the foreground's last frame.
    paused: bool,
}

impl Layer {
    /// An empty, stopped layer.
    pub fn new() -> Self {
        Self {
            foreground: empty_producer(),
            background: empty_producer(),
            frame_number: 0,
            auto_play_delta: None,
            paused: false,
        }
    }

    /// Arm `producer` as the background.
    pub fn load(&mut self, producer: Arc<dyn FrameProducer>, options: LoadOptions) {
        tracing::debug!(producer = producer.name(), ?options, "load");
        self.background = producer;
        self.auto_play_delta = options.auto_play_delta;

        if options.preview {
            self.play();
            self.receive(FrameFlags::empty());
            self.pause();
        } else if self.auto_play_delta.is_some() && self.status() == LayerStatus::Stopped {
            self.play();
        }
    }

    /// Take the background to air (if any) and resume.
    pub fn play(&mut self) {
        if !is_empty_producer(&self.background) {
            let next = std::mem::replace(&mut self.background, empty_producer());
            next.set_leading_producer(Arc::downgrade(&self.foreground));
            self.foreground = next;
            self.frame_number = 0;
            self.auto_play_delta = None;
        }
        self.resume();
    }

    /// Take the foreground off air and pause.
    pub fn stop(&mut self) {
        self.foreground = empty_producer();
        self.frame_number = 0;
        self.auto_play_delta = None;
        self.pause();
    }

    /// Freeze on the foreground's last frame.
    #[inline]
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Continue pulling frames.
    #[inline]
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Produce this tick's frame.
    ///
    /// A producer fault stops the layer and yields the empty frame.
    pub fn receive(&mut self, flags: FrameFlags) -> Frame {
        match self.try_receive(flags) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(producer = self.foreground.name(), %err, "producer fault, stopping layer");
                self.stop();
                Frame::empty()
            }
        }
    }

    fn try_receive(&mut self, flags: FrameFlags) -> Result<Frame, ProducerError> {
        if self.paused {
            return Ok(Frame::silence(&self.foreground.last_frame()));
        }

        let Some(frame) = self.pull(flags)? else {
            return Ok(Frame::silence(&self.foreground.last_frame()));
        };

        if let Some(delta) = self.auto_play_delta {
            self.frame_number += 1;
            if let FrameCount::Finite(count) = self.foreground.frame_count() {
                if count - self.frame_number - i64::from(delta) < 1 {
                    // `play` clears the delta, so this pulls at most once more.
                    self.play();
                    self.auto_play_delta = None;
                    return self.try_receive(flags);
                }
            }
        }

        Ok(frame)
    }

    /// Pull from the foreground, following its successors on end of stream.
    /// `None` means the producer was late.
    fn pull(&mut self, flags: FrameFlags) -> Result<Option<Frame>, ProducerError> {
        for _ in 0..MAX_FOLLOW {
            let producer = Arc::clone(&self.foreground);
            let pulled = panic::catch_unwind(AssertUnwindSafe(|| producer.receive(flags)))
                .map_err(|payload| ProducerError::Panicked(panic_message(payload.as_ref())))??;

            match pulled {
                Pull::Frame(frame) => return Ok(Some(frame)),
                Pull::Late => return Ok(None),
                Pull::Eof => {
                    let next = producer.following_producer().unwrap_or_else(empty_producer);
                    tracing::debug!(from = producer.name(), to = next.name(), "end of stream");
                    next.set_leading_producer(Arc::downgrade(&producer));
                    self.foreground = next;
                }
            }
        }
        Err(ProducerError::Fault("following producer chain too long".to_string()))
    }

    /// Forward a command to the foreground or background producer.
    pub fn call(&self, foreground: bool, command: &str) -> Result<String, ProducerError> {
        let producer = if foreground {
            &self.foreground
        } else {
            &self.background
        };
        producer.call(foreground, command)
    }

    /// The producer on air.
    pub fn foreground(&self) -> Arc<dyn FrameProducer> {
        Arc::clone(&self.foreground)
    }

    /// The producer armed for the next `play`.
    pub fn background(&self) -> Arc<dyn FrameProducer> {
        Arc::clone(&self.background)
    }

    /// Current state.
    pub fn status(&self) -> LayerStatus {
        if is_empty_producer(&self.foreground) {
            LayerStatus::Stopped
        } else if self.paused {
            LayerStatus::Paused
        } else {
            LayerStatus::Playing
        }
    }

    /// Check whether the layer is paused.
    #[inline]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Frames pulled since the foreground went on air.
    #[inline]
    pub const fn frame_number(&self) -> i64 {
        self.frame_number
    }

    /// Armed auto-play lead.
    #[inline]
    pub const fn auto_play_delta(&self) -> Option<i32> {
        self.auto_play_delta
    }

    /// Status snapshot.
    pub fn info(&self) -> LayerInfo {
        let nb_frames = self.foreground.frame_count();
        let frames_left = match nb_frames {
            FrameCount::Finite(count) => {
                count - self.frame_number - i64::from(self.auto_play_delta.unwrap_or(0))
            }
            FrameCount::Unbounded => -1,
        };
        LayerInfo {
            status: self.status(),
            auto_delta: self.auto_play_delta,
            frame_number: self.frame_number,
            nb_frames: nb_frames.or_unbounded_marker(),
            frames_left,
            foreground: self.foreground.info(),
            background: self.background.info(),
        }
    }

    /// Monitor events describing this layer, relative to the layer's scope.
    pub fn events(&self) -> Vec<Event> {
        vec![
            Event::new("paused").with(self.paused),
            Event::new("frame")
                .with(self.frame_number)
                .with(self.foreground.frame_count().or_unbounded_marker()),
            Event::new("foreground/producer").with(self.foreground.name()),
            Event::new("background/producer").with(self.background.name()),
        ]
    }

    /// Emit this layer's events into `observer`.
    pub fn publish(&self, observer: &dyn Observer) {
        self.events().iter().for_each(|event| observer.on_next(event));
    }
}

impl Default for Layer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("foreground", &self.foreground.name())
            .field("background", &self.background.name())
            .field("frame_number", &self.frame_number)
            .field("auto_play_delta", &self.auto_play_delta)
            .field("paused", &self.paused)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::frame::{FrameData, FrameTag, PixelFormatDesc};
    use crate::monitor::Subject;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::{Mutex, Weak};

    /// A finite clip that counts its pulls.
    pub(crate) struct Clip {
        name: &'static str,
        frames: i64,
        pulled: AtomicI64,
        last: Mutex<Frame>,
        leading: Mutex<Option<Weak<dyn FrameProducer>>>,
        following: Option<Arc<dyn FrameProducer>>,
    }

    impl Clip {
        pub(crate) fn new(name: &'static str, frames: i64) -> Arc<Self> {
            Arc::new(Self::build(name, frames, None))
        }

        pub(crate) fn followed_by(
            name: &'static str,
            frames: i64,
            next: Arc<dyn FrameProducer>,
        ) -> Arc<Self> {
            Arc::new(Self::build(name, frames, Some(next)))
        }

        fn build(name: &'static str, frames: i64, following: Option<Arc<dyn FrameProducer>>) -> Self {
            Self {
                name,
                frames,
                pulled: AtomicI64::new(0),
                last: Mutex::new(Frame::empty()),
                leading: Mutex::new(None),
                following,
            }
        }

        pub(crate) fn pulled(&self) -> i64 {
            self.pulled.load(Ordering::SeqCst)
        }
    }

    impl FrameProducer for Clip {
        fn name(&self) -> &str {
            self.name
        }

        fn receive(&self, _flags: FrameFlags) -> Result<Pull, ProducerError> {
            let n = self.pulled.fetch_add(1, Ordering::SeqCst);
            if n >= self.frames {
                return Ok(Pull::Eof);
            }
            let data = FrameData::alloc(FrameTag(n as u64), PixelFormatDesc::bgra(1, 1));
            let frame = Frame::from_data(data);
            *self.last.lock().unwrap() = frame.clone();
            Ok(Pull::Frame(frame))
        }

        fn last_frame(&self) -> Frame {
            self.last.lock().unwrap().clone()
        }

        fn frame_count(&self) -> FrameCount {
            FrameCount::Finite(self.frames)
        }

        fn set_leading_producer(&self, leading: Weak<dyn FrameProducer>) {
            *self.leading.lock().unwrap() = Some(leading);
        }

        fn following_producer(&self) -> Option<Arc<dyn FrameProducer>> {
            self.following.clone()
        }
    }

    /// A producer that fails on every pull.
    pub(crate) struct Faulty {
        pub(crate) panics: bool,
        pub(crate) pulls: AtomicUsize,
    }

    impl FrameProducer for Faulty {
        fn name(&self) -> &str {
            "faulty"
        }

        fn receive(&self, _flags: FrameFlags) -> Result<Pull, ProducerError> {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            if self.panics {
                panic!("decoder exploded");
            }
            Err(ProducerError::Fault("corrupt packet".to_string()))
        }

        fn last_frame(&self) -> Frame {
            Frame::empty()
        }
    }

    /// A producer that is never ready.
    struct Stalled;

    impl FrameProducer for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        fn receive(&self, _flags: FrameFlags) -> Result<Pull, ProducerError> {
            Ok(Pull::Late)
        }

        fn last_frame(&self) -> Frame {
            Frame::from_data(FrameData::alloc(FrameTag(7), PixelFormatDesc::bgra(1, 1)))
        }
    }

    fn same(a: &Arc<dyn FrameProducer>, b: &Arc<impl FrameProducer + 'static>) -> bool {
        Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
    }

    #[test]
    fn test_new_layer_is_stopped() {
        let mut layer = Layer::new();
        assert_eq!(layer.status(), LayerStatus::Stopped);
        assert!(layer.receive(FrameFlags::empty()).is_empty());
        assert_eq!(layer.info().nb_frames, -1);
    }

    #[test]
    fn test_load_does_not_air() {
        let mut layer = Layer::new();
        let clip = Clip::new("clip", 10);
        layer.load(clip.clone(), LoadOptions::default());

        assert_eq!(layer.status(), LayerStatus::Stopped);
        assert!(same(&layer.background(), &clip));
        assert_eq!(clip.pulled(), 0);
    }

    #[test]
    fn test_load_with_delta_on_stopped_layer_plays() {
        let mut layer = Layer::new();
        let clip = Clip::new("clip", 10);
        layer.load(clip.clone(), LoadOptions::auto_play(3));

        assert_eq!(layer.status(), LayerStatus::Playing);
        assert!(same(&layer.foreground(), &clip));
        assert!(is_empty_producer(&layer.background()));
        assert_eq!(layer.auto_play_delta(), None);
    }

    #[test]
    fn test_play_hands_over_leading_producer() {
        let mut layer = Layer::new();
        let first = Clip::new("first", 10);
        let second = Clip::new("second", 10);
        layer.load(first.clone(), LoadOptions::default());
        layer.play();
        layer.load(second.clone(), LoadOptions::default());
        layer.play();

        let leading = second.leading.lock().unwrap().clone().unwrap();
        assert!(same(&leading.upgrade().unwrap(), &first));
    }

    #[test]
    fn test_auto_play_fires_exactly_once() {
        let mut layer = Layer::new();
        let first = Clip::new("first", 10);
        let second = Clip::new("second", 100);
        layer.load(first.clone(), LoadOptions::default());
        layer.play();
        layer.load(second.clone(), LoadOptions::auto_play(3));
        assert!(same(&layer.foreground(), &first));

        // 10 - n - 3 < 1 first holds at n = 7.
        for _ in 0..6 {
            layer.receive(FrameFlags::empty());
            assert!(same(&layer.foreground(), &first));
        }
        layer.receive(FrameFlags::empty());
        assert!(same(&layer.foreground(), &second));
        assert_eq!(first.pulled(), 7);
        assert_eq!(second.pulled(), 1);

        for _ in 0..20 {
            layer.receive(FrameFlags::empty());
        }
        assert!(same(&layer.foreground(), &second));
        assert_eq!(second.pulled(), 21);
        assert_eq!(layer.auto_play_delta(), None);
    }

    #[test]
    fn test_auto_play_with_empty_background_pulls_once() {
        let mut layer = Layer::new();
        let clip = Clip::new("clip", 2);
        layer.load(clip.clone(), LoadOptions::default());
        layer.play();
        layer.auto_play_delta = Some(5);

        layer.receive(FrameFlags::empty());
        assert!(same(&layer.foreground(), &clip));
        assert_eq!(clip.pulled(), 2);
        assert_eq!(layer.auto_play_delta(), None);
    }

    #[test]
    fn test_producer_fault_stops_layer() {
        let mut layer = Layer::new();
        let faulty = Arc::new(Faulty {
            panics: false,
            pulls: AtomicUsize::new(0),
        });
        layer.load(faulty.clone(), LoadOptions::default());
        layer.play();

        assert!(layer.receive(FrameFlags::empty()).is_empty());
        assert_eq!(layer.status(), LayerStatus::Stopped);
        assert!(layer.is_paused());

        // Stopped layers do not touch the faulty producer again.
        assert!(layer.receive(FrameFlags::empty()).is_empty());
        assert_eq!(faulty.pulls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_producer_panic_is_contained() {
        let mut layer = Layer::new();
        layer.load(
            Arc::new(Faulty {
                panics: true,
                pulls: AtomicUsize::new(0),
            }),
            LoadOptions::auto_play(0),
        );

        assert!(layer.receive(FrameFlags::empty()).is_empty());
        assert_eq!(layer.status(), LayerStatus::Stopped);
    }

    #[test]
    fn test_late_frame_repeats_last() {
        let mut layer = Layer::new();
        layer.load(Arc::new(Stalled), LoadOptions::auto_play(0));

        let frame = layer.receive(FrameFlags::empty());
        assert_eq!(frame.tag(), Some(FrameTag(7)));
        assert!(frame.is_muted());
        assert_eq!(layer.frame_number(), 0);
    }

    #[test]
    fn test_paused_layer_repeats_last_silenced() {
        let mut layer = Layer::new();
        let clip = Clip::new("clip", 10);
        layer.load(clip.clone(), LoadOptions::default());
        layer.play();
        let live = layer.receive(FrameFlags::empty());
        layer.pause();

        let frozen = layer.receive(FrameFlags::empty());
        assert!(frozen.same_source(&live));
        assert!(frozen.is_muted());
        assert_eq!(clip.pulled(), 1);
        assert_eq!(layer.status(), LayerStatus::Paused);
    }

    #[test]
    fn test_preview_shows_first_frame_paused() {
        let mut layer = Layer::new();
        let clip = Clip::new("clip", 10);
        layer.load(clip.clone(), LoadOptions::preview());

        assert_eq!(layer.status(), LayerStatus::Paused);
        assert_eq!(clip.pulled(), 1);
        let frame = layer.receive(FrameFlags::empty());
        assert_eq!(frame.tag(), Some(FrameTag(0)));
        assert_eq!(clip.pulled(), 1);
    }

    #[test]
    fn test_end_of_stream_follows_successor() {
        let mut layer = Layer::new();
        let tail = Clip::new("tail", 5);
        let head = Clip::followed_by("head", 1, tail.clone());
        layer.load(head.clone(), LoadOptions::auto_play(0));

        layer.receive(FrameFlags::empty());
        let frame = layer.receive(FrameFlags::empty());
        assert!(same(&layer.foreground(), &tail));
        assert_eq!(frame.tag(), Some(FrameTag(0)));
        assert!(tail.leading.lock().unwrap().is_some());
    }

    #[test]
    fn test_end_of_stream_without_successor_empties() {
        let mut layer = Layer::new();
        layer.load(Clip::new("clip", 1), LoadOptions::auto_play(0));

        layer.receive(FrameFlags::empty());
        assert!(layer.receive(FrameFlags::empty()).is_empty());
        assert_eq!(layer.status(), LayerStatus::Stopped);
    }

    #[test]
    fn test_info_counts_frames_left() {
        let mut layer = Layer::new();
        layer.load(Clip::new("first", 10), LoadOptions::auto_play(0));
        layer.load(Clip::new("second", 10), LoadOptions::auto_play(2));
        layer.receive(FrameFlags::empty());

        let info = layer.info();
        assert_eq!(info.status, LayerStatus::Playing);
        assert_eq!(info.frame_number, 1);
        assert_eq!(info.nb_frames, 10);
        assert_eq!(info.frames_left, 7);
        assert_eq!(info.auto_delta, Some(2));
        assert_eq!(info.foreground["type"], "first");
    }

    #[test]
    fn test_publish_events() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let observer = Arc::new(tx);
        let subject = Subject::new("layer/4");
        subject.subscribe(&observer);

        let mut layer = Layer::new();
        layer.load(Clip::new("clip", 25), LoadOptions::default());
        layer.publish(&subject);

        let paths: Vec<String> = rx.try_iter().map(|e| e.path().to_string()).collect();
        assert_eq!(
            paths,
            [
                "/layer/4/paused",
                "/layer/4/frame",
                "/layer/4/foreground/producer",
                "/layer/4/background/producer",
            ]
        );
    }
}
