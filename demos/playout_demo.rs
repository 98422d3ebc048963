//! Playout Demo: Drives a stage with color producers into a paced compositor.
//!
//! A red layer fades out while a blue layer is armed behind it and taken to
//! air a little later. The compositor thread paces ticks at the channel's frame interval and
//! releases each token once it has "composited" the frames.
//!
//! Run with `RUST_LOG=debug` to see stage lifecycle output.

use crossbeam_channel::{bounded, Receiver, SendError, Sender};
use playout::{
    BlendMode, ColorProducer, Compositor, Event, FrameFactory, FrameTarget, FrameTransform,
    LoadOptions, Observer, Stage, StageConfig, StageFrames, TaskFuture, Tweener, VideoFormatDesc,
};
use playout::frame::{FrameData, FrameTag, PixelFormatDesc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

/// Number of ticks to run.
const TICKS: usize = 150;

/// A compositor that only counts what it would blend.
struct DemoCompositor {
    /// Tick hand-off to the compositor thread.
    tx: Sender<StageFrames>,
    /// Blend mode per layer.
    blend_modes: Mutex<BTreeMap<i32, BlendMode>>,
    /// Frames composited so far.
    composited: AtomicU64,
}

impl DemoCompositor {
    fn new() -> (Arc<Self>, Receiver<StageFrames>) {
        let (tx, rx) = bounded(2);
        let compositor = Arc::new(Self {
            tx,
            blend_modes: Mutex::new(BTreeMap::new()),
            composited: AtomicU64::new(0),
        });
        (compositor, rx)
    }

    fn composite(&self, tick: &StageFrames) {
        let modes = self.blend_modes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (index, frame) in &tick.frames {
            let mode = modes.get(index).copied().unwrap_or_default();
            tracing::trace!(
                index,
                %mode,
                opacity = frame.transform().opacity,
                empty = frame.is_empty(),
                "blend"
            );
        }
        self.composited.fetch_add(1, Ordering::Relaxed);
    }
}

impl FrameTarget for DemoCompositor {
    fn send(&self, frames: StageFrames) -> Result<(), StageFrames> {
        self.tx.send(frames).map_err(SendError::into_inner)
    }
}

impl FrameFactory for DemoCompositor {
    fn create_frame(&self, tag: FrameTag, desc: &PixelFormatDesc) -> FrameData {
        FrameData::alloc(tag, desc.clone())
    }
}

impl Compositor for DemoCompositor {
    fn set_blend_mode(&self, index: i32, mode: BlendMode) {
        self.blend_modes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(index, mode);
    }

    fn info(&self) -> TaskFuture<serde_json::Value> {
        TaskFuture::ready(serde_json::json!({
            "composited": self.composited.load(Ordering::Relaxed),
        }))
    }
}

/// Prints layer state changes.
struct Printer;

impl Observer for Printer {
    fn on_next(&self, event: &Event) {
        if event.path().as_str().ends_with("/foreground/producer") {
            tracing::debug!("{event}");
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let format = VideoFormatDesc::from_name("720p5000")?;
    let interval = format.interval();
    let (compositor, ticks) = DemoCompositor::new();
    let stage = Stage::new(
        Arc::clone(&compositor) as Arc<dyn FrameTarget>,
        StageConfig {
            format,
            ..StageConfig::default()
        },
    )?;

    let printer = Arc::new(Printer);
    stage.monitor_output().subscribe(&printer);

    let red = ColorProducer::parse(compositor.as_ref(), "#FF0000")?;
    let blue = ColorProducer::parse(compositor.as_ref(), "#0000FF")?;
    compositor.set_blend_mode(20, "screen".parse()?);

    stage.load(10, Arc::new(red), LoadOptions::auto_play(0))?;
    stage.load(20, Arc::new(blue), LoadOptions::default())?;
    stage.apply_transform(
        10,
        FrameTransform {
            opacity: 0.0,
            ..FrameTransform::IDENTITY
        },
        50,
        "easeinoutsine".parse::<Tweener>()?,
    )?;

    // Two ticks in flight: one composited, one being produced.
    stage.spawn_token()?;
    stage.spawn_token()?;

    let consumer = {
        let compositor = Arc::clone(&compositor);
        thread::Builder::new()
            .name("demo-compositor".to_string())
            .spawn(move || {
                let mut next = Instant::now();
                for tick in ticks.iter().take(TICKS) {
                    compositor.composite(&tick);
                    next += interval;
                    thread::sleep(next.saturating_duration_since(Instant::now()));
                    // Dropping `tick` releases its token.
                }
            })?
    };

    thread::sleep(interval * 60);
    stage.play(20)?.get()?;
    tracing::info!("layer 20 on air");

    consumer.join().map_err(|_| anyhow::anyhow!("compositor thread panicked"))?;

    let info = stage.info()?.get()?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    println!("{}", compositor.info().get()?);

    stage.shutdown();
    Ok(())
}
