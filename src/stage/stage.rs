//! Stage: Layers, their transform schedule and the tick loop, all owned by
//! one executor.

use super::info::{LayerInfo, StageInfo};
use super::layer::{Layer, LoadOptions};
use super::token::Token;
use crate::compositor::FrameTarget;
use crate::error::{ProducerError, StageResult};
use crate::executor::{Executor, ExecutorConfig, Priority, TaskFuture};
use crate::frame::{
    FieldMode, Frame, FrameFlags, FrameTransform, TweenedTransform, Tweener, VideoFormatDesc,
};
use crate::monitor::{Event, MonitorPath, Observer, Subject};
use crate::producer::FrameProducer;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

/// Configuration for a [`Stage`].
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Name of the stage executor.
    pub name: String,
    /// Initial video format.
    pub format: VideoFormatDesc,
    /// Capacity of the executor's normal queue (`None` = unbounded).
    pub capacity: Option<usize>,
    /// Scope of the stage's monitor events.
    pub monitor_path: MonitorPath,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            name: "stage".to_string(),
            format: VideoFormatDesc::default(),
            capacity: None,
            monitor_path: MonitorPath::from("stage"),
        }
    }
}

/// One tick's output, handed to the [`FrameTarget`].
#[derive(Debug)]
pub struct StageFrames {
    /// One frame per layer, by index.
    pub frames: BTreeMap<i32, Frame>,
    /// Released once the frames are no longer read.
    pub token: Token,
    /// Format the frames were produced for.
    pub format: VideoFormatDesc,
}

/// Which producer of a layer a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayerSlot {
    /// The producer on air.
    #[default]
    Foreground,
    /// The producer armed for the next `play`.
    Background,
}

/// Transform in effect for one layer index, plus its animation.
#[derive(Debug, Clone, Copy, Default)]
struct TransformSlot {
    /// Value applied on the last tick.
    current: FrameTransform,
    /// Animation in flight. At most one per index.
    animation: Option<TweenedTransform>,
}

impl TransformSlot {
    /// Step the animation once and return the value to apply.
    fn advance(&mut self) -> FrameTransform {
        if let Some(mut animation) = self.animation.take() {
            self.current = animation.fetch_and_tick(1);
            if !animation.is_finished() {
                self.animation = Some(animation);
            }
        }
        self.current
    }

    /// Where the slot is heading.
    fn target(&self) -> FrameTransform {
        self.animation.map_or(self.current, |animation| *animation.dest())
    }
}

/// Layers changed by operations that ran while a tick was rendering.
#[derive(Debug, Default)]
struct Touched {
    /// Set by clears and whole-stage swaps.
    all: bool,
    indices: BTreeSet<i32>,
}

/// Stage state. Never locked across producer or caller code.
struct StageState {
    layers: BTreeMap<i32, Layer>,
    transforms: BTreeMap<i32, TransformSlot>,
    format: VideoFormatDesc,
    /// Per-layer subjects, scoped `layer/<index>` and feeding `monitor`.
    subjects: BTreeMap<i32, Arc<Subject>>,
    monitor: Arc<Subject>,
    /// `Some` between a tick's `prepare` and `commit`.
    touched: Option<Touched>,
}

/// One layer's share of a tick, copied out of the state.
struct LayerTick {
    index: i32,
    layer: Layer,
    /// Transform of the frame, or of its first field.
    first: FrameTransform,
    /// Transform of the second field on interlaced formats.
    second: Option<FrameTransform>,
    subject: Arc<Subject>,
}

impl LayerTick {
    fn render(&mut self, mode: FieldMode) -> Frame {
        let mut flags = FrameFlags::empty();
        if self.first.is_key {
            flags |= FrameFlags::ALPHA_ONLY;
        }
        if mode.is_interlaced() && self.first.moves_vertically() {
            flags |= FrameFlags::DEINTERLACE;
        }

        // Both fields come from a single pull.
        let frame = self.layer.receive(flags);
        match self.second {
            Some(second) => Frame::interlace(
                frame.clone().with_transform(self.first),
                frame.with_transform(second),
                mode,
            ),
            None => frame.with_transform(self.first),
        }
    }
}

impl StageState {
    fn touch(&mut self, index: i32) {
        if let Some(touched) = &mut self.touched {
            touched.indices.insert(index);
        }
    }

    fn touch_all(&mut self) {
        if let Some(touched) = &mut self.touched {
            touched.all = true;
        }
    }

    /// Step every transform and copy out what a tick renders.
    fn prepare(&mut self) -> Vec<LayerTick> {
        self.touched = Some(Touched::default());
        let interlaced = self.format.field_mode.is_interlaced();
        let Self {
            layers,
            transforms,
            subjects,
            monitor,
            ..
        } = self;
        let monitor: &Arc<Subject> = monitor;

        layers
            .iter()
            .map(|(&index, layer)| {
                let slot = transforms.entry(index).or_default();
                let first = slot.advance();
                let second = interlaced.then(|| slot.advance());
                let subject = subjects.entry(index).or_insert_with(|| {
                    let subject =
                        Arc::new(Subject::new(MonitorPath::new().join("layer").join(index)));
                    subject.subscribe(monitor);
                    subject
                });
                LayerTick {
                    index,
                    layer: layer.clone(),
                    first,
                    second,
                    subject: Arc::clone(subject),
                }
            })
            .collect()
    }

    /// Store rendered layers back, except those an operation changed while
    /// the tick rendered. Returns what is left over, to drop unlocked.
    fn commit(&mut self, rendered: Vec<(i32, Layer)>) -> Vec<Layer> {
        let touched = self.touched.take().unwrap_or_default();
        rendered
            .into_iter()
            .filter_map(|(index, layer)| {
                if touched.all || touched.indices.contains(&index) {
                    Some(layer)
                } else {
                    self.layers.insert(index, layer)
                }
            })
            .collect()
    }
}

fn lock(state: &Mutex<StageState>) -> MutexGuard<'_, StageState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Move `left[a]` to `right[b]` and back. Missing entries move as absence.
fn exchange<V>(left: &mut BTreeMap<i32, V>, a: i32, right: &mut BTreeMap<i32, V>, b: i32) {
    let from_left = left.remove(&a);
    let from_right = right.remove(&b);
    if let Some(value) = from_right {
        left.insert(a, value);
    }
    if let Some(value) = from_left {
        right.insert(b, value);
    }
}

/// Swap two entries of one map.
fn exchange_within<V>(map: &mut BTreeMap<i32, V>, a: i32, b: i32) {
    let first = map.remove(&a);
    let second = map.remove(&b);
    if let Some(value) = second {
        map.insert(a, value);
    }
    if let Some(value) = first {
        map.insert(b, value);
    }
}

/// A set of layers driven by one executor.
///
/// Every operation is a task on the stage's executor; mutations run at high
/// priority, ticks at normal priority, so a tick always sees a state between
/// two whole operations.
///
/// Ticks are paced by their tokens: [`Stage::spawn_token`] schedules one tick,
/// and releasing the token that tick hands to the target schedules the next.
/// Each call to `spawn_token` adds one more tick in flight.
///
/// Producers, observers and transform functions run with the state unlocked
/// and may call back into their own stage. A layer changed that way while it
/// is being ticked keeps the change; that tick's progress on it is dropped.
pub struct Stage {
    /// Runs every operation and tick.
    executor: Executor,
    /// Locked by this stage's worker, or by another stage's worker while it
    /// swaps layers with this one.
    state: Arc<Mutex<StageState>>,
    /// Receives each tick's frames.
    target: Arc<dyn FrameTarget>,
    /// Root of the stage's monitor events.
    monitor: Arc<Subject>,
    /// Sequence number of the next token.
    ticks: AtomicU64,
    /// Handle given to tokens and tick tasks.
    this: Weak<Stage>,
}

impl Stage {
    /// Create a stage feeding `target`. No tick runs until
    /// [`spawn_token`](Self::spawn_token) is called.
    pub fn new(target: Arc<dyn FrameTarget>, config: StageConfig) -> StageResult<Arc<Self>> {
        let executor = Executor::with_config(ExecutorConfig {
            capacity: config.capacity,
            ..ExecutorConfig::named(config.name)
        })?;
        let monitor = Arc::new(Subject::new(config.monitor_path));
        let state = StageState {
            layers: BTreeMap::new(),
            transforms: BTreeMap::new(),
            format: config.format,
            subjects: BTreeMap::new(),
            monitor: Arc::clone(&monitor),
            touched: None,
        };
        tracing::debug!(stage = executor.name(), format = %state.format, "stage created");

        Ok(Arc::new_cyclic(|this| Self {
            executor,
            state: Arc::new(Mutex::new(state)),
            target,
            monitor,
            ticks: AtomicU64::new(0),
            this: Weak::clone(this),
        }))
    }

    /// Stage name.
    pub fn name(&self) -> &str {
        self.executor.name()
    }

    /// The executor every operation runs on.
    pub const fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Subject carrying this stage's monitor events.
    pub const fn monitor_output(&self) -> &Arc<Subject> {
        &self.monitor
    }

    fn submit<F, R>(&self, priority: Priority, func: F) -> StageResult<TaskFuture<R>>
    where
        F: FnOnce(&Mutex<StageState>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let state = Arc::clone(&self.state);
        Ok(self
            .executor
            .begin_invoke_with(priority, move || func(&state))?)
    }

    /// Run `func` with the state locked. `func` must not reach producer or
    /// caller code.
    fn update<F, R>(&self, func: F) -> StageResult<TaskFuture<R>>
    where
        F: FnOnce(&mut StageState) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit(Priority::High, move |state| func(&mut lock(state)))
    }

    /// Run `func` on a copy of layer `index` with the state unlocked, then
    /// store the copy.
    fn with_layer<F, R>(&self, index: i32, func: F) -> StageResult<TaskFuture<R>>
    where
        F: FnOnce(&mut Layer) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit(Priority::High, move |state| {
            let mut layer = lock(state).layers.get(&index).cloned().unwrap_or_default();
            let result = func(&mut layer);
            let replaced = {
                let mut state = lock(state);
                state.touch(index);
                state.layers.insert(index, layer)
            };
            drop(replaced);
            result
        })
    }

    /// Run `func` on a copy of layer `index` with the state unlocked. Missing
    /// layers read as a new, stopped layer.
    fn read_layer<F, R>(&self, index: i32, func: F) -> StageResult<TaskFuture<R>>
    where
        F: FnOnce(&Layer) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit(Priority::High, move |state| {
            let layer = lock(state).layers.get(&index).cloned();
            func(&layer.unwrap_or_default())
        })
    }

    // =========================================================================
    // Transforms
    // =========================================================================

    /// Animate layer `index` to `transform` over `duration` ticks.
    ///
    /// Replaces any animation in flight; the new one starts from the value
    /// currently applied.
    pub fn apply_transform(
        &self,
        index: i32,
        transform: FrameTransform,
        duration: u32,
        tweener: Tweener,
    ) -> StageResult<TaskFuture<()>> {
        self.apply_transform_with(index, move |_| transform, duration, tweener)
    }

    /// Animate layer `index` to `func(target)`, where `target` is where the
    /// layer is currently heading.
    pub fn apply_transform_with<F>(
        &self,
        index: i32,
        func: F,
        duration: u32,
        tweener: Tweener,
    ) -> StageResult<TaskFuture<()>>
    where
        F: FnOnce(FrameTransform) -> FrameTransform + Send + 'static,
    {
        self.submit(Priority::High, move |state| {
            let target = lock(state)
                .transforms
                .get(&index)
                .copied()
                .unwrap_or_default()
                .target();
            let dest = func(target);

            let mut state = lock(state);
            let slot = state.transforms.entry(index).or_default();
            slot.animation = Some(TweenedTransform::new(slot.current, dest, duration, tweener));
        })
    }

    /// Reset layer `index` to the identity transform.
    pub fn clear_transforms(&self, index: i32) -> StageResult<TaskFuture<()>> {
        self.update(move |state| {
            state.transforms.remove(&index);
        })
    }

    /// Reset every layer to the identity transform.
    pub fn clear_all_transforms(&self) -> StageResult<TaskFuture<()>> {
        self.update(|state| state.transforms.clear())
    }

    // =========================================================================
    // Ticks
    // =========================================================================

    /// Schedule a tick. Its token schedules the next one when released.
    pub fn spawn_token(&self) -> StageResult<()> {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        let stage = Weak::clone(&self.this);
        self.executor.begin_invoke(move || {
            if let Some(stage) = stage.upgrade() {
                let token = Token::new(tick, Weak::clone(&stage.this));
                stage.tick(token);
            }
        })?;
        Ok(())
    }

    /// Produce one frame per layer and hand them to the target.
    fn tick(&self, token: Token) {
        let started = Instant::now();
        let tick = token.tick();

        let (prepared, format) = {
            let mut state = lock(&self.state);
            (state.prepare(), state.format.clone())
        };

        let mut frames = BTreeMap::new();
        let mut events = Vec::with_capacity(prepared.len());
        let mut rendered = Vec::with_capacity(prepared.len());
        for mut layer_tick in prepared {
            frames.insert(layer_tick.index, layer_tick.render(format.field_mode));
            events.push((layer_tick.subject, layer_tick.layer.events()));
            rendered.push((layer_tick.index, layer_tick.layer));
        }
        let stale = lock(&self.state).commit(rendered);
        drop(stale);

        for (subject, events) in &events {
            events.iter().for_each(|event| subject.on_next(event));
        }

        let interval = format.interval();
        tracing::trace!(stage = self.name(), tick, layers = frames.len(), "tick");
        if let Err(mut rejected) = self.target.send(StageFrames {
            frames,
            token,
            format,
        }) {
            rejected.token.disarm();
            tracing::debug!(stage = self.name(), tick, "frame target closed, tick chain ends");
        }

        self.monitor.on_next(
            &Event::new("profiler/time")
                .with(started.elapsed())
                .with(interval),
        );
    }

    // =========================================================================
    // Layers
    // =========================================================================

    /// Load `producer` into layer `index`.
    pub fn load(
        &self,
        index: i32,
        producer: Arc<dyn FrameProducer>,
        options: LoadOptions,
    ) -> StageResult<TaskFuture<()>> {
        self.with_layer(index, move |layer| layer.load(producer, options))
    }

    /// Freeze layer `index`.
    pub fn pause(&self, index: i32) -> StageResult<TaskFuture<()>> {
        self.with_layer(index, Layer::pause)
    }

    /// Unfreeze layer `index`.
    pub fn resume(&self, index: i32) -> StageResult<TaskFuture<()>> {
        self.with_layer(index, Layer::resume)
    }

    /// Take layer `index`'s background to air.
    pub fn play(&self, index: i32) -> StageResult<TaskFuture<()>> {
        self.with_layer(index, Layer::play)
    }

    /// Take layer `index` off air.
    pub fn stop(&self, index: i32) -> StageResult<TaskFuture<()>> {
        self.with_layer(index, Layer::stop)
    }

    /// Remove layer `index`.
    pub fn clear(&self, index: i32) -> StageResult<TaskFuture<()>> {
        self.submit(Priority::High, move |state| {
            let removed = {
                let mut state = lock(state);
                state.touch(index);
                state.subjects.remove(&index);
                state.layers.remove(&index)
            };
            drop(removed);
        })
    }

    /// Remove every layer.
    pub fn clear_all(&self) -> StageResult<TaskFuture<()>> {
        self.submit(Priority::High, |state| {
            let removed = {
                let mut state = lock(state);
                state.touch_all();
                state.subjects.clear();
                std::mem::take(&mut state.layers)
            };
            drop(removed);
        })
    }

    // =========================================================================
    // Swaps
    // =========================================================================

    /// Exchange layers `index` and `other_index`, transforms included.
    pub fn swap_layer(&self, index: i32, other_index: i32) -> StageResult<TaskFuture<()>> {
        self.update(move |state| {
            state.touch(index);
            state.touch(other_index);
            exchange_within(&mut state.layers, index, other_index);
            exchange_within(&mut state.transforms, index, other_index);
        })
    }

    /// Exchange layer `index` with layer `other_index` of `other`.
    pub fn swap_layer_with(
        self: &Arc<Self>,
        index: i32,
        other_index: i32,
        other: &Arc<Self>,
    ) -> StageResult<()> {
        if Arc::ptr_eq(self, other) {
            self.swap_layer(index, other_index)?.get()?;
            return Ok(());
        }
        self.with_both(other, move |mine, theirs| {
            exchange(&mut mine.layers, index, &mut theirs.layers, other_index);
            exchange(&mut mine.transforms, index, &mut theirs.transforms, other_index);
        })
    }

    /// Exchange every layer and transform with `other`.
    pub fn swap_layers(self: &Arc<Self>, other: &Arc<Self>) -> StageResult<()> {
        if Arc::ptr_eq(self, other) {
            return Ok(());
        }
        self.with_both(other, |mine, theirs| {
            std::mem::swap(&mut mine.layers, &mut theirs.layers);
            std::mem::swap(&mut mine.transforms, &mut theirs.transforms);
        })
    }

    /// Run `func` with both states locked, so no tick of either stage sees
    /// one side swapped without the other.
    #[tracing::instrument(level = "debug", skip_all, fields(stage = %self.name(), other = %other.name()))]
    fn with_both<F>(self: &Arc<Self>, other: &Arc<Self>, func: F) -> StageResult<()>
    where
        F: FnOnce(&mut StageState, &mut StageState) + Send + 'static,
    {
        let mine = Arc::clone(&self.state);
        let theirs = Arc::clone(&other.state);
        let swap = move || {
            // Locked in address order, whichever side initiates.
            let (mut mine, mut theirs) = if Arc::as_ptr(&mine) < Arc::as_ptr(&theirs) {
                let first = lock(&mine);
                (first, lock(&theirs))
            } else {
                let first = lock(&theirs);
                (lock(&mine), first)
            };
            mine.touch_all();
            theirs.touch_all();
            func(&mut mine, &mut theirs);
        };

        // A worker only ever waits on itself here, never on the other stage.
        let runner = if other.executor.is_current() {
            other
        } else {
            self
        };
        runner.executor.invoke_with(Priority::High, swap)?;
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Send a command to a producer of layer `index`.
    pub fn call(
        &self,
        index: i32,
        slot: LayerSlot,
        command: impl Into<String>,
    ) -> StageResult<TaskFuture<Result<String, ProducerError>>> {
        let command = command.into();
        let foreground = slot == LayerSlot::Foreground;
        self.read_layer(index, move |layer| layer.call(foreground, &command))
    }

    /// The producer on air in layer `index`.
    pub fn foreground(&self, index: i32) -> StageResult<TaskFuture<Arc<dyn FrameProducer>>> {
        self.read_layer(index, Layer::foreground)
    }

    /// The producer armed in layer `index`.
    pub fn background(&self, index: i32) -> StageResult<TaskFuture<Arc<dyn FrameProducer>>> {
        self.read_layer(index, Layer::background)
    }

    /// Snapshot of every layer.
    pub fn info(&self) -> StageResult<TaskFuture<StageInfo>> {
        self.submit(Priority::High, |state| {
            let (format, layers) = {
                let state = lock(state);
                (state.format.name.clone(), state.layers.clone())
            };
            StageInfo {
                format,
                layers: layers
                    .iter()
                    .map(|(&index, layer)| (index, layer.info()))
                    .collect(),
            }
        })
    }

    /// Snapshot of layer `index`. Missing layers report as stopped.
    pub fn layer_info(&self, index: i32) -> StageResult<TaskFuture<LayerInfo>> {
        self.read_layer(index, Layer::info)
    }

    // =========================================================================
    // Format & lifecycle
    // =========================================================================

    /// Switch the video format. Applies from the next tick.
    pub fn set_video_format_desc(&self, format: VideoFormatDesc) -> StageResult<TaskFuture<()>> {
        self.update(move |state| {
            tracing::debug!(from = %state.format, to = %format, "video format changed");
            state.format = format;
        })
    }

    /// Current video format.
    pub fn video_format_desc(&self) -> StageResult<VideoFormatDesc> {
        let state = Arc::clone(&self.state);
        Ok(self
            .executor
            .invoke_with(Priority::High, move || lock(&state).format.clone())?)
    }

    /// Stop accepting operations and ticks. Dropping the stage joins the worker.
    pub fn shutdown(&self) {
        self.executor.stop();
    }

    /// Check whether the stage still accepts operations.
    pub fn is_running(&self) -> bool {
        self.executor.is_running()
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("executor", &self.executor)
            .field("monitor", &self.monitor)
            .field("ticks", &self.ticks.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
