//! Stage benchmark: Measure tick throughput and mutation latency.
//!
//! Target: < 50µs per tick with 16 layers

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use playout::frame::{FrameData, FrameTag, PixelFormatDesc};
use playout::{
    ChannelTarget, ColorProducer, FrameFactory, FrameTransform, LoadOptions, Stage, StageConfig,
    Tweener,
};
use std::sync::Arc;

struct HeapFactory;

impl FrameFactory for HeapFactory {
    fn create_frame(&self, tag: FrameTag, desc: &PixelFormatDesc) -> FrameData {
        FrameData::alloc(tag, desc.clone())
    }
}

fn stage_with_layers(layers: i32) -> (Arc<Stage>, crossbeam_channel::Receiver<playout::StageFrames>) {
    let (target, rx) = ChannelTarget::new(1);
    let stage = Stage::new(Arc::new(target), StageConfig::default()).unwrap();
    for index in 0..layers {
        let color = 0xFF00_0000 | index.unsigned_abs();
        let producer = ColorProducer::new(&HeapFactory, color);
        stage
            .load(index, Arc::new(producer), LoadOptions::auto_play(0))
            .unwrap();
        let half = FrameTransform {
            opacity: 0.5,
            ..FrameTransform::IDENTITY
        };
        stage.apply_transform(index, half, u32::MAX, Tweener::LINEAR).unwrap();
    }
    (stage, rx)
}

fn tick_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for layers in [1, 16, 64] {
        let (stage, rx) = stage_with_layers(layers);
        stage.spawn_token().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(layers), &layers, |b, _| {
            // Each received bundle is dropped, which schedules the next tick.
            b.iter(|| rx.recv().unwrap().frames.len())
        });
    }

    group.finish();
}

fn mutation_latency(c: &mut Criterion) {
    let (stage, _rx) = stage_with_layers(16);

    c.bench_function("pause_resume_16_layers", |b| {
        b.iter(|| {
            stage.pause(3).unwrap();
            stage.resume(3).unwrap().get().unwrap();
        })
    });

    c.bench_function("swap_layer", |b| {
        b.iter(|| stage.swap_layer(1, 2).unwrap().get().unwrap())
    });
}

criterion_group!(benches, tick_throughput, mutation_latency);
criterion_main!(benches);
