//! Criterion benchmarks for resynth-core DSP primitives
//!
//! Run with: cargo bench -p resynth-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use resynth_core::{
    ChannelSettings, ChannelState, EnvelopeFollower, Oscillator, PitchSettings, PitchTracker,
};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];

fn generate_test_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            (2.0 * std::f32::consts::PI * 220.0 * t).sin() * 0.5
        })
        .collect()
}

fn bench_pitch(c: &mut Criterion) {
    let mut group = c.benchmark_group("PitchTracker");

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);

        group.bench_with_input(
            BenchmarkId::new("process", block_size),
            &block_size,
            |b, _| {
                let mut tracker = PitchTracker::new(SAMPLE_RATE, PitchSettings::default());
                b.iter(|| {
                    for &sample in &input {
                        black_box(tracker.process(black_box(sample)));
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("EnvelopeFollower");

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);

        group.bench_with_input(
            BenchmarkId::new("process", block_size),
            &block_size,
            |b, _| {
                let mut env = EnvelopeFollower::new(SAMPLE_RATE);
                b.iter(|| {
                    for &sample in &input {
                        black_box(env.process(black_box(sample)));
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("Oscillator");

    for &block_size in BLOCK_SIZES {
        group.bench_with_input(
            BenchmarkId::new("square", block_size),
            &block_size,
            |b, &size| {
                let mut osc = Oscillator::new(SAMPLE_RATE);
                b.iter(|| {
                    for _ in 0..size {
                        black_box(osc.process(black_box(220.0)));
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_voice(c: &mut Criterion) {
    let mut group = c.benchmark_group("ChannelState");

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);

        group.bench_with_input(
            BenchmarkId::new("process", block_size),
            &block_size,
            |b, _| {
                let mut voice = ChannelState::new(SAMPLE_RATE, &ChannelSettings::default());
                b.iter(|| {
                    for &sample in &input {
                        black_box(voice.process(black_box(sample)));
                    }
                });
            },
        );
    }

    group.finish();
}

/// One 256-frame callback's worth of work for 8 staggered channels. Each
/// iteration is one block; its time should stay well under the 5.33 ms block
/// period at 48 kHz.
fn bench_multichannel_block(c: &mut Criterion) {
    const CHANNELS: usize = 8;
    const BLOCK: usize = 256;

    let mut group = c.benchmark_group("MultichannelBlock");
    let input = generate_test_signal(BLOCK * 64);

    group.bench_function(BenchmarkId::new("channels", CHANNELS), |b| {
        let mut voices: Vec<ChannelState> = (0..CHANNELS)
            .map(|ch| {
                let voice = ChannelState::new(SAMPLE_RATE, &ChannelSettings::default());
                let offset = ch * voice.pitch().hop() / CHANNELS;
                voice.with_analysis_offset(offset)
            })
            .collect();
        let mut blocks = input.chunks_exact(BLOCK).cycle();
        b.iter(|| {
            let Some(block) = blocks.next() else {
                return;
            };
            for &sample in block {
                for voice in &mut voices {
                    black_box(voice.process(black_box(sample)));
                }
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_pitch,
    bench_envelope,
    bench_oscillator,
    bench_voice,
    bench_multichannel_block
);
criterion_main!(benches);
