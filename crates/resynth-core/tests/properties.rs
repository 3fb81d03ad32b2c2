//! Property-based tests for resynth-core DSP primitives.
//!
//! Tests mixer algebra, envelope bounds, oscillator stability, and pitch
//! estimate bounds using proptest for randomized input generation.

use proptest::prelude::*;
use resynth_core::{
    ChannelSettings, ChannelState, EnvelopeFollower, Oscillator, OscillatorWaveform,
    PitchSettings, PitchTracker, mix,
};

fn waveform(index: usize) -> OscillatorWaveform {
    match index % 3 {
        0 => OscillatorWaveform::Sine,
        1 => OscillatorWaveform::Square,
        _ => OscillatorWaveform::Saw,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// With silent dry input the mixer outputs exactly half the synthesized
    /// sample.
    #[test]
    fn mixer_silent_dry_halves(synth in -4.0f32..=4.0f32) {
        prop_assert_eq!(mix(0.0, synth), synth * 0.5);
    }

    /// The mixer is symmetric in its two inputs.
    #[test]
    fn mixer_symmetric(a in -1.0f32..=1.0f32, b in -1.0f32..=1.0f32) {
        prop_assert_eq!(mix(a, b), mix(b, a));
    }

    /// Envelope output is non-negative and never exceeds the largest input
    /// magnitude seen so far.
    #[test]
    fn envelope_bounded(
        attack in 0.1f32..50.0f32,
        release in 1.0f32..1000.0f32,
        input in prop::collection::vec(-1.0f32..=1.0f32, 1..512),
    ) {
        let mut env = EnvelopeFollower::with_times(48000.0, attack, release);
        let mut peak = 0.0f32;
        for &x in &input {
            peak = peak.max(x.abs());
            let level = env.process(x);
            prop_assert!(level >= 0.0, "negative envelope {}", level);
            prop_assert!(level <= peak + 1e-6, "envelope {} above peak {}", level, peak);
        }
    }

    /// For any target frequency in range the oscillator stays finite and its
    /// phase stays in [0, 1).
    #[test]
    fn oscillator_stable(
        freq in 0.0f32..24000.0f32,
        wave in 0usize..3,
        samples in 1usize..2048,
    ) {
        let mut osc = Oscillator::with_waveform(48000.0, waveform(wave));
        for _ in 0..samples {
            let y = osc.process(freq);
            prop_assert!(y.is_finite());
            prop_assert!((0.0..1.0).contains(&osc.phase()));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever the input, a published estimate lies inside the configured
    /// bounds.
    #[test]
    fn pitch_estimate_within_bounds(
        min_hz in 40.0f32..200.0f32,
        span in 50.0f32..800.0f32,
        input in prop::collection::vec(-1.0f32..=1.0f32, 4096),
    ) {
        let settings = PitchSettings { min_hz, max_hz: min_hz + span, threshold_db: -40.0 };
        let mut tracker = PitchTracker::new(48000.0, settings);
        for &x in &input {
            tracker.process(x);
            let f = tracker.frequency();
            prop_assert!(f == 0.0 || (min_hz..=min_hz + span).contains(&f), "estimate {}", f);
        }
    }

    /// A voice fed bounded input produces finite, bounded output.
    #[test]
    fn voice_output_finite(input in prop::collection::vec(-1.0f32..=1.0f32, 2048)) {
        let mut voice = ChannelState::new(44100.0, &ChannelSettings::default());
        for &x in &input {
            let y = voice.process(x);
            prop_assert!(y.is_finite());
            prop_assert!(y.abs() < 1.5, "output {}", y);
        }
    }
}
