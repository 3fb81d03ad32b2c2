//! Per-channel resynthesis voice.
//!
//! [`ChannelState`] bundles the three stateful processors that run on one
//! channel: pitch tracker, envelope follower, and oscillator. The scheduler
//! owns one per channel and never shares them.

use crate::envelope::{DEFAULT_ATTACK_MS, DEFAULT_RELEASE_MS, EnvelopeFollower};
use crate::math::mix;
use crate::oscillator::{Oscillator, OscillatorWaveform};
use crate::pitch::{PitchSettings, PitchTracker};

/// Construction parameters shared by every channel of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSettings {
    /// Pitch detection bounds and sensitivity.
    pub pitch: PitchSettings,
    /// Envelope attack time in milliseconds.
    pub attack_ms: f32,
    /// Envelope release time in milliseconds.
    pub release_ms: f32,
    /// Oscillator waveform for the resynthesized tone.
    pub waveform: OscillatorWaveform,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            pitch: PitchSettings::default(),
            attack_ms: DEFAULT_ATTACK_MS,
            release_ms: DEFAULT_RELEASE_MS,
            waveform: OscillatorWaveform::Square,
        }
    }
}

/// One channel's processing state.
///
/// # Example
///
/// ```rust
/// use resynth_core::{ChannelSettings, ChannelState};
///
/// let mut voice = ChannelState::new(48000.0, &ChannelSettings::default());
/// // No pitch yet: the oscillator holds, output is the dry half plus a
/// // scaled held square
/// let out = voice.process(0.25);
/// assert!(out.is_finite());
/// assert_eq!(voice.samples_processed(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ChannelState {
    pitch: PitchTracker,
    envelope: EnvelopeFollower,
    oscillator: Oscillator,
    samples_processed: u64,
}

impl ChannelState {
    /// Build a channel voice at `sample_rate`.
    pub fn new(sample_rate: f32, settings: &ChannelSettings) -> Self {
        Self {
            pitch: PitchTracker::new(sample_rate, settings.pitch),
            envelope: EnvelopeFollower::with_times(
                sample_rate,
                settings.attack_ms,
                settings.release_ms,
            ),
            oscillator: Oscillator::with_waveform(sample_rate, settings.waveform),
            samples_processed: 0,
        }
    }

    /// Offset this channel's pitch analyses within the hop.
    ///
    /// See [`PitchTracker::with_analysis_offset`].
    pub fn with_analysis_offset(mut self, offset: usize) -> Self {
        self.pitch = self.pitch.with_analysis_offset(offset);
        self
    }

    /// Run one input sample through the voice and return the mixed output.
    ///
    /// Order is fixed: pitch update, envelope update, oscillator at the
    /// current estimate scaled by the envelope, then the 50/50 mix.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.pitch.process(input);
        let env = self.envelope.process(input);
        let synthesized = self.oscillator.process(self.pitch.frequency()) * env;
        self.samples_processed += 1;
        mix(input, synthesized)
    }

    /// Latest pitch estimate in Hz.
    pub fn frequency(&self) -> f32 {
        self.pitch.frequency()
    }

    /// Current envelope level.
    pub fn envelope_level(&self) -> f32 {
        self.envelope.level()
    }

    /// Number of samples fed to each processor since construction or reset.
    pub fn samples_processed(&self) -> u64 {
        self.samples_processed
    }

    /// The channel's pitch tracker.
    pub fn pitch(&self) -> &PitchTracker {
        &self.pitch
    }

    /// Clear all processor state.
    pub fn reset(&mut self) {
        self.pitch.reset();
        self.envelope.reset();
        self.oscillator.reset();
        self.samples_processed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_in_silence_out() {
        let mut voice = ChannelState::new(48000.0, &ChannelSettings::default());
        for _ in 0..4800 {
            assert_eq!(voice.process(0.0), 0.0);
        }
        assert_eq!(voice.frequency(), 0.0);
    }

    #[test]
    fn test_counts_every_sample() {
        let mut voice = ChannelState::new(44100.0, &ChannelSettings::default());
        for i in 0..1234 {
            voice.process(i as f32 * 1e-4);
        }
        assert_eq!(voice.samples_processed(), 1234);
        voice.reset();
        assert_eq!(voice.samples_processed(), 0);
    }

    #[test]
    fn test_settings_applied() {
        let settings = ChannelSettings {
            attack_ms: 5.0,
            release_ms: 250.0,
            ..ChannelSettings::default()
        };
        let voice = ChannelState::new(48000.0, &settings);
        assert_eq!(voice.envelope.attack_ms(), 5.0);
        assert_eq!(voice.envelope.release_ms(), 250.0);
        assert_eq!(voice.oscillator.waveform(), OscillatorWaveform::Square);
    }

    #[test]
    fn test_output_bounded_for_full_scale_input() {
        let mut voice = ChannelState::new(48000.0, &ChannelSettings::default());
        for n in 0..48000 {
            let x = libm::sinf(core::f32::consts::TAU * 110.0 * n as f32 / 48000.0);
            let y = voice.process(x);
            // |dry| <= 1 and |env * square| stays near 1
            assert!(y.abs() < 1.25, "sample {n}: {y}");
        }
        assert!((voice.frequency() - 110.0).abs() < 2.0);
    }

    #[test]
    fn test_analysis_offset_reaches_tracker() {
        let voice =
            ChannelState::new(48000.0, &ChannelSettings::default()).with_analysis_offset(75);
        assert_eq!(voice.pitch().analysis_offset(), 75);
        let hop = voice.pitch().hop();
        let wrapped = ChannelState::new(48000.0, &ChannelSettings::default())
            .with_analysis_offset(hop + 3);
        assert_eq!(wrapped.pitch().analysis_offset(), 3);
    }
}
