//! Audio-rate oscillator driven one sample at a time by a target frequency.
//!
//! The resynthesis voice calls [`Oscillator::process`] once per frame with the
//! pitch tracker's latest estimate. Phase is carried across calls, so changing
//! the frequency never produces a phase jump. Non-sinusoidal waveforms use
//! PolyBLEP (Polynomial Band-Limited Step) to reduce aliasing.

use core::f32::consts::PI;
use libm::{floorf, sinf};

/// Euclidean remainder for f32, compatible with no_std.
#[inline]
fn rem_euclid_f32(a: f32, b: f32) -> f32 {
    let r = a - b * floorf(a / b);
    if r < 0.0 { r + b } else { r }
}

/// Oscillator waveform types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OscillatorWaveform {
    /// Sine waveform: pure fundamental tone.
    Sine,
    /// Square waveform (50% duty cycle), odd harmonics only.
    #[default]
    Square,
    /// Sawtooth waveform, all harmonics.
    Saw,
}

/// Phase-continuous oscillator.
///
/// # Example
///
/// ```rust
/// use resynth_core::{Oscillator, OscillatorWaveform};
///
/// let mut osc = Oscillator::new(48000.0);
/// assert_eq!(osc.waveform(), OscillatorWaveform::Square);
///
/// // Drive it with a new frequency every sample
/// let a = osc.process(220.0);
/// let b = osc.process(221.0);
/// assert!(a.is_finite() && b.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct Oscillator {
    /// Current phase position [0.0, 1.0)
    phase: f32,
    /// Phase increment per sample
    phase_inc: f32,
    sample_rate: f32,
    frequency: f32,
    waveform: OscillatorWaveform,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl Oscillator {
    /// Create a new square-wave oscillator at 0 Hz.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_waveform(sample_rate, OscillatorWaveform::Square)
    }

    /// Create a new oscillator with the given waveform at 0 Hz.
    pub fn with_waveform(sample_rate: f32, waveform: OscillatorWaveform) -> Self {
        Self {
            phase: 0.0,
            phase_inc: 0.0,
            sample_rate,
            frequency: 0.0,
            waveform,
        }
    }

    /// Set frequency in Hz, clamped to `[0, sample_rate / 2]`.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.frequency = freq_hz.clamp(0.0, self.sample_rate * 0.5);
        self.phase_inc = self.frequency / self.sample_rate;
    }

    /// Get current frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Set waveform type.
    pub fn set_waveform(&mut self, waveform: OscillatorWaveform) {
        self.waveform = waveform;
    }

    /// Get current waveform.
    pub fn waveform(&self) -> OscillatorWaveform {
        self.waveform
    }

    /// Set sample rate and recalculate phase increment.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.set_frequency(self.frequency);
    }

    /// Get current sample rate.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Reset phase to 0.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Get current phase in `[0, 1)`.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Produce the next sample at `freq_hz`.
    ///
    /// Retunes only when the frequency actually changed, then advances the
    /// phase by one sample.
    #[inline]
    pub fn process(&mut self, freq_hz: f32) -> f32 {
        if freq_hz != self.frequency {
            self.set_frequency(freq_hz);
        }
        self.advance()
    }

    /// Generate next sample at the current frequency.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let output = self.generate_sample(self.phase, self.phase_inc);
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        output
    }

    #[inline]
    fn generate_sample(&self, phase: f32, dt: f32) -> f32 {
        match self.waveform {
            OscillatorWaveform::Sine => sinf(phase * 2.0 * PI),

            OscillatorWaveform::Saw => {
                let naive = 2.0 * phase - 1.0;
                naive - poly_blep(phase, dt)
            }

            OscillatorWaveform::Square => {
                let naive = if phase < 0.5 { 1.0 } else { -1.0 };
                // Rising edge at phase 0, falling edge at phase 0.5
                naive + poly_blep(phase, dt) - poly_blep(rem_euclid_f32(phase + 0.5, 1.0), dt)
            }
        }
    }
}

/// 4th-order PolyBLEP correction.
///
/// C²-continuous degree-4 piecewise polynomial spanning two samples on each
/// side of a discontinuity. Returns 0.0 away from the edge, and always 0.0
/// when `dt` is zero (a held oscillator has no edges to smooth).
///
/// Reference: Välimäki et al., "Antialiasing Oscillators", IEEE Signal
/// Processing Magazine, 2010.
#[inline]
fn poly_blep(t: f32, dt: f32) -> f32 {
    //   p₁(n) = A₄·n⁴ + A₃·n³ + A₂·n² + A₀  for n ∈ [0,1)
    //   p₂(n) = C·(2-n)⁴                     for n ∈ [1,2)
    const A4: f32 = -43.0 / 48.0;
    const A3: f32 = 7.0 / 6.0;
    const A2: f32 = 0.5;
    const A0: f32 = -1.0;
    const C: f32 = -11.0 / 48.0;

    if dt <= 0.0 {
        return 0.0;
    }

    let dt2 = 2.0 * dt;
    if t < dt2 {
        let n = t / dt;
        if n < 1.0 {
            let n2 = n * n;
            A4 * n2 * n2 + A3 * n2 * n + A2 * n2 + A0
        } else {
            let u = 2.0 - n;
            let u2 = u * u;
            C * u2 * u2
        }
    } else if t > 1.0 - dt2 {
        let n = (1.0 - t) / dt;
        if n < 1.0 {
            let n2 = n * n;
            -(A4 * n2 * n2 + A3 * n2 * n + A2 * n2 + A0)
        } else {
            let u = 2.0 - n;
            let u2 = u * u;
            -(C * u2 * u2)
        }
    } else {
        0.0
    }
}
