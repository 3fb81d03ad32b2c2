//! Envelope follower for tracking signal amplitude.
//!
//! Scales the resynthesized tone so it breathes with the dry signal.

use crate::math::{flush_denormal, ms_to_samples};
use libm::{expf, fabsf};

/// Default attack time used by the resynthesis voice.
pub const DEFAULT_ATTACK_MS: f32 = 2.0;

/// Default release time used by the resynthesis voice.
pub const DEFAULT_RELEASE_MS: f32 = 100.0;

/// Envelope follower for tracking signal amplitude.
///
/// Uses peak detection with separate attack and release times. Strictly
/// causal: the value returned for sample `n` depends only on samples `<= n`.
///
/// # Example
///
/// ```rust
/// use resynth_core::EnvelopeFollower;
///
/// let mut env = EnvelopeFollower::with_times(48000.0, 2.0, 100.0);
/// let level = env.process(0.5);
/// assert!(level > 0.0 && level <= 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    /// Current envelope level (linear)
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
    sample_rate: f32,
    attack_ms: f32,
    release_ms: f32,
}

impl EnvelopeFollower {
    /// Create a new envelope follower with the default 2 ms / 100 ms times.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_times(sample_rate, DEFAULT_ATTACK_MS, DEFAULT_RELEASE_MS)
    }

    /// Create with specified attack and release times.
    pub fn with_times(sample_rate: f32, attack_ms: f32, release_ms: f32) -> Self {
        let mut follower = Self {
            envelope: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            sample_rate,
            attack_ms: attack_ms.max(0.1),
            release_ms: release_ms.max(1.0),
        };
        follower.recalculate_coefficients();
        follower
    }

    /// Set the attack time in milliseconds (minimum 0.1 ms).
    pub fn set_attack_ms(&mut self, attack_ms: f32) {
        self.attack_ms = attack_ms.max(0.1);
        self.recalculate_coefficients();
    }

    /// Get current attack time in milliseconds.
    pub fn attack_ms(&self) -> f32 {
        self.attack_ms
    }

    /// Set the release time in milliseconds (minimum 1 ms).
    pub fn set_release_ms(&mut self, release_ms: f32) {
        self.release_ms = release_ms.max(1.0);
        self.recalculate_coefficients();
    }

    /// Get current release time in milliseconds.
    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    /// Update sample rate and recalculate coefficients.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coefficients();
    }

    /// Process a sample and return the current envelope level.
    ///
    /// Returns the envelope amplitude (always non-negative).
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let input_abs = fabsf(input);

        let coeff = if input_abs > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };

        // y[n] = coeff * y[n-1] + (1 - coeff) * x[n]
        self.envelope = flush_denormal(coeff * self.envelope + (1.0 - coeff) * input_abs);
        self.envelope
    }

    /// Get current envelope level without processing new input.
    pub fn level(&self) -> f32 {
        self.envelope
    }

    /// Reset the envelope to zero.
    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }

    fn recalculate_coefficients(&mut self) {
        // coeff = exp(-1 / (time_ms * sample_rate / 1000))
        self.attack_coeff = expf(-1.0 / ms_to_samples(self.attack_ms, self.sample_rate));
        self.release_coeff = expf(-1.0 / ms_to_samples(self.release_ms, self.sample_rate));
    }
}

impl Default for EnvelopeFollower {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_voice_times() {
        let env = EnvelopeFollower::new(44100.0);
        assert_eq!(env.attack_ms(), DEFAULT_ATTACK_MS);
        assert_eq!(env.release_ms(), DEFAULT_RELEASE_MS);
    }

    #[test]
    fn test_envelope_attack() {
        let mut env = EnvelopeFollower::new(48000.0);

        // 2 ms attack: 500 samples is ~5 time constants
        let mut envelope = 0.0;
        for _ in 0..500 {
            envelope = env.process(1.0);
        }

        assert!(envelope > 0.9, "Envelope should rise, got {}", envelope);
    }

    #[test]
    fn test_envelope_release() {
        let mut env = EnvelopeFollower::with_times(48000.0, 1.0, 10.0);

        for _ in 0..500 {
            env.process(1.0);
        }

        let mut envelope = 0.0;
        for _ in 0..1000 {
            envelope = env.process(0.0);
        }

        // ~2 time constants, expect e^-2 ~= 0.135
        assert!(envelope < 0.15, "Envelope should fall, got {}", envelope);
    }

    #[test]
    fn test_envelope_rectifies() {
        let mut env = EnvelopeFollower::new(48000.0);
        let level = env.process(-0.5);
        assert!(level > 0.0);
    }

    #[test]
    fn test_envelope_is_causal() {
        // Two inputs sharing a prefix must produce identical outputs on it.
        let mut a = EnvelopeFollower::new(48000.0);
        let mut b = EnvelopeFollower::new(48000.0);
        let prefix: [f32; 64] = core::array::from_fn(|i| libm::sinf(i as f32 * 0.1));

        for &x in &prefix {
            assert_eq!(a.process(x), b.process(x));
        }
        let after_a = a.process(1.0);
        let after_b = b.process(0.0);
        assert_ne!(after_a, after_b);
    }

    #[test]
    fn test_envelope_reset() {
        let mut env = EnvelopeFollower::new(48000.0);
        for _ in 0..100 {
            env.process(1.0);
        }
        env.reset();
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_minimum_times_clamped() {
        let mut env = EnvelopeFollower::new(48000.0);
        env.set_attack_ms(0.0);
        env.set_release_ms(0.0);
        assert_eq!(env.attack_ms(), 0.1);
        assert_eq!(env.release_ms(), 1.0);
    }
}
