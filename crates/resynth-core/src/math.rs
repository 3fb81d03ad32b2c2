//! Mathematical utility functions for DSP.
//!
//! All functions are allocation-free and suitable for `no_std`.
//!
//! - [`db_to_linear`] / [`linear_to_db`] - Convert between dB and linear gain
//! - [`ms_to_samples`] - Time conversion
//! - [`mix`] - Fixed 50/50 dry/synth mixer
//! - [`flush_denormal`] - Subnormal guard for feedback paths

use libm::{expf, fabsf, logf};

/// Convert decibels to linear gain.
///
/// # Example
/// ```rust
/// use resynth_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-40.0) - 0.01).abs() < 1e-4);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels.
///
/// Values at or below zero are clamped to -200 dB.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Convert a duration in milliseconds to a sample count at `sample_rate`.
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> f32 {
    ms * sample_rate / 1000.0
}

/// Mix the dry input with the synthesized tone at equal weight.
///
/// `out = (dry + synthesized) * 0.5`. Stateless, never fails.
///
/// # Example
/// ```rust
/// use resynth_core::mix;
///
/// assert_eq!(mix(1.0, 0.0), 0.5);
/// assert_eq!(mix(0.0, -0.5), -0.25);
/// ```
#[inline]
pub fn mix(dry: f32, synthesized: f32) -> f32 {
    (dry + synthesized) * 0.5
}

/// Flush subnormal values to zero.
///
/// Replaces values below 1e-20 with zero, leaving margin before the IEEE 754
/// subnormal range begins.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if fabsf(x) < 1e-20 { 0.0 } else { x }
}
