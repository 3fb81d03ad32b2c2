//! Streaming fundamental-frequency tracker.
//!
//! [`PitchTracker`] consumes one sample at a time and publishes a new estimate
//! every hop. Detection uses the YIN cumulative-mean-normalized difference
//! function (de Cheveigné & Kawahara, 2002) over a fixed analysis window.
//!
//! ## Real-time behavior
//!
//! Every buffer is sized at construction from the sample rate and the lowest
//! detectable frequency. [`PitchTracker::process`] never allocates.
//!
//! With the `std` feature the difference function is computed from an FFT
//! cross-correlation, so one analysis costs `O(n log n)` in the window length.
//! Without it the direct `O(max_lag²)` sum is used.
//!
//! Analyses land on one sample per hop. Trackers running side by side should
//! be given different [`PitchTracker::with_analysis_offset`] values so their
//! analyses do not fall on the same sample.
//!
//! ## Gating
//!
//! Windows whose peak level falls below the sensitivity threshold, or that
//! contain no clear periodicity inside `[min_hz, max_hz]`, leave the previous
//! estimate in place. [`PitchTracker::frequency`] therefore reports `0.0`
//! until the first detection and a stale value during silence.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use crate::math::db_to_linear;
use libm::{ceilf, fabsf};

#[cfg(feature = "std")]
use rustfft::{Fft, FftPlanner, num_complex::Complex};
#[cfg(feature = "std")]
use std::sync::Arc;

/// YIN absolute threshold on the normalized difference function.
const YIN_THRESHOLD: f32 = 0.15;

/// Windows whose best normalized difference stays above this are unvoiced.
const UNVOICED_LIMIT: f32 = 0.35;

/// Frequency bounds and sensitivity for a [`PitchTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchSettings {
    /// Lowest detectable fundamental in Hz.
    pub min_hz: f32,
    /// Highest detectable fundamental in Hz.
    pub max_hz: f32,
    /// Windows quieter than this peak level (dBFS) do not update the estimate.
    pub threshold_db: f32,
}

impl Default for PitchSettings {
    fn default() -> Self {
        Self {
            min_hz: 50.0,
            max_hz: 600.0,
            threshold_db: -40.0,
        }
    }
}

/// Monophonic pitch tracker.
///
/// # Example
///
/// ```rust
/// use resynth_core::{PitchSettings, PitchTracker};
///
/// let sr = 48000.0;
/// let mut tracker = PitchTracker::new(sr, PitchSettings::default());
/// for n in 0..8192 {
///     let x = (2.0 * core::f32::consts::PI * 220.0 * n as f32 / sr).sin();
///     tracker.process(x);
/// }
/// assert!((tracker.frequency() - 220.0).abs() < 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct PitchTracker {
    sample_rate: f32,
    settings: PitchSettings,
    threshold_linear: f32,
    min_lag: usize,
    max_lag: usize,
    /// Circular history of the last `window.len()` samples
    history: Vec<f32>,
    write_pos: usize,
    filled: usize,
    hop: usize,
    /// Samples between the window filling and the first analysis
    offset: usize,
    since_analysis: usize,
    /// Chronological copy of `history` used by the analysis
    frame: Vec<f32>,
    /// Difference function, later normalized in place
    diff: Vec<f32>,
    #[cfg(feature = "std")]
    correlator: Correlator,
    frequency: f32,
    clarity: f32,
}

impl PitchTracker {
    /// Create a tracker for the given sample rate and settings.
    ///
    /// `min_hz`/`max_hz` are sanitized: both are kept positive, ordered, and
    /// below Nyquist.
    pub fn new(sample_rate: f32, settings: PitchSettings) -> Self {
        let nyquist = sample_rate * 0.5;
        let min_hz = settings.min_hz.clamp(1.0, nyquist);
        let max_hz = settings.max_hz.clamp(min_hz, nyquist);
        let settings = PitchSettings {
            min_hz,
            max_hz,
            threshold_db: settings.threshold_db,
        };

        let min_lag = (ceilf(sample_rate / max_hz) as usize).max(2);
        let max_lag = (ceilf(sample_rate / min_hz) as usize).max(min_lag + 1);
        let window_len = 2 * max_lag;
        let hop = (window_len / 4).max(1);

        Self {
            sample_rate,
            settings,
            threshold_linear: db_to_linear(settings.threshold_db),
            min_lag,
            max_lag,
            history: vec![0.0; window_len],
            write_pos: 0,
            filled: 0,
            hop,
            offset: 0,
            since_analysis: hop - 1,
            frame: vec![0.0; window_len],
            diff: vec![0.0; max_lag + 2],
            #[cfg(feature = "std")]
            correlator: Correlator::new(window_len),
            frequency: 0.0,
            clarity: 0.0,
        }
    }

    /// Delay every analysis by `offset` samples (taken modulo the hop).
    ///
    /// The first analysis then runs `offset` samples after the window fills.
    pub fn with_analysis_offset(mut self, offset: usize) -> Self {
        self.offset = offset % self.hop;
        self.since_analysis = self.hop - 1 - self.offset;
        self
    }

    /// Feed one sample.
    ///
    /// Returns `true` when this sample completed a hop and a new estimate was
    /// published.
    #[inline]
    pub fn process(&mut self, sample: f32) -> bool {
        self.history[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos == self.history.len() {
            self.write_pos = 0;
        }
        if self.filled < self.history.len() {
            self.filled += 1;
            if self.filled < self.history.len() {
                return false;
            }
        }

        self.since_analysis += 1;
        if self.since_analysis < self.hop {
            return false;
        }
        self.since_analysis = 0;
        self.analyze()
    }

    /// Latest fundamental estimate in Hz (0.0 before the first detection).
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Periodicity confidence of the latest estimate, in `[0, 1]`.
    pub fn clarity(&self) -> f32 {
        self.clarity
    }

    /// Effective settings after sanitizing.
    pub fn settings(&self) -> PitchSettings {
        self.settings
    }

    /// Sample rate the tracker was configured for.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Length of the analysis window in samples.
    pub fn window_len(&self) -> usize {
        self.history.len()
    }

    /// Samples between successive analyses.
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Delay of each analysis within the hop.
    pub fn analysis_offset(&self) -> usize {
        self.offset
    }

    /// Clear history and forget the current estimate.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.write_pos = 0;
        self.filled = 0;
        self.since_analysis = self.hop - 1 - self.offset;
        self.frequency = 0.0;
        self.clarity = 0.0;
    }

    fn analyze(&mut self) -> bool {
        let len = self.history.len();
        let (older, newer) = self.history.split_at(self.write_pos);
        self.frame[..newer.len()].copy_from_slice(newer);
        self.frame[newer.len()..len].copy_from_slice(older);

        let peak = self.frame.iter().fold(0.0f32, |acc, &x| acc.max(fabsf(x)));
        if peak < self.threshold_linear {
            return false;
        }

        let Some((lag, cmnd)) = self.best_lag() else {
            return false;
        };

        let frequency = self.sample_rate / lag;
        if !(self.settings.min_hz..=self.settings.max_hz).contains(&frequency) {
            return false;
        }

        self.frequency = frequency;
        self.clarity = (1.0 - cmnd).clamp(0.0, 1.0);
        true
    }

    /// Run YIN over `frame` and return the refined lag and its normalized
    /// difference, or `None` for an unvoiced window.
    fn best_lag(&mut self) -> Option<(f32, f32)> {
        let max_lag = self.max_lag;

        #[cfg(feature = "std")]
        self.correlator.difference(&self.frame, max_lag, &mut self.diff);
        #[cfg(not(feature = "std"))]
        difference_direct(&self.frame, max_lag, &mut self.diff);

        let diff = &mut self.diff;

        // Cumulative mean normalization
        diff[0] = 1.0;
        let mut running = 0.0f32;
        for tau in 1..=max_lag {
            running += diff[tau];
            diff[tau] = if running > 0.0 {
                diff[tau] * tau as f32 / running
            } else {
                1.0
            };
        }

        // First dip below the absolute threshold, walked down to its minimum
        let mut best = None;
        let mut tau = self.min_lag;
        while tau <= max_lag {
            if diff[tau] < YIN_THRESHOLD {
                while tau < max_lag && diff[tau + 1] < diff[tau] {
                    tau += 1;
                }
                best = Some(tau);
                break;
            }
            tau += 1;
        }

        let best = match best {
            Some(tau) => tau,
            None => {
                let (tau, value) = (self.min_lag..=max_lag)
                    .map(|tau| (tau, diff[tau]))
                    .fold((0, f32::MAX), |acc, cur| if cur.1 < acc.1 { cur } else { acc });
                if value > UNVOICED_LIMIT {
                    return None;
                }
                tau
            }
        };

        // Parabolic interpolation for sub-sample accuracy
        let refined = if best > 1 && best < max_lag {
            let alpha = diff[best - 1];
            let beta = diff[best];
            let gamma = diff[best + 1];
            let denom = alpha - 2.0 * beta + gamma;
            if fabsf(denom) > 1e-12 {
                best as f32 + 0.5 * (alpha - gamma) / denom
            } else {
                best as f32
            }
        } else {
            best as f32
        };

        Some((refined, diff[best]))
    }
}

/// YIN difference function over an integration window of `width` samples,
/// written to `diff[0..=width]`. `frame` holds at least `2 * width` samples.
#[cfg_attr(feature = "std", allow(dead_code))]
fn difference_direct(frame: &[f32], width: usize, diff: &mut [f32]) {
    diff[0] = 0.0;
    for tau in 1..=width {
        let mut sum = 0.0f32;
        for j in 0..width {
            let d = frame[j] - frame[j + tau];
            sum += d * d;
        }
        diff[tau] = sum;
    }
}

/// Difference function via FFT cross-correlation.
///
/// `d(τ) = e(0) + e(τ) - 2·r(τ)`, where `e(τ)` is the energy of
/// `frame[τ..τ + width]` and `r(τ)` the cross-correlation of the first `width`
/// samples with the whole frame. The transform length is the window length
/// rounded up to a power of two, which keeps `r` free of circular wrap.
#[cfg(feature = "std")]
#[derive(Clone)]
struct Correlator {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    head: Vec<Complex<f32>>,
    whole: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

#[cfg(feature = "std")]
impl core::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Correlator")
            .field("size", &self.head.len())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "std")]
impl Correlator {
    fn new(window_len: usize) -> Self {
        let size = window_len.next_power_of_two();
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Self {
            forward,
            inverse,
            head: vec![Complex::new(0.0, 0.0); size],
            whole: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }

    fn difference(&mut self, frame: &[f32], width: usize, diff: &mut [f32]) {
        let zero = Complex::new(0.0, 0.0);
        let pairs = self.head.iter_mut().zip(self.whole.iter_mut());
        for (i, (head, whole)) in pairs.enumerate() {
            let x = frame.get(i).copied().unwrap_or(0.0);
            *whole = Complex::new(x, 0.0);
            *head = if i < width { *whole } else { zero };
        }

        self.forward.process_with_scratch(&mut self.head, &mut self.scratch);
        self.forward.process_with_scratch(&mut self.whole, &mut self.scratch);
        for (w, h) in self.whole.iter_mut().zip(&self.head) {
            *w *= h.conj();
        }
        self.inverse.process_with_scratch(&mut self.whole, &mut self.scratch);

        let scale = 1.0 / self.whole.len() as f32;
        let e0: f32 = frame[..width].iter().map(|x| x * x).sum();
        let mut energy = e0;
        diff[0] = 0.0;
        for tau in 1..=width {
            let entering = frame[tau + width - 1];
            let leaving = frame[tau - 1];
            energy += entering * entering - leaving * leaving;
            let cross = self.whole[tau].re * scale;
            diff[tau] = (e0 + energy - 2.0 * cross).max(0.0);
        }
    }
}
