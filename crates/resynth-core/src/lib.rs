//! Resynth Core - DSP primitives for pitch-tracking resynthesis
//!
//! This crate provides the per-sample building blocks of the resynthesis
//! effect, designed for real-time audio processing with zero allocation in the
//! audio path.
//!
//! # Building Blocks
//!
//! ## Analysis
//!
//! - [`PitchTracker`] - Streaming YIN fundamental-frequency estimator
//! - [`EnvelopeFollower`] - Peak envelope with separate attack/release
//!
//! ## Synthesis
//!
//! - [`Oscillator`] - Phase-continuous oscillator driven by a per-sample frequency
//!
//! ## Voice
//!
//! - [`ChannelState`] - Pitch → envelope → oscillator → mix for one channel
//!
//! ## Utilities
//!
//! - Math functions: [`db_to_linear`], [`linear_to_db`], [`mix`], etc.
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible for embedded audio applications.
//! Disable the default `std` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! resynth-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use resynth_core::{ChannelSettings, ChannelState};
//!
//! let sample_rate = 48000.0;
//! let mut voices: Vec<ChannelState> = (0..2)
//!     .map(|_| ChannelState::new(sample_rate, &ChannelSettings::default()))
//!     .collect();
//!
//! let frame = [0.1f32, -0.1];
//! let out: Vec<f32> = voices
//!     .iter_mut()
//!     .zip(frame)
//!     .map(|(voice, x)| voice.process(x))
//!     .collect();
//! assert_eq!(out.len(), 2);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod channel;
pub mod envelope;
pub mod math;
pub mod oscillator;
pub mod pitch;

// Re-export main types at crate root
pub use channel::{ChannelSettings, ChannelState};
pub use envelope::{DEFAULT_ATTACK_MS, DEFAULT_RELEASE_MS, EnvelopeFollower};
pub use math::{db_to_linear, flush_denormal, linear_to_db, mix, ms_to_samples};
pub use oscillator::{Oscillator, OscillatorWaveform};
pub use pitch::{PitchSettings, PitchTracker};
