//! Run configuration for the resynth effect.
//!
//! A single TOML file (or the equivalent CLI flags) selects the input source,
//! optional output capture, and the per-channel processor settings.
//!
//! # Features
//!
//! - **Config file**: Load and save [`ResynthConfig`] as TOML
//! - **Validation**: Range and consistency checks with all errors collected
//! - **Defaults**: Every field has a default, an empty file is a valid config
//!
//! # Example
//!
//! ```rust
//! use resynth_config::{InputConfig, ResynthConfig};
//!
//! let config = ResynthConfig::from_toml(
//!     r#"
//! [input]
//! mode = "stream"
//! path = "guitar.wav"
//!
//! [capture]
//! seconds = 5.0
//! "#,
//! )
//! .unwrap();
//!
//! assert!(matches!(config.input, InputConfig::Stream { buffer_len: 22050, .. }));
//! let settings = config.channel_settings();
//! assert_eq!(settings.pitch.min_hz, 50.0);
//! ```

mod config;
mod error;

/// Configuration validation.
pub mod validation;

pub use config::{
    CaptureConfig, DEFAULT_BUFFER_LEN, DEFAULT_CAPTURE_PATH, DEFAULT_CAPTURE_SECONDS,
    DEFAULT_DIAGNOSTIC_INTERVAL, DEFAULT_STREAM_PATH, EnvelopeConfig, InputConfig, PitchConfig,
    ResynthConfig, Waveform,
};
pub use error::ConfigError;
pub use validation::{ValidationError, ValidationResult, validate_config};
