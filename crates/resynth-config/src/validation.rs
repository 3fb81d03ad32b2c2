//! Run configuration validation.
//!
//! Every check is collected rather than stopping at the first failure, so a
//! user fixing a config file sees all problems at once.
//!
//! # Example
//!
//! ```rust
//! use resynth_config::{ResynthConfig, validate_config};
//!
//! let mut config = ResynthConfig::default();
//! validate_config(&config).expect("defaults are valid");
//!
//! config.pitch.min_hz = 800.0;
//! assert!(validate_config(&config).is_err());
//! ```

use crate::config::{CaptureConfig, InputConfig, ResynthConfig};
use thiserror::Error;

/// Accepted pitch bound range in Hz.
pub const PITCH_HZ_RANGE: (f32, f32) = (20.0, 5000.0);
/// Accepted detection threshold range in dBFS.
pub const THRESHOLD_DB_RANGE: (f32, f32) = (-120.0, 0.0);
/// Accepted attack time range in milliseconds.
pub const ATTACK_MS_RANGE: (f32, f32) = (0.1, 1000.0);
/// Accepted release time range in milliseconds.
pub const RELEASE_MS_RANGE: (f32, f32) = (1.0, 10_000.0);
/// Shortest accepted capture duration. At least one frame at any sample rate
/// from 1 kHz up.
pub const MIN_CAPTURE_SECONDS: f32 = 0.001;
/// Supported capture bit depths.
pub const SUPPORTED_BITS: [u16; 3] = [16, 24, 32];

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Parameter value out of range.
    #[error("parameter '{param}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Name of the parameter.
        param: String,
        /// The value that was out of range.
        value: f32,
        /// Minimum allowed value.
        min: f32,
        /// Maximum allowed value.
        max: f32,
    },

    /// Pitch bounds not ordered.
    #[error("pitch.min_hz ({min_hz}) must be below pitch.max_hz ({max_hz})")]
    InvalidBounds {
        /// Configured lower bound.
        min_hz: f32,
        /// Configured upper bound.
        max_hz: f32,
    },

    /// Invalid value that is not a simple range violation.
    #[error("invalid value for '{param}': {reason}")]
    InvalidValue {
        /// Name of the parameter.
        param: String,
        /// Description of the problem.
        reason: String,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn check_range(errors: &mut Vec<ValidationError>, param: &str, value: f32, range: (f32, f32)) {
    if !(range.0..=range.1).contains(&value) {
        errors.push(ValidationError::OutOfRange {
            param: param.to_string(),
            value,
            min: range.0,
            max: range.1,
        });
    }
}

fn invalid(errors: &mut Vec<ValidationError>, param: &str, reason: impl Into<String>) {
    errors.push(ValidationError::InvalidValue {
        param: param.to_string(),
        reason: reason.into(),
    });
}

fn check_capture(errors: &mut Vec<ValidationError>, capture: &CaptureConfig) {
    if capture.seconds.is_some() && capture.frames.is_some() {
        invalid(
            errors,
            "capture",
            "set either 'seconds' or 'frames', not both",
        );
    }
    if let Some(seconds) = capture.seconds {
        if !(seconds.is_finite() && seconds > 0.0) {
            invalid(errors, "capture.seconds", "must be a positive duration");
        } else if seconds < MIN_CAPTURE_SECONDS {
            invalid(
                errors,
                "capture.seconds",
                format!("{seconds} is shorter than {MIN_CAPTURE_SECONDS} s"),
            );
        }
    }
    if capture.frames == Some(0) {
        invalid(errors, "capture.frames", "must be at least 1");
    }
    if !SUPPORTED_BITS.contains(&capture.bits_per_sample) {
        invalid(
            errors,
            "capture.bits_per_sample",
            format!("{} is not one of 16, 24, 32", capture.bits_per_sample),
        );
    }
    if capture.path.as_os_str().is_empty() {
        invalid(errors, "capture.path", "must not be empty");
    }
}

/// Validate a complete run configuration.
///
/// Returns the single error directly, or [`ValidationError::Multiple`] when
/// more than one check fails.
pub fn validate_config(config: &ResynthConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    check_range(&mut errors, "pitch.min_hz", config.pitch.min_hz, PITCH_HZ_RANGE);
    check_range(&mut errors, "pitch.max_hz", config.pitch.max_hz, PITCH_HZ_RANGE);
    if config.pitch.min_hz >= config.pitch.max_hz {
        errors.push(ValidationError::InvalidBounds {
            min_hz: config.pitch.min_hz,
            max_hz: config.pitch.max_hz,
        });
    }
    check_range(
        &mut errors,
        "pitch.threshold_db",
        config.pitch.threshold_db,
        THRESHOLD_DB_RANGE,
    );

    check_range(
        &mut errors,
        "envelope.attack_ms",
        config.envelope.attack_ms,
        ATTACK_MS_RANGE,
    );
    check_range(
        &mut errors,
        "envelope.release_ms",
        config.envelope.release_ms,
        RELEASE_MS_RANGE,
    );

    if config.diagnostic_interval == 0 {
        invalid(&mut errors, "diagnostic_interval", "must be at least 1 block");
    }

    if let InputConfig::Stream { path, buffer_len } = &config.input {
        if *buffer_len == 0 {
            invalid(&mut errors, "input.buffer_len", "must be at least 1 frame");
        }
        if path.as_os_str().is_empty() {
            invalid(&mut errors, "input.path", "must not be empty");
        }
    }

    if let Some(capture) = &config.capture {
        check_capture(&mut errors, capture);
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
