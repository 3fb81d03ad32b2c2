//! Run configuration file format.

use resynth_core::{ChannelSettings, OscillatorWaveform, PitchSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::validation::validate_config;

/// File streamed when no input path is given.
pub const DEFAULT_STREAM_PATH: &str = "multiguit.wav";
/// Frames per streaming chunk.
pub const DEFAULT_BUFFER_LEN: usize = 22050;
/// Capture output file name.
pub const DEFAULT_CAPTURE_PATH: &str = "outputs.wav";
/// Capture length when neither a length nor a streamed file decides it.
pub const DEFAULT_CAPTURE_SECONDS: f32 = 20.0;
/// Blocks between diagnostic readouts.
pub const DEFAULT_DIAGNOSTIC_INTERVAL: u32 = 1000;

fn default_stream_path() -> PathBuf {
    PathBuf::from(DEFAULT_STREAM_PATH)
}

fn default_buffer_len() -> usize {
    DEFAULT_BUFFER_LEN
}

fn default_capture_path() -> PathBuf {
    PathBuf::from(DEFAULT_CAPTURE_PATH)
}

fn default_bits() -> u16 {
    16
}

/// Where the effect takes its input from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum InputConfig {
    /// Live audio input from the host.
    Live,
    /// A WAV file streamed in fixed-size chunks, looping at the end.
    Stream {
        /// WAV file to stream.
        #[serde(default = "default_stream_path")]
        path: PathBuf,
        /// Frames per chunk.
        #[serde(default = "default_buffer_len")]
        buffer_len: usize,
    },
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig::Stream {
            path: default_stream_path(),
            buffer_len: DEFAULT_BUFFER_LEN,
        }
    }
}

/// Output capture settings.
///
/// Length resolution, first match wins: `frames`, `seconds`, the streamed
/// file's length, then [`DEFAULT_CAPTURE_SECONDS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Destination WAV file.
    #[serde(default = "default_capture_path")]
    pub path: PathBuf,
    /// Capture length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<f32>,
    /// Capture length in frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<u64>,
    /// Output bit depth (16, 24 or 32).
    #[serde(default = "default_bits")]
    pub bits_per_sample: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            path: default_capture_path(),
            seconds: None,
            frames: None,
            bits_per_sample: default_bits(),
        }
    }
}

impl CaptureConfig {
    /// Number of frames to capture at `sample_rate`.
    ///
    /// `stream_frames` is the streamed file's length, if the input is a file.
    pub fn resolve_frames(&self, sample_rate: u32, stream_frames: Option<u64>) -> u64 {
        if let Some(frames) = self.frames {
            return frames;
        }
        let seconds_to_frames = |s: f32| (f64::from(s) * f64::from(sample_rate)).round() as u64;
        match (self.seconds, stream_frames) {
            (Some(seconds), _) => seconds_to_frames(seconds),
            (None, Some(frames)) => frames,
            (None, None) => seconds_to_frames(DEFAULT_CAPTURE_SECONDS),
        }
    }
}

/// Pitch detector section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Lowest detectable fundamental in Hz.
    pub min_hz: f32,
    /// Highest detectable fundamental in Hz.
    pub max_hz: f32,
    /// Sensitivity threshold in dBFS.
    pub threshold_db: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        let defaults = PitchSettings::default();
        Self {
            min_hz: defaults.min_hz,
            max_hz: defaults.max_hz,
            threshold_db: defaults.threshold_db,
        }
    }
}

/// Envelope follower section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Attack time in milliseconds.
    pub attack_ms: f32,
    /// Release time in milliseconds.
    pub release_ms: f32,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack_ms: resynth_core::DEFAULT_ATTACK_MS,
            release_ms: resynth_core::DEFAULT_RELEASE_MS,
        }
    }
}

/// Resynthesized tone waveform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    /// Pure sine.
    Sine,
    /// Band-limited square.
    #[default]
    Square,
    /// Band-limited sawtooth.
    Saw,
}

impl From<Waveform> for OscillatorWaveform {
    fn from(waveform: Waveform) -> Self {
        match waveform {
            Waveform::Sine => OscillatorWaveform::Sine,
            Waveform::Square => OscillatorWaveform::Square,
            Waveform::Saw => OscillatorWaveform::Saw,
        }
    }
}

/// Complete run configuration.
///
/// # TOML Format
///
/// ```toml
/// diagnostic_interval = 1000
/// waveform = "square"
///
/// [input]
/// mode = "stream"
/// path = "multiguit.wav"
/// buffer_len = 22050
///
/// [capture]
/// path = "outputs.wav"
/// seconds = 20.0
/// bits_per_sample = 16
///
/// [pitch]
/// min_hz = 50.0
/// max_hz = 600.0
/// threshold_db = -40.0
///
/// [envelope]
/// attack_ms = 2.0
/// release_ms = 100.0
/// ```
///
/// Every section is optional; omitted values take their defaults and an
/// omitted `[capture]` disables capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResynthConfig {
    /// Blocks between diagnostic readouts.
    pub diagnostic_interval: u32,
    /// Resynthesized tone waveform.
    pub waveform: Waveform,
    /// Input source.
    pub input: InputConfig,
    /// Output capture, disabled when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureConfig>,
    /// Pitch detector settings.
    pub pitch: PitchConfig,
    /// Envelope follower settings.
    pub envelope: EnvelopeConfig,
}

impl Default for ResynthConfig {
    fn default() -> Self {
        Self {
            diagnostic_interval: DEFAULT_DIAGNOSTIC_INTERVAL,
            waveform: Waveform::default(),
            input: InputConfig::default(),
            capture: None,
            pitch: PitchConfig::default(),
            envelope: EnvelopeConfig::default(),
        }
    }
}

impl ResynthConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: ResynthConfig = toml::from_str(toml_str)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(validate_config(self)?)
    }

    /// Per-channel processor settings derived from this configuration.
    pub fn channel_settings(&self) -> ChannelSettings {
        ChannelSettings {
            pitch: PitchSettings {
                min_hz: self.pitch.min_hz,
                max_hz: self.pitch.max_hz,
                threshold_db: self.pitch.threshold_db,
            },
            attack_ms: self.envelope.attack_ms,
            release_ms: self.envelope.release_ms,
            waveform: self.waveform.into(),
        }
    }

    /// Whether input comes from the host rather than a file.
    pub fn is_live(&self) -> bool {
        matches!(self.input, InputConfig::Live)
    }
}
