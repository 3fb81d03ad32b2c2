//! Shared CLI arguments and helpers used across commands.

use clap::{Args, ValueEnum};
use resynth_config::{CaptureConfig, ResynthConfig, Waveform};
use resynth_io::{DIAGNOSTIC_CAPACITY, DiagnosticSender, StopHandle, diagnostic_channel, spawn_logger};
use std::path::PathBuf;
use std::thread::JoinHandle;

/// Resynthesized tone shape.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum WaveformArg {
    /// Pure sine
    Sine,
    /// Band-limited square
    Square,
    /// Band-limited sawtooth
    Saw,
}

impl From<WaveformArg> for Waveform {
    fn from(arg: WaveformArg) -> Self {
        match arg {
            WaveformArg::Sine => Waveform::Sine,
            WaveformArg::Square => Waveform::Square,
            WaveformArg::Saw => Waveform::Saw,
        }
    }
}

/// Effect settings: an optional config file plus per-field overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct EffectArgs {
    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Lowest pitch to track, in Hz
    #[arg(long)]
    pub min_hz: Option<f32>,

    /// Highest pitch to track, in Hz
    #[arg(long)]
    pub max_hz: Option<f32>,

    /// Input level below which the pitch estimate is held, in dB
    #[arg(long, allow_hyphen_values = true)]
    pub threshold_db: Option<f32>,

    /// Envelope attack time in milliseconds
    #[arg(long)]
    pub attack_ms: Option<f32>,

    /// Envelope release time in milliseconds
    #[arg(long)]
    pub release_ms: Option<f32>,

    /// Waveform of the resynthesized tone
    #[arg(long, value_enum)]
    pub waveform: Option<WaveformArg>,

    /// Blocks between diagnostic readouts
    #[arg(long)]
    pub diagnostic_interval: Option<u32>,
}

impl EffectArgs {
    /// Load the config file (or defaults) and apply the overrides.
    ///
    /// The result is not validated; callers validate once every override
    /// has been applied.
    pub fn load(&self) -> anyhow::Result<ResynthConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading configuration");
                ResynthConfig::load(path)?
            }
            None => ResynthConfig::default(),
        };

        if let Some(v) = self.min_hz {
            config.pitch.min_hz = v;
        }
        if let Some(v) = self.max_hz {
            config.pitch.max_hz = v;
        }
        if let Some(v) = self.threshold_db {
            config.pitch.threshold_db = v;
        }
        if let Some(v) = self.attack_ms {
            config.envelope.attack_ms = v;
        }
        if let Some(v) = self.release_ms {
            config.envelope.release_ms = v;
        }
        if let Some(v) = self.waveform {
            config.waveform = v.into();
        }
        if let Some(v) = self.diagnostic_interval {
            config.diagnostic_interval = v;
        }
        Ok(config)
    }
}

/// Output capture flags.
#[derive(Args, Debug, Clone, Default)]
pub struct CaptureArgs {
    /// Record the processed output to this WAV file
    #[arg(long, value_name = "FILE")]
    pub capture: Option<PathBuf>,

    /// Capture length in seconds
    #[arg(long, conflicts_with = "capture_frames")]
    pub capture_seconds: Option<f32>,

    /// Capture length in frames
    #[arg(long)]
    pub capture_frames: Option<u64>,

    /// Capture bit depth (16, 24, or 32)
    #[arg(long)]
    pub bit_depth: Option<u16>,
}

impl CaptureArgs {
    /// True if any capture flag was given.
    pub fn is_set(&self) -> bool {
        self.capture.is_some()
            || self.capture_seconds.is_some()
            || self.capture_frames.is_some()
            || self.bit_depth.is_some()
    }

    /// Merge the flags into `base`. A length flag replaces both length fields.
    pub fn apply_to(&self, mut base: CaptureConfig) -> CaptureConfig {
        if let Some(path) = &self.capture {
            base.path.clone_from(path);
        }
        if self.capture_seconds.is_some() || self.capture_frames.is_some() {
            base.seconds = self.capture_seconds;
            base.frames = self.capture_frames;
        }
        if let Some(bits) = self.bit_depth {
            base.bits_per_sample = bits;
        }
        base
    }
}

/// Diagnostics queue with its logging thread.
pub struct DiagnosticsLogger {
    sender: DiagnosticSender,
    handle: JoinHandle<u64>,
}

impl DiagnosticsLogger {
    /// Start the logging thread.
    pub fn start() -> anyhow::Result<Self> {
        let (sender, receiver) = diagnostic_channel(DIAGNOSTIC_CAPACITY);
        let handle = spawn_logger(receiver)?;
        Ok(Self { sender, handle })
    }

    /// A sender for the audio side.
    pub fn sender(&self) -> DiagnosticSender {
        self.sender.clone()
    }

    /// Wait for the logger to drain. Every other sender must be dropped first.
    pub fn finish(self) -> anyhow::Result<u64> {
        drop(self.sender);
        self.handle
            .join()
            .map_err(|_| anyhow::anyhow!("diagnostics logger panicked"))
    }
}

/// Raise `stop` on Ctrl+C.
pub fn stop_on_ctrlc(stop: &StopHandle) -> anyhow::Result<()> {
    let stop = stop.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nStopping...");
        stop.request_stop();
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let args = EffectArgs {
            min_hz: Some(80.0),
            threshold_db: Some(-30.0),
            waveform: Some(WaveformArg::Saw),
            ..EffectArgs::default()
        };
        let config = args.load().unwrap();
        assert_eq!(config.pitch.min_hz, 80.0);
        assert_eq!(config.pitch.max_hz, 600.0);
        assert_eq!(config.pitch.threshold_db, -30.0);
        assert_eq!(config.waveform, Waveform::Saw);
    }

    #[test]
    fn test_capture_length_flag_replaces_both() {
        let base = CaptureConfig {
            seconds: Some(5.0),
            ..CaptureConfig::default()
        };
        let args = CaptureArgs {
            capture_frames: Some(1234),
            ..CaptureArgs::default()
        };
        assert!(args.is_set());
        let merged = args.apply_to(base);
        assert_eq!(merged.frames, Some(1234));
        assert_eq!(merged.seconds, None);
        assert_eq!(merged.path, PathBuf::from("outputs.wav"));
    }
}
