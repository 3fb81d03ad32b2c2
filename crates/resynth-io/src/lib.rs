//! Audio I/O and scheduling layer for the resynth effect.
//!
//! This crate provides:
//!
//! - **WAV file I/O**: [`read_wav_info`], [`read_wav_channels`] and [`write_wav_channels`]
//! - **File streaming**: [`Streamer`], a double-buffered chunk reader refilled by a
//!   background worker so the audio thread never touches the disk
//! - **Block scheduling**: [`ResynthEngine`], the per-frame pipeline run by a host
//! - **Hosts**: [`OfflineHost`] for deterministic rendering, [`CpalHost`] for live audio
//! - **Diagnostics**: [`Diagnostic`] events queued from the audio thread and logged
//!   elsewhere through `tracing`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resynth_core::ChannelSettings;
//! use resynth_io::{HostConfig, InputSource, OfflineHost, ResynthEngine};
//!
//! let engine = ResynthEngine::new(
//!     InputSource::File { path: "guitar.wav".into(), buffer_len: 22050 },
//!     ChannelSettings::default(),
//! );
//! let host = OfflineHost::new(HostConfig::output_only(44100, 1, 256)).with_max_frames(441_000);
//! let (report, engine) = host.run(engine)?;
//! println!("{} frames, {} swaps", report.frames, engine.streamer_stats().swaps);
//! # Ok::<(), resynth_io::Error>(())
//! ```

mod capture;
mod cpu;
mod diagnostics;
mod engine;
mod host;
mod offline;
mod source;
mod stream;
mod streamer;
mod wav;

pub use capture::CaptureSink;
pub use cpu::{CPU_METER_BLOCKS, CpuLoad};
pub use diagnostics::{
    DIAGNOSTIC_CAPACITY, Diagnostic, DiagnosticReceiver, DiagnosticSender, MAX_READOUT_CHANNELS,
    diagnostic_channel, spawn_logger,
};
pub use engine::{InputSource, ResynthEngine};
pub use host::{AudioBlock, AudioCallback, HostConfig, StopHandle};
pub use offline::{OfflineHost, OfflineInput, OfflineReport};
pub use source::{ChunkBuffer, ChunkSource, MemorySource, WavChunkSource, fill_chunk};
pub use stream::{AudioDevice, CpalHost, StreamConfig, default_device, list_devices};
pub use streamer::{Advance, Streamer, StreamerStats, SwapPolicy};
pub use wav::{WavFormat, WavInfo, WavSpec, read_wav_channels, read_wav_info, write_wav_channels};

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// The streamed file is not longer than one chunk.
    #[error("file has {frames} frames, needs more than the {buffer_len}-frame buffer")]
    FileTooShort {
        /// Frames in the file.
        frames: u64,
        /// Configured chunk length.
        buffer_len: usize,
    },

    /// The streamed file has no channels or no frames.
    #[error("file contains no audio")]
    EmptyFile,

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested sample format is not supported.
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The audio callback refused the host configuration.
    #[error("audio callback failed to initialize: {0}")]
    InitFailed(String),

    /// Invalid run configuration.
    #[error("configuration error: {0}")]
    Config(#[from] resynth_config::ConfigError),

    /// The refill worker thread could not be started.
    #[error("failed to spawn refill worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
