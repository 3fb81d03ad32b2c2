//! Block scheduler for the resynth effect.
//!
//! [`ResynthEngine`] implements [`AudioCallback`]. Each frame it advances the
//! streamer (when the input is a file), runs every output channel through its
//! [`ChannelState`], writes the result and records it into the capture. After
//! each block it updates the CPU meter and, every `diagnostic_interval`
//! blocks, queues a [`Diagnostic::Readout`] with one estimate per host input
//! channel (per output channel when the host has no inputs).
//!
//! Pitch analyses run once per hop. Each channel's hop is offset by an even
//! share of the hop length so the analyses of different channels fall on
//! different frames.

use crate::capture::CaptureSink;
use crate::cpu::{CPU_METER_BLOCKS, CpuLoad};
use crate::diagnostics::{Diagnostic, DiagnosticSender};
use crate::host::{AudioBlock, AudioCallback, HostConfig};
use crate::source::ChunkSource;
use crate::streamer::{Streamer, StreamerStats, SwapPolicy};
use crate::wav::WavSpec;
use crate::{Error, Result};
use resynth_config::{
    CaptureConfig, DEFAULT_DIAGNOSTIC_INTERVAL, InputConfig, ResynthConfig, ValidationError,
};
use resynth_core::{ChannelSettings, ChannelState};
use std::path::PathBuf;

/// Where the engine reads its input.
pub enum InputSource {
    /// The host's input buffer.
    Live,
    /// A WAV file streamed in chunks of `buffer_len` frames.
    File {
        /// WAV file to stream.
        path: PathBuf,
        /// Frames per chunk.
        buffer_len: usize,
    },
    /// Any chunk source, streamed like a file. Consumed by the first `init`.
    Source {
        /// Source to stream.
        source: Box<dyn ChunkSource>,
        /// Frames per chunk.
        buffer_len: usize,
    },
}

impl std::fmt::Debug for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::Live => f.write_str("Live"),
            InputSource::File { path, buffer_len } => f
                .debug_struct("File")
                .field("path", path)
                .field("buffer_len", buffer_len)
                .finish(),
            InputSource::Source { buffer_len, .. } => f
                .debug_struct("Source")
                .field("buffer_len", buffer_len)
                .finish_non_exhaustive(),
        }
    }
}

impl From<&InputConfig> for InputSource {
    fn from(config: &InputConfig) -> Self {
        match config {
            InputConfig::Live => InputSource::Live,
            InputConfig::Stream { path, buffer_len } => InputSource::File {
                path: path.clone(),
                buffer_len: *buffer_len,
            },
        }
    }
}

/// Per-channel pitch-tracking resynthesis, driven by a host.
#[derive(Debug)]
pub struct ResynthEngine {
    input: InputSource,
    settings: ChannelSettings,
    capture_config: Option<CaptureConfig>,
    diagnostic_interval: u32,
    swap_policy: SwapPolicy,
    diagnostics: Option<DiagnosticSender>,

    host: Option<HostConfig>,
    channels: Vec<ChannelState>,
    readout_channels: usize,
    streamer: Option<Streamer>,
    capture: Option<CaptureSink>,
    cpu: CpuLoad,

    frames_processed: u64,
    blocks_processed: u64,
    blocks_since_readout: u32,
    capture_complete: bool,
    final_stats: StreamerStats,
    init_error: Option<Error>,
    persist_error: Option<Error>,
}

impl ResynthEngine {
    /// Create an engine. Nothing is opened or allocated until the host calls
    /// `init`.
    pub fn new(input: InputSource, settings: ChannelSettings) -> Self {
        Self {
            input,
            settings,
            capture_config: None,
            diagnostic_interval: DEFAULT_DIAGNOSTIC_INTERVAL,
            swap_policy: SwapPolicy::RealTime,
            diagnostics: None,
            host: None,
            channels: Vec::new(),
            readout_channels: 0,
            streamer: None,
            capture: None,
            cpu: CpuLoad::new(256, 48000, CPU_METER_BLOCKS),
            frames_processed: 0,
            blocks_processed: 0,
            blocks_since_readout: 0,
            capture_complete: false,
            final_stats: StreamerStats::default(),
            init_error: None,
            persist_error: None,
        }
    }

    /// Build an engine from a validated configuration.
    pub fn from_config(config: &ResynthConfig) -> Result<Self> {
        config.validate()?;
        let mut engine = Self::new(InputSource::from(&config.input), config.channel_settings())
            .with_diagnostic_interval(config.diagnostic_interval);
        if let Some(capture) = &config.capture {
            engine = engine.with_capture(capture.clone());
        }
        Ok(engine)
    }

    /// Record the processed output and write it to a WAV file at teardown.
    pub fn with_capture(mut self, capture: CaptureConfig) -> Self {
        self.capture_config = Some(capture);
        self
    }

    /// Queue readouts and streaming events on `sender`.
    pub fn with_diagnostics(mut self, sender: DiagnosticSender) -> Self {
        self.diagnostics = Some(sender);
        self
    }

    /// Blocks between readouts.
    pub fn with_diagnostic_interval(mut self, blocks: u32) -> Self {
        self.diagnostic_interval = blocks.max(1);
        self
    }

    /// Swap policy for the file streamer.
    pub fn with_swap_policy(mut self, policy: SwapPolicy) -> Self {
        self.swap_policy = policy;
        self
    }

    /// Frames processed since `init`.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Complete blocks processed since `init`.
    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed
    }

    /// Per-channel processors, one per output channel.
    pub fn channels(&self) -> &[ChannelState] {
        &self.channels
    }

    /// Latest pitch estimate of every channel.
    pub fn frequencies(&self) -> impl Iterator<Item = f32> + '_ {
        self.channels.iter().map(ChannelState::frequency)
    }

    /// Channels covered by each readout.
    pub fn readout_channels(&self) -> usize {
        self.readout_channels
    }

    /// Streamer counters. After teardown, the counters at shutdown.
    pub fn streamer_stats(&self) -> StreamerStats {
        self.streamer
            .as_ref()
            .map_or(self.final_stats, Streamer::stats)
    }

    /// The capture, if enabled and initialized.
    pub fn capture(&self) -> Option<&CaptureSink> {
        self.capture.as_ref()
    }

    /// True once the capture filled up.
    pub fn is_capture_complete(&self) -> bool {
        self.capture_complete
    }

    /// Latest CPU load reading in percent.
    pub fn cpu_percent(&self) -> f32 {
        self.cpu.percent()
    }

    /// Why the last `init` failed.
    pub fn init_error(&self) -> Option<&Error> {
        self.init_error.as_ref()
    }

    /// Take the error from writing the capture at teardown, if any.
    pub fn take_persist_error(&mut self) -> Option<Error> {
        self.persist_error.take()
    }

    fn try_init(&mut self, config: &HostConfig) -> Result<()> {
        if config.output_channels == 0 {
            return Err(Error::Stream("no output channels".to_string()));
        }

        let streamer = match &self.input {
            InputSource::Live => None,
            InputSource::File { path, buffer_len } => Some(Streamer::open(path, *buffer_len)?),
            InputSource::Source { .. } => {
                match std::mem::replace(&mut self.input, InputSource::Live) {
                    InputSource::Source { source, buffer_len } => {
                        Some(Streamer::with_source(source, buffer_len)?)
                    }
                    _ => None,
                }
            }
        };

        let streamer = streamer.map(|s| {
            let s = s.with_policy(self.swap_policy);
            match &self.diagnostics {
                Some(tx) => s.with_diagnostics(tx.clone()),
                None => s,
            }
        });
        if let Some(s) = &streamer
            && s.sample_rate() != config.sample_rate
        {
            tracing::warn!(
                file_rate = s.sample_rate(),
                host_rate = config.sample_rate,
                "streamed file rate differs from host rate, playing without resampling"
            );
        }

        let sample_rate = config.sample_rate as f32;
        let count = config.output_channels;
        self.channels = (0..count)
            .map(|c| {
                let state = ChannelState::new(sample_rate, &self.settings);
                let offset = c * state.pitch().hop() / count;
                state.with_analysis_offset(offset)
            })
            .collect();
        self.readout_channels = match config.input_channels {
            0 => count,
            inputs => inputs.min(count),
        };

        self.capture = match &self.capture_config {
            Some(capture) => {
                let stream_frames = streamer.as_ref().map(Streamer::total_frames);
                let frames = capture.resolve_frames(config.sample_rate, stream_frames);
                if frames == 0 {
                    return Err(Error::Config(
                        ValidationError::InvalidValue {
                            param: "capture".to_string(),
                            reason: format!(
                                "length resolves to 0 frames at {} Hz",
                                config.sample_rate
                            ),
                        }
                        .into(),
                    ));
                }
                tracing::info!(
                    path = %capture.path.display(),
                    frames,
                    "capturing output"
                );
                Some(CaptureSink::new(config.output_channels, frames as usize))
            }
            None => None,
        };

        self.streamer = streamer;
        self.cpu = CpuLoad::new(config.block_size, config.sample_rate, CPU_METER_BLOCKS);
        self.host = Some(*config);
        self.frames_processed = 0;
        self.blocks_processed = 0;
        self.blocks_since_readout = 0;
        self.capture_complete = false;
        self.final_stats = StreamerStats::default();
        Ok(())
    }

    #[inline]
    fn report(&self, event: Diagnostic) {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.send(event);
        }
    }

    fn persist_capture(&self) -> Result<()> {
        let (Some(capture), Some(config), Some(host)) =
            (&self.capture, &self.capture_config, self.host)
        else {
            return Ok(());
        };
        let spec = WavSpec {
            channels: capture.channel_count() as u16,
            sample_rate: host.sample_rate,
            bits_per_sample: config.bits_per_sample,
        };
        capture.write_wav(&config.path, spec)?;
        tracing::info!(
            path = %config.path.display(),
            frames = capture.frames_written(),
            channels = capture.channel_count(),
            "capture written"
        );
        Ok(())
    }
}

impl AudioCallback for ResynthEngine {
    fn init(&mut self, config: &HostConfig) -> bool {
        match self.try_init(config) {
            Ok(()) => {
                self.init_error = None;
                tracing::info!(
                    sample_rate = config.sample_rate,
                    channels = config.output_channels,
                    block_size = config.block_size,
                    streaming = self.streamer.is_some(),
                    "resynth engine ready"
                );
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "resynth engine failed to initialize");
                self.init_error = Some(e);
                false
            }
        }
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if self.capture_complete {
            block.output_mut().fill(0.0);
            block.request_stop();
            return;
        }

        self.cpu.start();
        let channels = block.output_channels().min(self.channels.len());

        for n in 0..block.frames() {
            if let Some(streamer) = self.streamer.as_mut() {
                streamer.advance();
            }

            for (c, state) in self.channels[..channels].iter_mut().enumerate() {
                let x = match &self.streamer {
                    Some(streamer) => streamer.current_sample(c),
                    None => block.input_sample(n, c),
                };
                let out = state.process(x);
                block.set_output(n, c, out);
                if let Some(capture) = self.capture.as_mut() {
                    capture.write(c, out);
                }
            }
            self.frames_processed += 1;

            let full = self.capture.as_mut().is_some_and(CaptureSink::advance);
            if full {
                self.capture_complete = true;
                self.report(Diagnostic::CaptureComplete {
                    frames: self.frames_processed,
                });
                let tail = (n + 1) * block.output_channels();
                block.output_mut()[tail..].fill(0.0);
                block.request_stop();
                return;
            }
        }

        self.cpu.stop();
        self.blocks_processed += 1;
        self.blocks_since_readout += 1;
        if self.blocks_since_readout >= self.diagnostic_interval {
            self.blocks_since_readout = 0;
            let readout = self.channels[..self.readout_channels]
                .iter()
                .map(ChannelState::frequency);
            self.report(Diagnostic::readout(readout, self.cpu.percent()));
        }
    }

    fn teardown(&mut self) {
        if let Some(streamer) = self.streamer.take() {
            self.final_stats = streamer.stats();
            tracing::info!(
                boundaries = self.final_stats.boundaries,
                swaps = self.final_stats.swaps,
                deadline_misses = self.final_stats.deadline_misses,
                refill_failures = self.final_stats.refill_failures,
                "streaming stopped"
            );
        }
        if let Err(e) = self.persist_capture() {
            tracing::error!(error = %e, "failed to write capture");
            self.persist_error = Some(e);
        }
    }

    fn init_failure(&self) -> Option<String> {
        self.init_error.as_ref().map(ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::diagnostic_channel;
    use crate::host::StopHandle;
    use crate::source::MemorySource;
    use crate::wav::read_wav_info;
    use resynth_core::mix;
    use tempfile::TempDir;

    fn run_blocks(engine: &mut ResynthEngine, config: &HostConfig, blocks: usize) {
        let stop = StopHandle::new();
        let input = vec![0.0; config.block_size * config.input_channels];
        let mut output = vec![0.0; config.block_size * config.output_channels];
        for _ in 0..blocks {
            let mut block = AudioBlock::new(
                &input,
                config.input_channels,
                &mut output,
                config.output_channels,
                &stop,
            );
            engine.process(&mut block);
        }
    }

    fn constant_source(value: f32, channels: usize, frames: usize) -> Box<dyn ChunkSource> {
        Box::new(MemorySource::new(vec![vec![value; frames]; channels], 48000))
    }

    #[test]
    fn test_advance_counts_per_channel() {
        let config = HostConfig {
            sample_rate: 48000,
            input_channels: 1,
            output_channels: 3,
            block_size: 64,
        };
        let mut engine = ResynthEngine::new(InputSource::Live, ChannelSettings::default());
        assert!(engine.init(&config));
        run_blocks(&mut engine, &config, 25);

        assert_eq!(engine.frames_processed(), 25 * 64);
        assert_eq!(engine.blocks_processed(), 25);
        assert_eq!(engine.channels().len(), 3);
        for state in engine.channels() {
            assert_eq!(state.samples_processed(), 25 * 64);
        }
    }

    #[test]
    fn test_streamed_input_is_mixed_with_dry() {
        let config = HostConfig::output_only(48000, 1, 32);
        let mut engine = ResynthEngine::new(
            InputSource::Source {
                source: constant_source(0.5, 1, 1000),
                buffer_len: 100,
            },
            ChannelSettings::default(),
        );
        assert!(engine.init(&config));

        let stop = StopHandle::new();
        let mut output = vec![0.0; 32];
        let mut block = AudioBlock::new(&[], 0, &mut output, 1, &stop);
        engine.process(&mut block);

        let mut reference = ChannelState::new(48000.0, &ChannelSettings::default());
        let expected: Vec<f32> = (0..32).map(|_| reference.process(0.5)).collect();
        assert_eq!(output, expected);
        // Dry half of the mix is always present
        assert!(output.iter().all(|&y| y >= mix(0.5, -0.5 * 1.25)));
    }

    #[test]
    fn test_readout_every_interval() {
        let (tx, rx) = diagnostic_channel(64);
        let config = HostConfig::output_only(48000, 2, 16);
        let mut engine = ResynthEngine::new(InputSource::Live, ChannelSettings::default())
            .with_diagnostics(tx)
            .with_diagnostic_interval(10);
        assert!(engine.init(&config));
        run_blocks(&mut engine, &config, 35);

        let readouts: Vec<_> = rx
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                Diagnostic::Readout { channels, .. } => Some(channels),
                _ => None,
            })
            .collect();
        assert_eq!(readouts, vec![2, 2, 2]);
    }

    #[test]
    fn test_readout_covers_input_channels() {
        let (tx, rx) = diagnostic_channel(64);
        let config = HostConfig {
            sample_rate: 48000,
            input_channels: 1,
            output_channels: 3,
            block_size: 16,
        };
        let mut engine = ResynthEngine::new(InputSource::Live, ChannelSettings::default())
            .with_diagnostics(tx)
            .with_diagnostic_interval(4);
        assert!(engine.init(&config));
        assert_eq!(engine.readout_channels(), 1);
        run_blocks(&mut engine, &config, 8);

        let readouts: Vec<_> = rx
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                Diagnostic::Readout {
                    channels, omitted, ..
                } => Some((channels, omitted)),
                _ => None,
            })
            .collect();
        assert_eq!(readouts, vec![(1, 0), (1, 0)]);
    }

    #[test]
    fn test_zero_frame_capture_fails_init() {
        let dir = TempDir::new().unwrap();
        let mut engine = ResynthEngine::new(InputSource::Live, ChannelSettings::default())
            .with_capture(CaptureConfig {
                path: dir.path().join("never.wav"),
                seconds: Some(1e-6),
                ..CaptureConfig::default()
            });
        assert!(!engine.init(&HostConfig::output_only(48000, 1, 64)));
        assert!(matches!(engine.init_error(), Some(Error::Config(_))));
        assert!(engine.init_failure().unwrap().contains("0 frames"));
        assert!(!dir.path().join("never.wav").exists());
    }

    #[test]
    fn test_channel_analyses_are_staggered() {
        let config = HostConfig::output_only(48000, 8, 256);
        let mut engine = ResynthEngine::new(InputSource::Live, ChannelSettings::default());
        assert!(engine.init(&config));

        let hop = engine.channels()[0].pitch().hop();
        let offsets: Vec<usize> = engine
            .channels()
            .iter()
            .map(|state| state.pitch().analysis_offset())
            .collect();
        let expected: Vec<usize> = (0..8).map(|c| c * hop / 8).collect();
        assert_eq!(offsets, expected);
    }

    #[test]
    fn test_capture_completion_stops_mid_block() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.wav");
        let (tx, rx) = diagnostic_channel(64);
        let config = HostConfig::output_only(48000, 2, 64);
        let mut engine = ResynthEngine::new(
            InputSource::Source {
                source: constant_source(0.25, 2, 5000),
                buffer_len: 512,
            },
            ChannelSettings::default(),
        )
        .with_diagnostics(tx)
        .with_capture(CaptureConfig {
            path: path.clone(),
            frames: Some(100),
            ..CaptureConfig::default()
        });
        assert!(engine.init(&config));

        let stop = StopHandle::new();
        let mut output = vec![0.0; 128];
        for _ in 0..2 {
            let mut block = AudioBlock::new(&[], 0, &mut output, 2, &stop);
            engine.process(&mut block);
        }

        assert!(stop.is_stop_requested());
        assert!(engine.is_capture_complete());
        assert_eq!(engine.frames_processed(), 100);
        assert_eq!(engine.blocks_processed(), 1);
        assert!(
            rx.drain()
                .contains(&Diagnostic::CaptureComplete { frames: 100 })
        );

        engine.teardown();
        assert!(engine.take_persist_error().is_none());
        let info = read_wav_info(&path).unwrap();
        assert_eq!(info.num_frames, 100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.sample_rate, 48000);
    }

    #[test]
    fn test_short_file_fails_init() {
        let mut engine = ResynthEngine::new(
            InputSource::Source {
                source: constant_source(0.1, 1, 100),
                buffer_len: 100,
            },
            ChannelSettings::default(),
        );
        assert!(!engine.init(&HostConfig::output_only(48000, 1, 64)));
        assert!(matches!(
            engine.init_error(),
            Some(Error::FileTooShort {
                frames: 100,
                buffer_len: 100
            })
        ));
        assert!(engine.init_failure().is_some());
    }

    #[test]
    fn test_missing_file_fails_init() {
        let mut engine = ResynthEngine::new(
            InputSource::File {
                path: "/nonexistent/multiguit.wav".into(),
                buffer_len: 1024,
            },
            ChannelSettings::default(),
        );
        assert!(!engine.init(&HostConfig::default()));
        assert!(matches!(engine.init_error(), Some(Error::Wav(_))));
    }

    #[test]
    fn test_from_config() {
        let config = ResynthConfig {
            input: InputConfig::Live,
            diagnostic_interval: 5,
            ..ResynthConfig::default()
        };
        let mut engine = ResynthEngine::from_config(&config).unwrap();
        assert!(engine.init(&HostConfig::default()));
        assert!(engine.capture().is_none());
        assert_eq!(engine.diagnostic_interval, 5);
    }
}
