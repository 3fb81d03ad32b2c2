//! Real-time processing command.

use super::common::{CaptureArgs, DiagnosticsLogger, EffectArgs, stop_on_ctrlc};
use clap::Args;
use resynth_config::{DEFAULT_BUFFER_LEN, InputConfig, ResynthConfig};
use resynth_io::{CpalHost, ResynthEngine, StopHandle, StreamConfig};
use std::path::PathBuf;

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    effect: EffectArgs,

    #[command(flatten)]
    capture: CaptureArgs,

    /// Process live input from the input device
    #[arg(long, conflicts_with = "stream")]
    live: bool,

    /// Stream this WAV file as input
    #[arg(long, value_name = "FILE")]
    stream: Option<PathBuf>,

    /// Frames per streaming chunk
    #[arg(long)]
    buffer_len: Option<usize>,

    /// Sample rate (output device default if omitted)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Frames per audio callback
    #[arg(long, default_value = "256")]
    block_size: u32,

    /// Output channel count (output device default if omitted)
    #[arg(long)]
    channels: Option<u16>,

    /// Input device name or index
    #[arg(long)]
    input_device: Option<String>,

    /// Output device name or index
    #[arg(long)]
    output_device: Option<String>,
}

impl RunArgs {
    fn resolve_config(&self) -> anyhow::Result<ResynthConfig> {
        let mut config = self.effect.load()?;

        if self.live {
            config.input = InputConfig::Live;
        } else if let Some(path) = &self.stream {
            config.input = InputConfig::Stream {
                path: path.clone(),
                buffer_len: self.buffer_len.unwrap_or(DEFAULT_BUFFER_LEN),
            };
        }
        if let (Some(len), InputConfig::Stream { buffer_len, .. }) =
            (self.buffer_len, &mut config.input)
        {
            *buffer_len = len;
        }

        if self.capture.is_set() {
            let base = config.capture.take().unwrap_or_default();
            config.capture = Some(self.capture.apply_to(base));
        }

        config.validate()?;
        Ok(config)
    }
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = args.resolve_config()?;

    let logger = DiagnosticsLogger::start()?;
    let engine = ResynthEngine::from_config(&config)?.with_diagnostics(logger.sender());

    let host = CpalHost::new(&StreamConfig {
        sample_rate: args.sample_rate,
        block_size: args.block_size,
        input_device: args.input_device,
        output_device: args.output_device,
        output_channels: args.channels,
        live_input: config.is_live(),
    })?;
    let host_config = host.host_config();

    match &config.input {
        InputConfig::Live => println!("Input:       live ({} ch)", host_config.input_channels),
        InputConfig::Stream { path, buffer_len } => println!(
            "Input:       {} ({} frame chunks)",
            path.display(),
            buffer_len
        ),
    }
    println!(
        "Output:      {} ch @ {} Hz, {} frame blocks",
        host_config.output_channels, host_config.sample_rate, host_config.block_size
    );
    if let Some(capture) = &config.capture {
        println!("Capture:     {}", capture.path.display());
    }
    println!("\nPress Ctrl+C to stop...\n");

    let stop = StopHandle::new();
    stop_on_ctrlc(&stop)?;

    let mut engine = host.run(engine, &stop)?;
    let stats = engine.streamer_stats();
    let persist_error = engine.take_persist_error();
    let frames = engine.frames_processed();
    drop(engine);
    logger.finish()?;

    if let Some(e) = persist_error {
        return Err(e.into());
    }

    println!(
        "Processed {} frames ({:.1}s)",
        frames,
        frames as f64 / f64::from(host_config.sample_rate)
    );
    if !config.is_live() {
        println!(
            "Buffer swaps: {}, deadline misses: {}",
            stats.swaps, stats.deadline_misses
        );
    }
    Ok(())
}
