//! Offline rendering command.

use super::common::{CaptureArgs, DiagnosticsLogger, EffectArgs, stop_on_ctrlc};
use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use resynth_config::{DEFAULT_BUFFER_LEN, InputConfig};
use resynth_io::{HostConfig, OfflineHost, ResynthEngine, StopHandle, SwapPolicy, read_wav_info};
use std::path::PathBuf;

#[derive(Args)]
pub struct RenderArgs {
    /// WAV file to stream through the effect
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    #[command(flatten)]
    effect: EffectArgs,

    #[command(flatten)]
    capture: CaptureArgs,

    /// Frames per streaming chunk
    #[arg(long, default_value_t = DEFAULT_BUFFER_LEN)]
    buffer_len: usize,

    /// Frames per processing block
    #[arg(long, default_value = "512")]
    block_size: usize,

    /// Output channel count (input file's channel count if omitted)
    #[arg(long)]
    channels: Option<usize>,

    /// Processing sample rate (input file's rate if omitted)
    #[arg(long)]
    sample_rate: Option<u32>,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let info = read_wav_info(&args.input)
        .with_context(|| format!("cannot read {}", args.input.display()))?;

    let mut config = args.effect.load()?;
    config.input = InputConfig::Stream {
        path: args.input.clone(),
        buffer_len: args.buffer_len,
    };
    let base = config.capture.take().unwrap_or_default();
    let capture = args.capture.apply_to(base);
    config.capture = Some(capture.clone());
    config.validate()?;

    let sample_rate = args.sample_rate.unwrap_or(info.sample_rate);
    let channels = args.channels.unwrap_or(usize::from(info.channels));
    let frames = capture.resolve_frames(sample_rate, Some(info.num_frames));

    println!("Reading {}...", args.input.display());
    println!(
        "  {} ch, {} Hz, {:.2}s ({} frames)",
        info.channels, info.sample_rate, info.duration_secs, info.num_frames
    );
    println!(
        "Rendering {} frames ({} ch @ {} Hz) to {}...",
        frames,
        channels,
        sample_rate,
        capture.path.display()
    );

    let logger = DiagnosticsLogger::start()?;
    let engine = ResynthEngine::from_config(&config)?
        .with_swap_policy(SwapPolicy::WaitForRefill)
        .with_diagnostics(logger.sender());

    let stop = StopHandle::new();
    stop_on_ctrlc(&stop)?;
    let host = OfflineHost::new(HostConfig::output_only(sample_rate, channels, args.block_size))
        .with_max_frames(frames)
        .with_stop_handle(stop);

    let pb = ProgressBar::new(frames);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    let result = host.run_with_progress(engine, |done| pb.set_position(done.min(frames)));
    pb.finish_with_message("done");
    let (report, mut engine) = result?;

    let stats = engine.streamer_stats();
    let persist_error = engine.take_persist_error();
    let pitches: Vec<f32> = engine.frequencies().collect();
    drop(engine);
    logger.finish()?;

    if let Some(e) = persist_error {
        return Err(e.into());
    }

    println!("\nSummary:");
    println!("  Frames:          {}", report.frames.min(frames));
    println!("  Blocks:          {}", report.blocks);
    println!("  Buffer swaps:    {}", stats.swaps);
    println!("  Deadline misses: {}", stats.deadline_misses);
    for (ch, hz) in pitches.iter().enumerate() {
        println!("  Pitch ch{ch}:      {hz:.2} Hz");
    }
    println!("Wrote {}", capture.path.display());
    Ok(())
}
