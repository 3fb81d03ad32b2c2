//! Display WAV file metadata.

use clap::Args;
use resynth_config::DEFAULT_BUFFER_LEN;
use resynth_io::{WavFormat, WavInfo, read_wav_info};

/// Display WAV file information.
#[derive(Args)]
pub struct InfoArgs {
    /// Path to the WAV file
    pub file: std::path::PathBuf,

    /// Chunk length to check the file against for streaming
    #[arg(long, default_value_t = DEFAULT_BUFFER_LEN)]
    pub buffer_len: usize,
}

/// Run the info command.
pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let info = read_wav_info(&args.file)?;

    let format_str = match info.format {
        WavFormat::Pcm => "PCM",
        WavFormat::IeeeFloat => "IEEE Float",
    };

    println!("File:        {}", args.file.display());
    println!("Format:      {} {}-bit", format_str, info.bits_per_sample);
    println!("Channels:    {}", info.channels);
    println!("Sample Rate: {} Hz", info.sample_rate);
    println!(
        "Duration:    {:.3}s ({} frames)",
        info.duration_secs, info.num_frames
    );
    println!("Streaming:   {}", streaming_summary(&info, args.buffer_len));

    let file_size = std::fs::metadata(&args.file)?.len();
    println!("File Size:   {}", format_bytes(file_size));

    Ok(())
}

/// How the file splits into chunks of `buffer_len` frames.
fn streaming_summary(info: &WavInfo, buffer_len: usize) -> String {
    let len = buffer_len as u64;
    if len == 0 || info.num_frames <= len {
        return format!("too short for {buffer_len}-frame chunks");
    }
    let chunks = info.num_frames.div_ceil(len);
    let padded = chunks * len - info.num_frames;
    if padded == 0 {
        format!("{chunks} chunks of {buffer_len} frames")
    } else {
        format!("{chunks} chunks of {buffer_len} frames, last padded by {padded}")
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(frames: u64) -> WavInfo {
        WavInfo {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            num_frames: frames,
            duration_secs: frames as f64 / 44100.0,
            format: WavFormat::Pcm,
        }
    }

    #[test]
    fn test_streaming_summary() {
        assert_eq!(streaming_summary(&info(1000), 1000), "too short for 1000-frame chunks");
        assert_eq!(streaming_summary(&info(3000), 1000), "3 chunks of 1000 frames");
        assert_eq!(
            streaming_summary(&info(2500), 1000),
            "3 chunks of 1000 frames, last padded by 500"
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }
}
