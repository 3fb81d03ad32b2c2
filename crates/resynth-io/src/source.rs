//! Chunk buffers and the sources that fill them.
//!
//! A [`ChunkSource`] is anything that can copy a range of frames into a
//! [`ChunkBuffer`]. [`fill_chunk`] wraps a source read with the end-of-file
//! handling the streamer relies on: frames past the end are zero-padded.

use crate::wav::int_full_scale;
use crate::{Error, Result};
use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Fixed-shape block of audio, `channels × len` samples stored channel-major.
#[derive(Debug, Clone)]
pub struct ChunkBuffer {
    data: Vec<f32>,
    channels: usize,
    len: usize,
    start_frame: u64,
    valid_frames: usize,
    failed: bool,
}

impl ChunkBuffer {
    /// Allocate a silent buffer.
    pub fn new(channels: usize, len: usize) -> Self {
        Self {
            data: vec![0.0; channels * len],
            channels,
            len,
            start_frame: 0,
            valid_frames: 0,
            failed: false,
        }
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the buffer holds no frames.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One channel's samples.
    pub fn channel(&self, channel: usize) -> &[f32] {
        let start = channel * self.len;
        &self.data[start..start + self.len]
    }

    /// One channel's samples, mutably.
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        let start = channel * self.len;
        &mut self.data[start..start + self.len]
    }

    /// Sample `index` of `channel`.
    #[inline]
    pub fn sample(&self, channel: usize, index: usize) -> f32 {
        self.data[channel * self.len + index]
    }

    /// File frame the buffer was loaded from.
    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    /// Frames that came from the source; the rest is padding.
    pub fn valid_frames(&self) -> usize {
        self.valid_frames
    }

    /// Zero frames appended after the end of the source.
    pub fn padded_frames(&self) -> usize {
        self.len - self.valid_frames
    }

    /// True if the last load failed and the buffer holds silence.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Replace the contents with silence and mark the load as failed.
    pub(crate) fn mark_failed(&mut self, start_frame: u64) {
        self.data.fill(0.0);
        self.start_frame = start_frame;
        self.valid_frames = 0;
        self.failed = true;
    }
}

/// Random-access source of multi-channel frames.
pub trait ChunkSource: Send {
    /// Channel count.
    fn channels(&self) -> usize;

    /// Length in frames.
    fn total_frames(&self) -> u64;

    /// Native sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Copy `frames` frames starting at `start` into the front of each channel
    /// of `buffer`. Returns the number of frames actually copied.
    fn read_frames(&mut self, start: u64, frames: usize, buffer: &mut ChunkBuffer)
    -> Result<usize>;
}

impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    fn channels(&self) -> usize {
        (**self).channels()
    }

    fn total_frames(&self) -> u64 {
        (**self).total_frames()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn read_frames(
        &mut self,
        start: u64,
        frames: usize,
        buffer: &mut ChunkBuffer,
    ) -> Result<usize> {
        (**self).read_frames(start, frames, buffer)
    }
}

/// Load the chunk starting at `start` into `buffer`.
///
/// Frames `[start, min(start + len, total))` come from the source; the
/// remaining `len - (total - start)` frames of every channel are zeroed.
/// Returns the number of padded frames.
pub fn fill_chunk<S: ChunkSource + ?Sized>(
    source: &mut S,
    start: u64,
    buffer: &mut ChunkBuffer,
) -> Result<usize> {
    let available = source.total_frames().saturating_sub(start);
    let wanted = available.min(buffer.len() as u64) as usize;
    let read = if wanted > 0 {
        source.read_frames(start, wanted, buffer)?.min(wanted)
    } else {
        0
    };

    for channel in 0..buffer.channels() {
        buffer.channel_mut(channel)[read..].fill(0.0);
    }
    buffer.start_frame = start;
    buffer.valid_frames = read;
    buffer.failed = false;

    Ok(buffer.padded_frames())
}

/// [`ChunkSource`] over a WAV file, seeking and decoding on every read.
pub struct WavChunkSource {
    reader: WavReader<BufReader<File>>,
    channels: usize,
    frames: u64,
    sample_rate: u32,
    format: SampleFormat,
    scale: f32,
}

impl WavChunkSource {
    /// Open a WAV file. Fails with [`Error::EmptyFile`] when the file has no
    /// channels or no frames.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        let frames = u64::from(reader.duration());
        if channels == 0 || frames == 0 {
            return Err(Error::EmptyFile);
        }

        Ok(Self {
            reader,
            channels,
            frames,
            sample_rate: spec.sample_rate,
            format: spec.sample_format,
            scale: int_full_scale(spec.bits_per_sample),
        })
    }
}

impl ChunkSource for WavChunkSource {
    fn channels(&self) -> usize {
        self.channels
    }

    fn total_frames(&self) -> u64 {
        self.frames
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_frames(
        &mut self,
        start: u64,
        frames: usize,
        buffer: &mut ChunkBuffer,
    ) -> Result<usize> {
        let start = u32::try_from(start).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "frame offset out of range")
        })?;
        self.reader.seek(start)?;

        let channels = self.channels;
        let frames = frames.min(buffer.len());
        let wanted = frames * channels;
        let mut copied = 0;

        match self.format {
            SampleFormat::Float => {
                for (i, sample) in self.reader.samples::<f32>().take(wanted).enumerate() {
                    buffer.channel_mut(i % channels)[i / channels] = sample?;
                    copied = i + 1;
                }
            }
            SampleFormat::Int => {
                let scale = self.scale;
                for (i, sample) in self.reader.samples::<i32>().take(wanted).enumerate() {
                    buffer.channel_mut(i % channels)[i / channels] = sample? as f32 / scale;
                    copied = i + 1;
                }
            }
        }

        Ok(copied / channels)
    }
}

/// [`ChunkSource`] over channels already in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    channels: Vec<Vec<f32>>,
    frames: u64,
    sample_rate: u32,
}

impl MemorySource {
    /// Wrap per-channel sample vectors. Length is the shortest channel.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0) as u64;
        Self {
            channels,
            frames,
            sample_rate,
        }
    }
}

impl ChunkSource for MemorySource {
    fn channels(&self) -> usize {
        self.channels.len()
    }

    fn total_frames(&self) -> u64 {
        self.frames
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_frames(
        &mut self,
        start: u64,
        frames: usize,
        buffer: &mut ChunkBuffer,
    ) -> Result<usize> {
        let start = start.min(self.frames) as usize;
        let end = (start + frames.min(buffer.len())).min(self.frames as usize);
        for (ch, samples) in self.channels.iter().enumerate() {
            buffer.channel_mut(ch)[..end - start].copy_from_slice(&samples[start..end]);
        }
        Ok(end - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::{WavSpec, write_wav_channels};
    use tempfile::NamedTempFile;

    fn counting_source(channels: usize, frames: usize) -> MemorySource {
        let data = (0..channels)
            .map(|ch| (0..frames).map(|i| (ch * 1000 + i) as f32).collect())
            .collect();
        MemorySource::new(data, 48000)
    }

    #[test]
    fn test_fill_full_chunk() {
        let mut source = counting_source(2, 100);
        let mut buffer = ChunkBuffer::new(2, 10);
        let padded = fill_chunk(&mut source, 20, &mut buffer).unwrap();

        assert_eq!(padded, 0);
        assert_eq!(buffer.start_frame(), 20);
        assert_eq!(buffer.sample(0, 0), 20.0);
        assert_eq!(buffer.sample(1, 9), 1029.0);
    }

    #[test]
    fn test_fill_pads_past_end() {
        let mut source = counting_source(2, 95);
        let mut buffer = ChunkBuffer::new(2, 10);
        buffer.channel_mut(0).fill(7.0);
        buffer.channel_mut(1).fill(7.0);

        let padded = fill_chunk(&mut source, 90, &mut buffer).unwrap();
        assert_eq!(padded, 5);
        assert_eq!(buffer.valid_frames(), 5);
        for ch in 0..2 {
            assert!(buffer.channel(ch)[5..].iter().all(|&s| s == 0.0));
        }
        assert_eq!(buffer.sample(0, 4), 94.0);
    }

    #[test]
    fn test_wav_source_matches_file() {
        let left: Vec<f32> = (0..500).map(|i| i as f32 / 1000.0).collect();
        let right: Vec<f32> = left.iter().map(|x| -x).collect();
        let file = NamedTempFile::new().unwrap();
        write_wav_channels(
            file.path(),
            &[left.clone(), right.clone()],
            WavSpec {
                channels: 2,
                sample_rate: 44100,
                bits_per_sample: 32,
            },
        )
        .unwrap();

        let mut source = WavChunkSource::open(file.path()).unwrap();
        assert_eq!(source.channels(), 2);
        assert_eq!(source.total_frames(), 500);
        assert_eq!(source.sample_rate(), 44100);

        let mut buffer = ChunkBuffer::new(2, 64);
        fill_chunk(&mut source, 480, &mut buffer).unwrap();
        assert_eq!(buffer.valid_frames(), 20);
        assert_eq!(buffer.channel(0)[..20], left[480..]);
        assert_eq!(buffer.channel(1)[..20], right[480..]);

        // Seeking backwards works too
        fill_chunk(&mut source, 0, &mut buffer).unwrap();
        assert_eq!(buffer.channel(0), &left[..64]);
    }

    #[test]
    fn test_wav_source_int_scaling() {
        let samples = vec![0.5f32; 32];
        let file = NamedTempFile::new().unwrap();
        write_wav_channels(
            file.path(),
            &[samples],
            WavSpec {
                channels: 1,
                sample_rate: 48000,
                bits_per_sample: 16,
            },
        )
        .unwrap();

        let mut source = WavChunkSource::open(file.path()).unwrap();
        let mut buffer = ChunkBuffer::new(1, 32);
        fill_chunk(&mut source, 0, &mut buffer).unwrap();
        assert!(buffer.channel(0).iter().all(|&s| (s - 0.5).abs() < 1e-4));
    }

    #[test]
    fn test_wav_source_rejects_empty() {
        let file = NamedTempFile::new().unwrap();
        write_wav_channels(file.path(), &[Vec::<f32>::new()], WavSpec::default()).unwrap();
        assert!(matches!(
            WavChunkSource::open(file.path()),
            Err(Error::EmptyFile)
        ));
    }
}
