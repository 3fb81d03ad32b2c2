//! Fixed-length output capture.
//!
//! Storage is allocated up front so that recording from the audio callback
//! never allocates. Once full, further writes are ignored and the owner is
//! expected to stop the run and persist the result with
//! [`CaptureSink::write_wav`].

use crate::Result;
use crate::wav::{WavSpec, write_wav_channels};
use std::path::Path;

/// Pre-allocated multi-channel recording buffer.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    channels: Vec<Vec<f32>>,
    capacity: usize,
    frames_written: usize,
}

impl CaptureSink {
    /// Allocate room for `capacity` frames of `channels` channels.
    pub fn new(channels: usize, capacity: usize) -> Self {
        Self {
            channels: (0..channels).map(|_| vec![0.0; capacity]).collect(),
            capacity,
            frames_written: 0,
        }
    }

    /// Store `sample` for `channel` at the current frame. Ignored when full
    /// or when `channel` is out of range.
    #[inline]
    pub fn write(&mut self, channel: usize, sample: f32) {
        if self.frames_written < self.capacity
            && let Some(buffer) = self.channels.get_mut(channel)
        {
            buffer[self.frames_written] = sample;
        }
    }

    /// Finish the current frame. Returns `true` once the capture is full.
    #[inline]
    pub fn advance(&mut self) -> bool {
        if self.frames_written < self.capacity {
            self.frames_written += 1;
        }
        self.is_full()
    }

    /// Write a whole frame and advance. Returns `true` once full.
    pub fn push_frame(&mut self, frame: &[f32]) -> bool {
        for (channel, &sample) in frame.iter().enumerate() {
            self.write(channel, sample);
        }
        self.advance()
    }

    /// True when every frame has been written.
    pub fn is_full(&self) -> bool {
        self.frames_written >= self.capacity
    }

    /// Frames recorded so far.
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Frames the sink can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Recorded samples of one channel.
    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.channels[channel][..self.frames_written]
    }

    /// Take the recorded channels, trimmed to the frames written.
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        let frames = self.frames_written;
        self.channels
            .into_iter()
            .map(|mut c| {
                c.truncate(frames);
                c
            })
            .collect()
    }

    /// Persist the recorded frames as a WAV file.
    pub fn write_wav<P: AsRef<Path>>(&self, path: P, spec: WavSpec) -> Result<()> {
        let recorded: Vec<&[f32]> = (0..self.channels.len()).map(|c| self.channel(c)).collect();
        write_wav_channels(path, &recorded, spec)
    }
}
