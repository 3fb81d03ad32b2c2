//! Host callback contract.
//!
//! A host owns the audio clock and calls into an [`AudioCallback`] once per
//! block. The same callback runs under [`OfflineHost`](crate::OfflineHost)
//! for rendering and tests, and under [`CpalHost`](crate::CpalHost) for live
//! audio.
//!
//! ## Buffer Layout
//!
//! Input and output are interleaved: `[c0f0, c1f0, c0f1, c1f1, ...]`. The
//! slices hold `frames * channels` samples.
//!
//! ## Real-Time Safety
//!
//! [`AudioCallback::process`] runs on the audio thread. It must not allocate,
//! lock or perform I/O. Allocation belongs in [`AudioCallback::init`] and
//! persistence in [`AudioCallback::teardown`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stream parameters a host reports to its callback before the first block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved input channels (0 when the host has no input).
    pub input_channels: usize,
    /// Interleaved output channels.
    pub output_channels: usize,
    /// Maximum frames per block.
    pub block_size: usize,
}

impl HostConfig {
    /// Configuration for a host with no input.
    pub fn output_only(sample_rate: u32, output_channels: usize, block_size: usize) -> Self {
        Self {
            sample_rate,
            input_channels: 0,
            output_channels,
            block_size,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            input_channels: 1,
            output_channels: 1,
            block_size: 256,
        }
    }
}

/// Shared flag asking the host to stop.
///
/// Cloning shares the flag, so the same handle can be raised from the audio
/// thread (capture complete) or a signal handler (Ctrl-C).
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// New handle, not yet raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the host to stop after the current block.
    #[inline]
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once a stop has been requested.
    #[inline]
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One block handed to [`AudioCallback::process`].
#[derive(Debug)]
pub struct AudioBlock<'a> {
    input: &'a [f32],
    output: &'a mut [f32],
    frames: usize,
    input_channels: usize,
    output_channels: usize,
    stop: &'a StopHandle,
}

impl<'a> AudioBlock<'a> {
    /// Wrap interleaved host buffers. The frame count comes from the output
    /// length; missing input frames read as silence.
    pub fn new(
        input: &'a [f32],
        input_channels: usize,
        output: &'a mut [f32],
        output_channels: usize,
        stop: &'a StopHandle,
    ) -> Self {
        let frames = output.len().checked_div(output_channels).unwrap_or(0);
        Self {
            input,
            output,
            frames,
            input_channels,
            output_channels,
            stop,
        }
    }

    /// Frames in this block.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Interleaved input channels.
    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    /// Interleaved output channels.
    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// Raw interleaved input.
    pub fn input(&self) -> &[f32] {
        self.input
    }

    /// Raw interleaved output.
    pub fn output_mut(&mut self) -> &mut [f32] {
        self.output
    }

    /// Input sample for `frame` on `channel`, wrapped modulo the input
    /// channel count. Zero when the host has no input.
    #[inline]
    pub fn input_sample(&self, frame: usize, channel: usize) -> f32 {
        if self.input_channels == 0 {
            return 0.0;
        }
        self.input
            .get(frame * self.input_channels + channel % self.input_channels)
            .copied()
            .unwrap_or(0.0)
    }

    /// Write the output sample for `frame` on `channel`.
    #[inline]
    pub fn set_output(&mut self, frame: usize, channel: usize, sample: f32) {
        if let Some(slot) = self.output.get_mut(frame * self.output_channels + channel) {
            *slot = sample;
        }
    }

    /// Ask the host to stop once this block returns.
    #[inline]
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// The host's stop handle.
    pub fn stop_handle(&self) -> &StopHandle {
        self.stop
    }
}

/// Processing callback driven by a host.
pub trait AudioCallback: Send {
    /// Prepare for the given stream. Returning `false` aborts the run
    /// before any block is processed.
    fn init(&mut self, config: &HostConfig) -> bool;

    /// Fill `block`'s output from its input.
    fn process(&mut self, block: &mut AudioBlock<'_>);

    /// Called once after the last block, off the audio thread.
    fn teardown(&mut self);

    /// Why the last `init` returned `false`, if the callback knows.
    fn init_failure(&self) -> Option<String> {
        None
    }
}

impl<C: AudioCallback + ?Sized> AudioCallback for Box<C> {
    fn init(&mut self, config: &HostConfig) -> bool {
        (**self).init(config)
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        (**self).process(block);
    }

    fn teardown(&mut self) {
        (**self).teardown();
    }

    fn init_failure(&self) -> Option<String> {
        (**self).init_failure()
    }
}
