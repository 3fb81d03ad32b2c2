//! Deterministic host that drives a callback block by block without a device.
//!
//! Used by the `render` command and by tests: the audio clock is the loop
//! counter, so runs are reproducible and can go faster than real time.

use crate::host::{AudioBlock, AudioCallback, HostConfig, StopHandle};
use crate::{Error, Result};

/// Input fed to the callback.
#[derive(Debug, Clone, Default)]
pub enum OfflineInput {
    /// Every input sample is zero; the run only ends on stop or frame limit.
    #[default]
    Silence,
    /// Interleaved samples with `HostConfig::input_channels` channels. The
    /// run ends when they are used up.
    Interleaved(Vec<f32>),
}

/// Summary of an offline run.
#[derive(Debug, Clone, Default)]
pub struct OfflineReport {
    /// Frames handed to the callback.
    pub frames: u64,
    /// Blocks processed.
    pub blocks: u64,
    /// Whether the run ended because a stop was requested.
    pub stopped: bool,
    /// Interleaved output, when collection was enabled.
    pub output: Option<Vec<f32>>,
}

/// Runs an [`AudioCallback`] to completion on the calling thread.
#[derive(Debug, Clone)]
pub struct OfflineHost {
    config: HostConfig,
    input: OfflineInput,
    max_frames: Option<u64>,
    collect_output: bool,
    stop: StopHandle,
}

impl OfflineHost {
    /// Create a host with silent input and no frame limit.
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            input: OfflineInput::Silence,
            max_frames: None,
            collect_output: false,
            stop: StopHandle::new(),
        }
    }

    /// Set the input fed to the callback.
    pub fn with_input(mut self, input: OfflineInput) -> Self {
        self.input = input;
        self
    }

    /// Stop after at most `frames` frames.
    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    /// Keep a copy of every output block in the report.
    pub fn with_output_collection(mut self, collect: bool) -> Self {
        self.collect_output = collect;
        self
    }

    /// Share an existing stop flag, e.g. one raised by a Ctrl-C handler.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// The stop flag checked between blocks.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Host configuration passed to `init`.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Run `callback` until stop, frame limit or end of input.
    ///
    /// Returns the report together with the callback so its final state can
    /// be inspected.
    pub fn run<C: AudioCallback>(&self, callback: C) -> Result<(OfflineReport, C)> {
        self.run_with_progress(callback, |_| {})
    }

    /// Like [`run`](Self::run), calling `progress` with the running frame
    /// count after every block.
    pub fn run_with_progress<C, F>(&self, mut callback: C, mut progress: F) -> Result<(OfflineReport, C)>
    where
        C: AudioCallback,
        F: FnMut(u64),
    {
        let config = self.config;
        if config.output_channels == 0 {
            return Err(Error::Stream("host needs at least one output channel".to_string()));
        }
        if self.max_frames.is_none() && matches!(self.input, OfflineInput::Silence) {
            tracing::debug!("offline run has no frame limit, waiting for a stop request");
        }

        if !callback.init(&config) {
            let reason = callback
                .init_failure()
                .unwrap_or_else(|| "callback rejected the host configuration".to_string());
            return Err(Error::InitFailed(reason));
        }

        let block_size = config.block_size.max(1);
        let in_ch = config.input_channels;
        let out_ch = config.output_channels;

        let available = match &self.input {
            OfflineInput::Interleaved(samples) if in_ch > 0 => Some((samples.len() / in_ch) as u64),
            _ => None,
        };
        let limit = match (available, self.max_frames) {
            (Some(a), Some(m)) => Some(a.min(m)),
            (a, m) => a.or(m),
        };

        let silence = vec![0.0; block_size * in_ch];
        let mut output = vec![0.0; block_size * out_ch];
        let mut collected = self.collect_output.then(Vec::new);
        let mut report = OfflineReport::default();

        tracing::debug!(
            sample_rate = config.sample_rate,
            block_size,
            input_channels = in_ch,
            output_channels = out_ch,
            limit,
            "offline run started"
        );

        while !self.stop.is_stop_requested() {
            let frames = match limit {
                Some(limit) => (limit - report.frames).min(block_size as u64) as usize,
                None => block_size,
            };
            if frames == 0 {
                break;
            }

            let input = match &self.input {
                OfflineInput::Interleaved(samples) if in_ch > 0 => {
                    let start = report.frames as usize * in_ch;
                    &samples[start..start + frames * in_ch]
                }
                _ => &silence[..frames * in_ch],
            };
            let out = &mut output[..frames * out_ch];
            out.fill(0.0);

            let mut block = AudioBlock::new(input, in_ch, out, out_ch, &self.stop);
            callback.process(&mut block);

            if let Some(collected) = collected.as_mut() {
                collected.extend_from_slice(&output[..frames * out_ch]);
            }
            report.frames += frames as u64;
            report.blocks += 1;
            progress(report.frames);
        }

        report.stopped = self.stop.is_stop_requested();
        report.output = collected;
        callback.teardown();

        tracing::debug!(
            frames = report.frames,
            blocks = report.blocks,
            stopped = report.stopped,
            "offline run finished"
        );
        Ok((report, callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Doubles channel 0 of the input into every output channel and stops
    /// after `stop_after` frames.
    #[derive(Default)]
    struct Doubler {
        config: Option<HostConfig>,
        frames: u64,
        stop_after: Option<u64>,
        torn_down: bool,
        refuse: bool,
    }

    impl AudioCallback for Doubler {
        fn init(&mut self, config: &HostConfig) -> bool {
            self.config = Some(*config);
            !self.refuse
        }

        fn process(&mut self, block: &mut AudioBlock<'_>) {
            for frame in 0..block.frames() {
                let x = block.input_sample(frame, 0) * 2.0;
                for ch in 0..block.output_channels() {
                    block.set_output(frame, ch, x);
                }
                self.frames += 1;
                if self.stop_after == Some(self.frames) {
                    block.request_stop();
                    return;
                }
            }
        }

        fn teardown(&mut self) {
            self.torn_down = true;
        }

        fn init_failure(&self) -> Option<String> {
            self.refuse.then(|| "refused".to_string())
        }
    }

    #[test]
    fn test_runs_to_frame_limit() {
        let host = OfflineHost::new(HostConfig::output_only(48000, 2, 64)).with_max_frames(1000);
        let (report, doubler) = host.run(Doubler::default()).unwrap();

        assert_eq!(report.frames, 1000);
        assert_eq!(report.blocks, 16);
        assert!(!report.stopped);
        assert_eq!(doubler.frames, 1000);
        assert!(doubler.torn_down);
        assert_eq!(doubler.config.map(|c| c.block_size), Some(64));
    }

    #[test]
    fn test_consumes_interleaved_input() {
        let config = HostConfig {
            sample_rate: 48000,
            input_channels: 2,
            output_channels: 1,
            block_size: 4,
        };
        let input: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let host = OfflineHost::new(config)
            .with_input(OfflineInput::Interleaved(input))
            .with_output_collection(true);
        let (report, _) = host.run(Doubler::default()).unwrap();

        assert_eq!(report.frames, 10);
        let output = report.output.unwrap();
        assert_eq!(output.len(), 10);
        assert_eq!(output[3], 12.0);
    }

    #[test]
    fn test_stop_request_ends_run() {
        let host = OfflineHost::new(HostConfig::output_only(48000, 1, 32));
        let doubler = Doubler {
            stop_after: Some(50),
            ..Doubler::default()
        };
        let (report, doubler) = host.run(doubler).unwrap();

        assert!(report.stopped);
        assert_eq!(doubler.frames, 50);
        assert_eq!(report.blocks, 2);
        assert!(doubler.torn_down);
    }

    #[test]
    fn test_progress_reports_frames() {
        let host = OfflineHost::new(HostConfig::output_only(48000, 1, 100)).with_max_frames(250);
        let mut seen = Vec::new();
        host.run_with_progress(Doubler::default(), |f| seen.push(f))
            .unwrap();
        assert_eq!(seen, vec![100, 200, 250]);
    }

    #[test]
    fn test_init_refusal_is_an_error() {
        let host = OfflineHost::new(HostConfig::default()).with_max_frames(10);
        let doubler = Doubler {
            refuse: true,
            ..Doubler::default()
        };
        match host.run(doubler) {
            Err(Error::InitFailed(reason)) => assert_eq!(reason, "refused"),
            other => panic!("unexpected {:?}", other.map(|(r, _)| r)),
        }
    }
}
