//! Audio-thread CPU load meter.

use std::time::{Duration, Instant};

/// Blocks averaged per CPU load reading.
pub const CPU_METER_BLOCKS: u32 = 100;

/// Measures time spent in the audio callback relative to the block period.
///
/// Call [`start`](Self::start) at the top of the callback and
/// [`stop`](Self::stop) at the end. Every `window` blocks the accumulated
/// time is turned into a percentage available from [`percent`](Self::percent).
#[derive(Debug, Clone)]
pub struct CpuLoad {
    period: Duration,
    window: u32,
    started: Option<Instant>,
    busy: Duration,
    blocks: u32,
    percent: f32,
}

impl CpuLoad {
    /// Create a meter for blocks of `block_size` frames at `sample_rate`.
    pub fn new(block_size: usize, sample_rate: u32, window: u32) -> Self {
        let period = Duration::from_secs_f64(block_size as f64 / f64::from(sample_rate.max(1)));
        Self {
            period,
            window: window.max(1),
            started: None,
            busy: Duration::ZERO,
            blocks: 0,
            percent: 0.0,
        }
    }

    /// Mark the start of a block.
    #[inline]
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Mark the end of a block. Ignored without a matching `start`.
    #[inline]
    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.record(started.elapsed());
        }
    }

    /// Add one block's processing time directly.
    pub fn record(&mut self, elapsed: Duration) {
        self.busy += elapsed;
        self.blocks += 1;
        if self.blocks >= self.window {
            let budget = self.period.as_secs_f64() * f64::from(self.blocks);
            self.percent = if budget > 0.0 {
                (self.busy.as_secs_f64() / budget * 100.0) as f32
            } else {
                0.0
            };
            self.busy = Duration::ZERO;
            self.blocks = 0;
        }
    }

    /// Latest averaged load in percent (0.0 until the first window completes).
    pub fn percent(&self) -> f32 {
        self.percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_after_window() {
        // 480 frames at 48 kHz = 10 ms period
        let mut cpu = CpuLoad::new(480, 48000, 4);
        for _ in 0..3 {
            cpu.record(Duration::from_millis(5));
        }
        assert_eq!(cpu.percent(), 0.0);
        cpu.record(Duration::from_millis(5));
        assert!((cpu.percent() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_window_resets() {
        let mut cpu = CpuLoad::new(480, 48000, 2);
        cpu.record(Duration::from_millis(10));
        cpu.record(Duration::from_millis(10));
        assert!((cpu.percent() - 100.0).abs() < 0.01);
        cpu.record(Duration::from_millis(1));
        cpu.record(Duration::from_millis(1));
        assert!((cpu.percent() - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_stop_without_start_ignored() {
        let mut cpu = CpuLoad::new(64, 48000, 1);
        cpu.stop();
        assert_eq!(cpu.percent(), 0.0);
        cpu.start();
        cpu.stop();
        assert!(cpu.percent() >= 0.0);
    }
}
