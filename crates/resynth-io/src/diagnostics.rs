//! Diagnostic events from the audio thread.
//!
//! The audio thread must not format strings or block on a logger, so it
//! queues fixed-size [`Diagnostic`] values on a bounded channel with
//! `try_send`. A separate thread ([`spawn_logger`]) drains the queue into
//! `tracing`. Events that do not fit are dropped and counted.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

/// Channels carried by a [`Diagnostic::Readout`].
pub const MAX_READOUT_CHANNELS: usize = 16;

/// Default queue depth.
pub const DIAGNOSTIC_CAPACITY: usize = 64;

/// One event reported by the audio thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Diagnostic {
    /// Periodic pitch estimates and CPU load.
    Readout {
        /// Pitch estimate per channel in Hz; only the first `channels` are set.
        frequencies: [f32; MAX_READOUT_CHANNELS],
        /// Number of valid entries in `frequencies`.
        channels: usize,
        /// Channels past [`MAX_READOUT_CHANNELS`] left out of `frequencies`.
        omitted: usize,
        /// Processing time as a percentage of the block period.
        cpu_percent: f32,
    },
    /// A streaming buffer was not refilled by the time it was needed.
    DeadlineMiss {
        /// Total deadline misses so far.
        misses: u64,
        /// Total buffer boundaries crossed so far.
        boundaries: u64,
    },
    /// A refill read failed; the chunk was replaced by silence.
    RefillFailed {
        /// File frame the chunk should have started at.
        start_frame: u64,
    },
    /// The output capture is full.
    CaptureComplete {
        /// Frames captured.
        frames: u64,
    },
}

impl Diagnostic {
    /// Build a readout from per-channel estimates.
    ///
    /// Channels beyond [`MAX_READOUT_CHANNELS`] are counted in `omitted`.
    pub fn readout(frequencies: impl IntoIterator<Item = f32>, cpu_percent: f32) -> Self {
        let mut values = [0.0; MAX_READOUT_CHANNELS];
        let mut channels = 0;
        let mut omitted = 0;
        for f in frequencies {
            if channels < MAX_READOUT_CHANNELS {
                values[channels] = f;
                channels += 1;
            } else {
                omitted += 1;
            }
        }
        Diagnostic::Readout {
            frequencies: values,
            channels,
            omitted,
            cpu_percent,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Readout {
                frequencies,
                channels,
                omitted,
                cpu_percent,
            } => {
                for freq in &frequencies[..*channels] {
                    write!(f, "{freq:.2} ")?;
                }
                if *omitted > 0 {
                    write!(f, "(+{omitted} channels not shown) ")?;
                }
                write!(f, " @ {cpu_percent:.2}%")
            }
            Diagnostic::DeadlineMiss { misses, boundaries } => {
                write!(
                    f,
                    "buffer refill missed its deadline ({misses} of {boundaries} boundaries)"
                )
            }
            Diagnostic::RefillFailed { start_frame } => {
                write!(f, "refill at frame {start_frame} failed, playing silence")
            }
            Diagnostic::CaptureComplete { frames } => {
                write!(f, "capture complete after {frames} frames")
            }
        }
    }
}

/// Sending half of the diagnostics queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DiagnosticSender {
    tx: Sender<Diagnostic>,
    dropped: Arc<AtomicU64>,
}

impl DiagnosticSender {
    /// Queue an event without blocking. Returns `false` if it was dropped.
    #[inline]
    pub fn send(&self, event: Diagnostic) -> bool {
        if self.tx.try_send(event).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Events dropped because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Receiving half of the diagnostics queue.
#[derive(Debug)]
pub struct DiagnosticReceiver {
    rx: Receiver<Diagnostic>,
    dropped: Arc<AtomicU64>,
}

impl DiagnosticReceiver {
    /// Take every event currently queued.
    pub fn drain(&self) -> Vec<Diagnostic> {
        self.rx.try_iter().collect()
    }

    /// Block until the next event, or `None` once every sender is gone.
    pub fn recv(&self) -> Option<Diagnostic> {
        self.rx.recv().ok()
    }

    /// Events dropped on the sending side.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Create a bounded diagnostics queue.
pub fn diagnostic_channel(capacity: usize) -> (DiagnosticSender, DiagnosticReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        DiagnosticSender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        DiagnosticReceiver { rx, dropped },
    )
}

/// Log a single event at the level its kind calls for.
pub(crate) fn log_event(event: &Diagnostic) {
    match event {
        Diagnostic::Readout { .. } => tracing::info!("{event}"),
        Diagnostic::DeadlineMiss { misses, boundaries } => {
            tracing::warn!(misses, boundaries, "buffer refill missed its deadline");
        }
        Diagnostic::RefillFailed { start_frame } => {
            tracing::warn!(start_frame, "refill failed, chunk replaced with silence");
        }
        Diagnostic::CaptureComplete { frames } => {
            tracing::info!(frames, "capture complete");
        }
    }
}

/// Spawn the thread that turns queued events into `tracing` records.
///
/// The thread exits once every [`DiagnosticSender`] has been dropped and
/// returns the number of events it logged.
pub fn spawn_logger(receiver: DiagnosticReceiver) -> std::io::Result<JoinHandle<u64>> {
    std::thread::Builder::new()
        .name("resynth-diagnostics".to_string())
        .spawn(move || {
            let mut logged = 0;
            while let Some(event) = receiver.recv() {
                log_event(&event);
                logged += 1;
            }
            let dropped = receiver.dropped();
            if dropped > 0 {
                tracing::warn!(dropped, "diagnostic events dropped, queue was full");
            }
            logged
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readout_format() {
        let event = Diagnostic::readout([220.0, 440.126], 12.345);
        assert_eq!(event.to_string(), "220.00 440.13  @ 12.35%");
    }

    #[test]
    fn test_readout_truncates_channels() {
        let event = Diagnostic::readout((0..20).map(|i| i as f32), 0.0);
        match event {
            Diagnostic::Readout {
                channels,
                frequencies,
                omitted,
                ..
            } => {
                assert_eq!(channels, MAX_READOUT_CHANNELS);
                assert_eq!(omitted, 4);
                assert_eq!(frequencies[15], 15.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(event.to_string().ends_with("(+4 channels not shown)  @ 0.00%"));
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        let (tx, rx) = diagnostic_channel(2);
        assert!(tx.send(Diagnostic::RefillFailed { start_frame: 0 }));
        assert!(tx.send(Diagnostic::RefillFailed { start_frame: 1 }));
        assert!(!tx.send(Diagnostic::RefillFailed { start_frame: 2 }));
        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.dropped(), 1);
        assert_eq!(rx.drain().len(), 2);
    }

    #[test]
    fn test_logger_exits_when_senders_drop() {
        let (tx, rx) = diagnostic_channel(8);
        let handle = spawn_logger(rx).unwrap();
        tx.send(Diagnostic::CaptureComplete { frames: 10 });
        tx.send(Diagnostic::DeadlineMiss {
            misses: 1,
            boundaries: 3,
        });
        drop(tx);
        assert_eq!(handle.join().unwrap(), 2);
    }
}
