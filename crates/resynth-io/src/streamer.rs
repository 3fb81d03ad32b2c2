//! Double-buffered file streamer.
//!
//! Two [`ChunkBuffer`]s of `buffer_len` frames take turns: the audio thread
//! reads the active one while a worker thread loads the next chunk into the
//! other. Buffers change hands by moving a `Box` over bounded channels, so a
//! buffer is only ever owned by one side and the audio thread never waits on
//! disk I/O.
//!
//! ```text
//!   audio thread                       resynth-refill worker
//!   ────────────                       ─────────────────────
//!   advance() ── boundary ──► try_send(RefillRequest { start, buffer })
//!       ▲                                  │ fill_chunk()
//!       └───────── try_recv() ◄────────────┘
//! ```
//!
//! If the next buffer is not back when the active one runs out, that is a
//! deadline miss: the stale buffer plays again and the late one is picked up
//! at the following boundary.

use crate::diagnostics::{Diagnostic, DiagnosticSender};
use crate::source::{ChunkBuffer, ChunkSource, WavChunkSource, fill_chunk};
use crate::{Error, Result};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::path::Path;
use std::thread::JoinHandle;

/// What [`Streamer::advance`] does when the active buffer runs out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SwapPolicy {
    /// Never block: a buffer that is not ready is a deadline miss.
    #[default]
    RealTime,
    /// Block until the refill completes. For offline rendering, where there
    /// is no deadline and output must not depend on disk speed.
    WaitForRefill,
}

/// Outcome of one [`Streamer::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the next frame of the active buffer.
    Continue,
    /// Crossed a boundary and swapped in the refilled buffer.
    Swapped,
    /// Crossed a boundary but the refill was late; replaying the stale buffer.
    DeadlineMiss,
}

/// Counters kept by a [`Streamer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamerStats {
    /// Buffer boundaries crossed, whether or not a swap happened.
    pub boundaries: u64,
    /// Boundaries where the refilled buffer was swapped in.
    pub swaps: u64,
    /// Boundaries where the refilled buffer was not ready.
    pub deadline_misses: u64,
    /// Chunks that failed to load and were replaced by silence.
    pub refill_failures: u64,
}

struct RefillRequest {
    start: u64,
    buffer: Box<ChunkBuffer>,
}

/// Streams a multi-channel source in fixed-size chunks, looping at the end.
pub struct Streamer {
    active: Box<ChunkBuffer>,
    /// Frame of `active` exposed by `current_sample`
    position: usize,
    /// Frame the next `advance` moves to; `buffer_len` means a swap is due
    next: usize,
    buffer_len: usize,
    channels: usize,
    total_frames: u64,
    sample_rate: u32,
    /// Start frame of the most recently requested chunk
    file_cursor: u64,
    policy: SwapPolicy,
    stats: StreamerStats,
    diagnostics: Option<DiagnosticSender>,
    requests: Option<Sender<RefillRequest>>,
    completed: Receiver<Box<ChunkBuffer>>,
    worker: Option<JoinHandle<()>>,
}

impl Streamer {
    /// Open a WAV file for streaming in chunks of `buffer_len` frames.
    ///
    /// Fails with [`Error::FileTooShort`] unless the file is longer than one
    /// chunk.
    pub fn open<P: AsRef<Path>>(path: P, buffer_len: usize) -> Result<Self> {
        let path = path.as_ref();
        let source = WavChunkSource::open(path)?;
        let streamer = Self::with_source(source, buffer_len)?;
        tracing::info!(
            path = %path.display(),
            frames = streamer.total_frames,
            channels = streamer.channels,
            buffer_len,
            "streaming file"
        );
        Ok(streamer)
    }

    /// Stream from any [`ChunkSource`].
    ///
    /// Loads the first chunk synchronously, then hands the second buffer to
    /// the refill worker.
    pub fn with_source<S: ChunkSource + 'static>(mut source: S, buffer_len: usize) -> Result<Self> {
        let channels = source.channels();
        let total_frames = source.total_frames();
        if channels == 0 || total_frames == 0 {
            return Err(Error::EmptyFile);
        }
        if buffer_len == 0 || total_frames <= buffer_len as u64 {
            return Err(Error::FileTooShort {
                frames: total_frames,
                buffer_len,
            });
        }
        let sample_rate = source.sample_rate();

        let mut active = Box::new(ChunkBuffer::new(channels, buffer_len));
        fill_chunk(&mut source, 0, &mut active)?;
        let spare = Box::new(ChunkBuffer::new(channels, buffer_len));

        let (request_tx, request_rx) = bounded::<RefillRequest>(2);
        let (completed_tx, completed_rx) = bounded::<Box<ChunkBuffer>>(2);

        let worker = std::thread::Builder::new()
            .name("resynth-refill".to_string())
            .spawn(move || refill_worker(source, &request_rx, &completed_tx))
            .map_err(Error::WorkerSpawn)?;

        let mut streamer = Self {
            active,
            position: 0,
            next: 0,
            buffer_len,
            channels,
            total_frames,
            sample_rate,
            file_cursor: 0,
            policy: SwapPolicy::default(),
            stats: StreamerStats::default(),
            diagnostics: None,
            requests: Some(request_tx),
            completed: completed_rx,
            worker: Some(worker),
        };
        streamer.request_refill(spare);
        Ok(streamer)
    }

    /// Set the swap policy.
    pub fn with_policy(mut self, policy: SwapPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report deadline misses and failed refills on `sender`.
    pub fn with_diagnostics(mut self, sender: DiagnosticSender) -> Self {
        self.diagnostics = Some(sender);
        self
    }

    /// Move to the next frame. Called once per frame on the audio thread.
    #[inline]
    pub fn advance(&mut self) -> Advance {
        if self.next < self.buffer_len {
            self.position = self.next;
            self.next += 1;
            return Advance::Continue;
        }

        self.position = 0;
        self.next = 1;
        self.stats.boundaries += 1;

        let ready = match self.policy {
            SwapPolicy::RealTime => self.completed.try_recv().ok(),
            SwapPolicy::WaitForRefill => self.completed.recv().ok(),
        };

        match ready {
            Some(buffer) => {
                let exhausted = std::mem::replace(&mut self.active, buffer);
                self.stats.swaps += 1;
                if self.active.is_failed() {
                    self.stats.refill_failures += 1;
                    self.report(Diagnostic::RefillFailed {
                        start_frame: self.active.start_frame(),
                    });
                }
                self.request_refill(exhausted);
                Advance::Swapped
            }
            None => {
                self.stats.deadline_misses += 1;
                self.report(Diagnostic::DeadlineMiss {
                    misses: self.stats.deadline_misses,
                    boundaries: self.stats.boundaries,
                });
                Advance::DeadlineMiss
            }
        }
    }

    /// Sample at the current frame. `channel` wraps modulo the source's
    /// channel count.
    #[inline]
    pub fn current_sample(&self, channel: usize) -> f32 {
        self.active.sample(channel % self.channels, self.position)
    }

    /// Source channel count.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frames per chunk.
    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// Source length in frames.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Source sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frame offset within the active buffer, always in `[0, buffer_len)`.
    pub fn read_position(&self) -> usize {
        self.position
    }

    /// Source frame at the current position (padding frames report past-the-end
    /// positions).
    pub fn file_position(&self) -> u64 {
        self.active.start_frame() + self.position as u64
    }

    /// The buffer currently being read.
    pub fn active_buffer(&self) -> &ChunkBuffer {
        &self.active
    }

    /// Swap, miss and failure counters.
    pub fn stats(&self) -> StreamerStats {
        self.stats
    }

    /// Swap policy in use.
    pub fn policy(&self) -> SwapPolicy {
        self.policy
    }

    fn next_chunk_start(&self, cursor: u64) -> u64 {
        let next = cursor + self.buffer_len as u64;
        if next >= self.total_frames { 0 } else { next }
    }

    fn request_refill(&mut self, buffer: Box<ChunkBuffer>) {
        self.file_cursor = self.next_chunk_start(self.file_cursor);
        let request = RefillRequest {
            start: self.file_cursor,
            buffer,
        };
        let sent = self
            .requests
            .as_ref()
            .is_some_and(|tx| tx.try_send(request).is_ok());
        if !sent {
            self.stats.refill_failures += 1;
            self.report(Diagnostic::RefillFailed {
                start_frame: self.file_cursor,
            });
        }
    }

    #[inline]
    fn report(&self, event: Diagnostic) {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.send(event);
        }
    }
}

impl Drop for Streamer {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.requests.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::error!("refill worker panicked");
        }
    }
}

impl std::fmt::Debug for Streamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Streamer")
            .field("channels", &self.channels)
            .field("buffer_len", &self.buffer_len)
            .field("total_frames", &self.total_frames)
            .field("position", &self.position)
            .field("policy", &self.policy)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn refill_worker<S: ChunkSource>(
    mut source: S,
    requests: &Receiver<RefillRequest>,
    completed: &Sender<Box<ChunkBuffer>>,
) {
    for RefillRequest { start, mut buffer } in requests {
        if let Err(e) = fill_chunk(&mut source, start, &mut buffer) {
            tracing::warn!(start, error = %e, "refill read failed");
            buffer.mark_failed(start);
        }
        if completed.send(buffer).is_err() {
            break;
        }
    }
    tracing::debug!("refill worker exiting");
}
