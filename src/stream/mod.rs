// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The per-stream endpoint: reassembly-backed reader, flow-controlled
//! writer, and the packetizer contract the session drives from a
//! different thread.

mod config;
mod io;
mod receiver;
mod sender;
#[cfg(test)]
mod tests;

pub use config::StreamConfig;
pub use io::{StreamReader, StreamWriter};
pub use receiver::Receiver;
pub use sender::Sender;

use crate::cancellation::CancellationToken;
use crate::error::{ResetCause, StreamError};
use crate::flow_control::FlowController;
use crate::signal::{Signal, Wait};
use crate::sorter::{Frame, Sorter};

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

/// Callbacks the session implements to learn when a stream wants
/// attention. Invoked without the stream mutex held, except from
/// [`Stream::reset`], which holds it across `on_reset` (see the
/// concurrency model's documented exception).
pub trait StreamCallbacks: Send + Sync {
    /// "You may poll me now" — the packetizer should call
    /// [`Stream::get_data_for_writing`] when convenient.
    fn on_data(&self) {}

    /// "Send RST at this offset" — invoked at most once per stream.
    fn on_reset(&self, _stream_id: u64, _final_write_offset: u64) {}
}

/// A [`StreamCallbacks`] that does nothing; useful for standalone use
/// and tests that don't need to observe session-facing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl StreamCallbacks for NoopCallbacks {}

/// The result of [`Stream::read`]: a byte count, optionally paired with
/// the end-of-stream marker (both can be true in the same call, when the
/// frame carrying the last bytes also carries FIN). Any other terminal
/// condition is reported through `Err` instead, never paired with `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    pub n: usize,
    pub end_of_stream: bool,
}

/// The result of [`Stream::write`]. Unlike `Read`, a terminal error can
/// be reported alongside a non-zero `n` (bytes already drained before
/// the stream turned terminal), so this is a plain struct rather than a
/// `Result`.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub n: usize,
    pub err: Option<StreamError>,
}

#[derive(Debug, Default)]
struct Deadlines {
    read: Option<Instant>,
    write: Option<Instant>,
}

struct Inner {
    sorter: Sorter,
    receiver: Receiver,
    sender: Sender,
    read_offset: u64,
    read_pos_in_frame: usize,
    write_offset: u64,
    staging: Option<Bytes>,
    deadlines: Deadlines,
}

/// A single multiplexed stream.
///
/// All mutable state lives behind one mutex, except the latches that
/// cross-cut both the read and write side (`cancelled`, `reset-locally`,
/// `reset-remotely`, `rst-sent`), which are atomics read without
/// blocking on the mutex. `finished-reading`, `finished-writing`, and
/// `fin-sent` are folded into [`Receiver`] and [`Sender`] instead of
/// being separate booleans, see their modules.
pub struct Stream {
    config: StreamConfig,
    flow_controller: Arc<dyn FlowController>,
    callbacks: Arc<dyn StreamCallbacks>,
    ctx: CancellationToken,
    read_signal: Signal,
    write_signal: Signal,
    inner: Mutex<Inner>,
    cancelled: AtomicBool,
    reset_locally: AtomicBool,
    reset_remotely: AtomicBool,
    rst_sent: AtomicBool,
    err: OnceCell<StreamError>,
}

impl Stream {
    pub fn new(
        config: StreamConfig,
        flow_controller: Arc<dyn FlowController>,
        callbacks: Arc<dyn StreamCallbacks>,
    ) -> Self {
        let mut sorter = Sorter::new();
        sorter.set_read_position(config.initial_read_offset);

        Self {
            inner: Mutex::new(Inner {
                sorter,
                receiver: Receiver::default(),
                sender: Sender::default(),
                read_offset: config.initial_read_offset,
                read_pos_in_frame: 0,
                write_offset: 0,
                staging: None,
                deadlines: Deadlines::default(),
            }),
            flow_controller,
            callbacks,
            ctx: CancellationToken::new(),
            read_signal: Signal::new(),
            write_signal: Signal::new(),
            cancelled: AtomicBool::new(false),
            reset_locally: AtomicBool::new(false),
            reset_remotely: AtomicBool::new(false),
            rst_sent: AtomicBool::new(false),
            err: OnceCell::new(),
            config,
        }
    }

    #[inline]
    pub fn stream_id(&self) -> u64 {
        self.config.stream_id
    }

    #[inline]
    pub fn context(&self) -> &CancellationToken {
        &self.ctx
    }

    fn latch_err(&self, err: StreamError) {
        let _ = self.err.set(err);
    }

    fn current_err(&self) -> StreamError {
        self.err.get().cloned().unwrap_or(StreamError::EndOfStream)
    }

    // ---- application-facing: read path ----------------------------------

    /// Blocking read. Single-reader; concurrent callers are undefined
    /// behavior at the application level (the mutex keeps it memory-safe,
    /// but interleaved bytes would result).
    pub fn read(&self, buf: &mut [u8]) -> Result<ReadOutcome, StreamError> {
        if buf.is_empty() {
            return Ok(ReadOutcome {
                n: 0,
                end_of_stream: false,
            });
        }

        let mut copied = 0usize;

        loop {
            let mut inner = self.inner.lock();

            if copied == 0 {
                if self.cancelled.load(Ordering::Acquire) || self.reset_locally.load(Ordering::Acquire)
                {
                    return Err(self.current_err());
                }
                if inner.receiver.is_finished() {
                    return Err(StreamError::EndOfStream);
                }
            }

            if let Some(frame) = inner.sorter.head().cloned() {
                let pos = inner.read_pos_in_frame;
                let available = frame.data.len() - pos;
                let want = buf.len() - copied;
                let n = available.min(want);

                buf[copied..copied + n].copy_from_slice(&frame.data[pos..pos + n]);
                copied += n;
                inner.read_offset += n as u64;
                inner.read_pos_in_frame += n;

                let frame_exhausted = inner.read_pos_in_frame == frame.data.len();
                if frame_exhausted {
                    inner.sorter.pop();
                    inner.read_pos_in_frame = 0;
                }

                let reset_remotely = self.reset_remotely.load(Ordering::Acquire);

                if frame_exhausted && frame.fin {
                    let _ = inner.receiver.on_finish();
                }

                drop(inner);

                #[cfg(feature = "tracing")]
                tracing::debug!(stream_id = self.config.stream_id, n, "read bytes from stream");

                if n > 0 && !reset_remotely {
                    self.flow_controller.add_bytes_read(n as u64);
                    self.callbacks.on_data();
                }

                if frame_exhausted && frame.fin {
                    return Ok(ReadOutcome {
                        n: copied,
                        end_of_stream: true,
                    });
                }

                if copied == buf.len() {
                    return Ok(ReadOutcome {
                        n: copied,
                        end_of_stream: false,
                    });
                }

                continue;
            }

            // no head frame available right now
            if copied > 0 {
                return Ok(ReadOutcome {
                    n: copied,
                    end_of_stream: false,
                });
            }

            let gen = self.read_signal.generation();
            let deadline = inner.deadlines.read;
            drop(inner);

            match self.read_signal.wait_from(gen, deadline) {
                Wait::TimedOut => return Err(StreamError::DeadlineExceeded),
                Wait::Notified => {
                    if self.cancelled.load(Ordering::Acquire)
                        || self.reset_locally.load(Ordering::Acquire)
                    {
                        return Err(self.current_err());
                    }
                    continue;
                }
            }
        }
    }

    // ---- application-facing: write path ----------------------------------

    /// Blocking write. Single-writer; a concurrent second `Write` before
    /// the first drains is undefined behavior at the application level.
    ///
    /// A `buf` larger than `max_staging_buffer_size` is written in
    /// successive chunks, each staged and drained in turn, so a single
    /// enormous write can't stage an unbounded amount of memory. The
    /// first chunk that ends in an error stops the loop, reporting the
    /// total bytes staged across every earlier chunk plus that one.
    pub fn write(&self, buf: &[u8]) -> WriteOutcome {
        let chunk_size = self.config.max_staging_buffer_size.max(1);
        if buf.len() <= chunk_size {
            return self.write_chunk(buf);
        }

        let mut total = 0;
        for chunk in buf.chunks(chunk_size) {
            let outcome = self.write_chunk(chunk);
            total += outcome.n;
            if outcome.err.is_some() {
                return WriteOutcome {
                    n: total,
                    err: outcome.err,
                };
            }
        }
        WriteOutcome { n: total, err: None }
    }

    fn write_chunk(&self, buf: &[u8]) -> WriteOutcome {
        if self.reset_locally.load(Ordering::Acquire) || self.err.get().is_some() {
            return WriteOutcome {
                n: 0,
                err: Some(self.current_err()),
            };
        }

        {
            let inner = self.inner.lock();
            if inner.sender.is_finished_writing() {
                return WriteOutcome {
                    n: 0,
                    err: Some(StreamError::WriteAfterClose),
                };
            }
        }

        if buf.is_empty() {
            return WriteOutcome { n: 0, err: None };
        }

        {
            let mut inner = self.inner.lock();
            debug_assert!(inner.staging.is_none(), "concurrent Write is undefined");
            inner.staging = Some(Bytes::copy_from_slice(buf));
        }
        self.callbacks.on_data();

        loop {
            let inner = self.inner.lock();

            if inner.staging.is_none() {
                return WriteOutcome {
                    n: buf.len(),
                    err: None,
                };
            }

            if let Some(err) = self.err.get() {
                let remaining = inner.staging.as_ref().map(|s| s.len()).unwrap_or(0);
                return WriteOutcome {
                    n: buf.len() - remaining,
                    err: Some(err.clone()),
                };
            }

            let gen = self.write_signal.generation();
            let deadline = inner.deadlines.write;
            drop(inner);

            match self.write_signal.wait_from(gen, deadline) {
                Wait::TimedOut => {
                    return WriteOutcome {
                        n: 0,
                        err: Some(StreamError::DeadlineExceeded),
                    }
                }
                Wait::Notified => continue,
            }
        }
    }

    // ---- application-facing: control -------------------------------------

    /// Half-closes the write side. Idempotent; the second call is a
    /// harmless re-signal.
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock();
            let _ = inner.sender.on_close();
        }
        self.ctx.cancel();
        self.callbacks.on_data();
    }

    /// Session-initiated abort: both sides return `err`.
    pub fn cancel(&self, cause: ResetCause) {
        self.latch_err(StreamError::Cancelled { cause });
        self.cancelled.store(true, Ordering::Release);
        self.ctx.cancel();
        self.read_signal.notify();
        self.write_signal.notify();
    }

    /// Application-initiated local abort. Idempotent on `reset-locally`.
    pub fn reset(&self, cause: ResetCause) {
        self.latch_err(StreamError::LocalReset { cause });
        if self.reset_locally.swap(true, Ordering::AcqRel) {
            return;
        }
        self.ctx.cancel();
        self.read_signal.notify();
        self.write_signal.notify();

        if self.should_send_reset() {
            // the mutex is deliberately held across `on_reset`, per the
            // one documented exception to the no-callbacks-under-lock rule.
            let inner = self.inner.lock();
            self.callbacks.on_reset(self.config.stream_id, inner.write_offset);
        }
    }

    /// The peer sent RST. Idempotent on `reset-remotely`. Reads may
    /// still drain queued bytes up to `final_offset`; only the writer is
    /// signaled immediately.
    pub fn register_remote_error(
        &self,
        cause: ResetCause,
        final_offset: u64,
    ) -> Result<(), StreamError> {
        self.latch_err(StreamError::RemoteReset { cause });
        if self.reset_remotely.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.ctx.cancel();

        let result = self
            .flow_controller
            .update_highest_received(final_offset, true)
            .map_err(StreamError::FlowControlViolation);

        self.write_signal.notify();

        if self.should_send_reset() {
            let write_offset = self.inner.lock().write_offset;
            self.callbacks.on_reset(self.config.stream_id, write_offset);
        }

        result
    }

    /// Synthesizes a zero-length FIN frame at `offset`; used by the
    /// session when it knows end-of-stream without a real frame.
    pub fn close_remote(&self, offset: u64) {
        let _ = self.add_stream_frame(offset, Bytes::new(), true);
    }

    /// Decides whether the caller is the one that gets to invoke
    /// `on_reset`, and atomically claims that right if so. `rst_sent`
    /// is only ever set here, via a single compare-exchange, so a
    /// concurrent `reset()`/`register_remote_error()` race can't both
    /// win and both call back into the session.
    fn should_send_reset(&self) -> bool {
        if self.rst_sent.load(Ordering::Acquire) {
            return false;
        }
        let any_reset =
            self.reset_locally.load(Ordering::Acquire) || self.reset_remotely.load(Ordering::Acquire);
        if !any_reset {
            return false;
        }
        if self.inner.lock().sender.is_closed() {
            return false;
        }
        self.rst_sent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// True when the stream has no further obligations and the session
    /// may remove it from the stream map.
    pub fn is_finished(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }

        let inner = self.inner.lock();
        let finished_reading = inner.receiver.is_finished();
        let finished_writing_fin_sent = inner.sender.is_closed();
        drop(inner);

        let rst_sent = self.rst_sent.load(Ordering::Acquire);
        let reset_remotely = self.reset_remotely.load(Ordering::Acquire);

        (finished_reading && finished_writing_fin_sent)
            || (reset_remotely && rst_sent)
            || (finished_reading && rst_sent)
            || (finished_writing_fin_sent && reset_remotely)
    }

    // ---- application-facing: deadlines -------------------------------------

    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        let mut inner = self.inner.lock();
        let should_signal = deadline_moved_earlier(deadline, inner.deadlines.read);
        inner.deadlines.read = deadline;
        drop(inner);
        if should_signal {
            self.read_signal.notify();
        }
    }

    pub fn set_write_deadline(&self, deadline: Option<Instant>) {
        let mut inner = self.inner.lock();
        let should_signal = deadline_moved_earlier(deadline, inner.deadlines.write);
        inner.deadlines.write = deadline;
        drop(inner);
        if should_signal {
            self.write_signal.notify();
        }
    }

    pub fn set_deadline(&self, deadline: Option<Instant>) {
        self.set_read_deadline(deadline);
        self.set_write_deadline(deadline);
    }

    // ---- session-facing: packetizer contract -------------------------------

    /// `true` iff there is anything for the packetizer to pull right now.
    pub fn has_data_for_writing(&self) -> bool {
        if self.err.get().is_some() {
            return false;
        }
        let inner = self.inner.lock();
        let staging_nonempty = inner.staging.as_ref().map(|s| !s.is_empty()).unwrap_or(false);
        staging_nonempty || (inner.sender.is_finished_writing() && !inner.sender.is_closed())
    }

    /// Pulls up to `max` bytes for the packetizer, clamped by the flow
    /// controller's send window. Returns the chunk and whether it should
    /// be sent with FIN set.
    pub fn get_data_for_writing(&self, max: usize) -> (Bytes, bool) {
        let mut inner = self.inner.lock();

        if self.err.get().is_some() {
            let send_fin = inner.sender.is_finished_writing() && !inner.sender.is_closed();
            if send_fin {
                let _ = inner.sender.on_send_fin();
            }
            return (Bytes::new(), send_fin);
        }

        let staging_empty = inner.staging.as_ref().map(|s| s.is_empty()).unwrap_or(true);
        if staging_empty {
            let send_fin = inner.sender.is_finished_writing() && !inner.sender.is_closed();
            if send_fin {
                let _ = inner.sender.on_send_fin();
            }
            return (Bytes::new(), send_fin);
        }

        let max = if self.config.is_crypto_stream {
            max
        } else {
            max.min(self.flow_controller.send_window_size() as usize)
        };

        if max == 0 {
            return (Bytes::new(), false);
        }

        let staging = inner.staging.take().expect("checked non-empty above");
        let take = max.min(staging.len());
        let chunk = staging.slice(0..take);
        let remainder = staging.slice(take..);
        let exhausted = remainder.is_empty();
        inner.staging = if exhausted { None } else { Some(remainder) };
        inner.write_offset += take as u64;

        let send_fin = exhausted && inner.sender.is_finished_writing() && !inner.sender.is_closed();
        if send_fin {
            let _ = inner.sender.on_send_fin();
        }

        drop(inner);

        if exhausted {
            self.write_signal.notify();
        }
        self.flow_controller.add_bytes_sent(take as u64);

        (chunk, send_fin)
    }

    pub fn write_offset(&self) -> u64 {
        self.inner.lock().write_offset
    }

    pub fn update_send_window(&self, n: u64) {
        self.flow_controller.update_send_window(n);
    }

    pub fn is_flow_control_blocked(&self) -> bool {
        self.flow_controller.is_blocked()
    }

    pub fn get_window_update(&self) -> Option<u64> {
        self.flow_controller.get_window_update()
    }

    /// Inbound path: pushes a frame into the sorter and wakes the reader.
    pub fn add_stream_frame(&self, offset: u64, data: Bytes, fin: bool) -> Result<(), StreamError> {
        let end = offset + data.len() as u64;
        self.flow_controller
            .update_highest_received(end, fin)
            .map_err(StreamError::FlowControlViolation)?;

        let mut inner = self.inner.lock();
        let result = inner.sorter.push(Frame::new(offset, data, fin));
        drop(inner);

        result.map_err(StreamError::from)?;
        self.read_signal.notify();
        Ok(())
    }
}

fn deadline_moved_earlier(new: Option<Instant>, old: Option<Instant>) -> bool {
    match (new, old) {
        (Some(new), Some(old)) => new < old,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
