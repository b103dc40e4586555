// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Test-only plumbing shared across this crate's test modules: frame/data
//! generators and an in-memory session stand-in, mirroring the teacher's
//! `stream::tests::test_environment` so individual test modules don't each
//! reinvent a `Stream` + flow controller + callbacks harness.

#![cfg(test)]

use crate::flow_control::Credit;
use crate::stream::{Stream, StreamCallbacks, StreamConfig};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

/// Routes `tracing` output from the state machine to the test harness's
/// captured output, so a failing test shows the state transitions and
/// frame admissions that led up to it. Safe to call at the top of every
/// test; only the first call takes effect.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    static TRACING: Once = Once::new();
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
            .with_test_writer()
            .compact()
            .init();
    });
}

#[cfg(not(feature = "tracing"))]
pub fn init_tracing() {}

/// Generates identifiable test data: the byte at a given stream offset is
/// always the same value, regardless of how it's chunked into frames, so
/// reassembly tests can validate received bytes without carrying the
/// original payload around.
pub fn pattern_bytes(offset: u64, len: usize) -> Bytes {
    let v: Vec<u8> = (0..len).map(|i| ((offset + i as u64) % 251) as u8).collect();
    Bytes::from(v)
}

/// A [`StreamCallbacks`] that records every invocation, for tests that
/// need to assert on when and how often the stream asked for attention.
#[derive(Default)]
pub struct RecordingCallbacks {
    pub on_data_calls: AtomicUsize,
    pub resets: Mutex<Vec<(u64, u64)>>,
}

impl StreamCallbacks for RecordingCallbacks {
    fn on_data(&self) {
        self.on_data_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn on_reset(&self, stream_id: u64, final_write_offset: u64) {
        self.resets.lock().push((stream_id, final_write_offset));
    }
}

/// Builds a [`Stream`] wired to a fresh [`Credit`] flow controller
/// constructed from `config`'s windows, and a [`RecordingCallbacks`] the
/// caller can inspect afterward. This is the stand-in for the session
/// multiplexer that owns the real flow controller and callback wiring in
/// a full deployment.
pub fn test_environment(config: StreamConfig) -> (Arc<Stream>, Arc<RecordingCallbacks>) {
    init_tracing();
    let callbacks = Arc::new(RecordingCallbacks::default());
    let flow_controller = Arc::new(Credit::new(
        config.initial_receive_window,
        config.initial_send_window,
    ));
    let stream = Arc::new(Stream::new(config, flow_controller, callbacks.clone()));
    (stream, callbacks)
}

/// [`test_environment`] with an otherwise-default [`StreamConfig`] for
/// `stream_id`.
pub fn test_stream(stream_id: u64) -> (Arc<Stream>, Arc<RecordingCallbacks>) {
    test_environment(StreamConfig::new(stream_id))
}
