// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use bolero::{check, generator::*};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn test_stream() -> (Arc<Stream>, Arc<crate::testing::RecordingCallbacks>) {
    crate::testing::test_stream(7)
}

// ---- in-order read ----------------------------------------------------------

#[test]
fn scenario_in_order_read() {
    let (stream, _cb) = test_stream();
    stream
        .add_stream_frame(0, Bytes::from_static(b"hello"), false)
        .unwrap();
    stream
        .add_stream_frame(5, Bytes::from_static(b" world"), true)
        .unwrap();

    let mut buf = [0u8; 16];
    let outcome = stream.read(&mut buf).unwrap();
    assert_eq!(outcome.n, 11);
    assert!(outcome.end_of_stream);
    assert_eq!(&buf[..11], b"hello world");
}

// ---- out-of-order read --------------------------------------------------------

#[test]
fn scenario_out_of_order_read() {
    let (stream, _cb) = test_stream();
    stream
        .add_stream_frame(5, Bytes::from_static(b" world"), true)
        .unwrap();
    stream
        .add_stream_frame(0, Bytes::from_static(b"hello"), false)
        .unwrap();

    let mut buf = [0u8; 11];
    let outcome = stream.read(&mut buf).unwrap();
    assert_eq!(outcome.n, 11);
    assert!(outcome.end_of_stream);
    assert_eq!(&buf, b"hello world");
}

// ---- gap blocks, deadline fires -------------------------------------------------

#[test]
fn scenario_gap_blocks_until_deadline() {
    let (stream, _cb) = test_stream();
    stream
        .add_stream_frame(5, Bytes::from_static(b"world"), false)
        .unwrap();

    stream.set_read_deadline(Some(Instant::now() + Duration::from_millis(10)));

    let mut buf = [0u8; 16];
    let started = Instant::now();
    let err = stream.read(&mut buf).unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(10));
    assert!(err.is_timeout());
    assert!(err.is_temporary());
}

// ---- write drains through packetizer ---------------------------------------------

#[test]
fn scenario_write_drains_through_packetizer() {
    let (stream, _cb) = test_stream();

    let writer = {
        let stream = stream.clone();
        thread::spawn(move || stream.write(b"abcdef"))
    };

    // give the writer a moment to stage its buffer
    thread::sleep(Duration::from_millis(20));

    let (chunk, fin) = stream.get_data_for_writing(3);
    assert_eq!(&chunk[..], b"abc");
    assert!(!fin);

    let (chunk, fin) = stream.get_data_for_writing(10);
    assert_eq!(&chunk[..], b"def");
    assert!(!fin);

    let outcome = writer.join().unwrap();
    assert_eq!(outcome.n, 6);
    assert!(outcome.err.is_none());
    assert_eq!(stream.write_offset(), 6);
}

// ---- FIN after drain -------------------------------------------------------------

#[test]
fn scenario_fin_after_drain() {
    let (stream, _cb) = test_stream();

    let writer = {
        let stream = stream.clone();
        thread::spawn(move || stream.write(b"x"))
    };
    thread::sleep(Duration::from_millis(20));

    let (chunk, fin) = stream.get_data_for_writing(10);
    assert_eq!(&chunk[..], b"x");
    assert!(!fin);
    let outcome = writer.join().unwrap();
    assert_eq!(outcome.n, 1);

    stream.close();

    let (chunk, fin) = stream.get_data_for_writing(10);
    assert!(chunk.is_empty());
    assert!(fin);

    assert!(!stream.has_data_for_writing());
}

// ---- local reset mid-write -------------------------------------------------------

#[test]
fn scenario_local_reset_mid_write() {
    let (stream, cb) = test_stream();

    let writer = {
        let stream = stream.clone();
        thread::spawn(move || stream.write(b"longpayload"))
    };
    thread::sleep(Duration::from_millis(20));

    stream.reset(ResetCause(42));

    let outcome = writer.join().unwrap();
    assert_eq!(outcome.n, 0);
    assert!(matches!(outcome.err, Some(StreamError::LocalReset { .. })));

    assert_eq!(cb.resets.lock().as_slice(), &[(7, 0)]);

    let mut buf = [0u8; 4];
    let err = stream.read(&mut buf).unwrap_err();
    assert!(matches!(err, StreamError::LocalReset { .. }));
}

// ---- remote reset ----------------------------------------------------------------

#[test]
fn scenario_remote_reset() {
    let (stream, _cb) = test_stream();
    stream
        .add_stream_frame(0, Bytes::from_static(b"ab"), false)
        .unwrap();

    let writer = {
        let stream = stream.clone();
        thread::spawn(move || stream.write(b"more"))
    };
    thread::sleep(Duration::from_millis(20));

    stream.register_remote_error(ResetCause(9), 2).unwrap();

    let outcome = writer.join().unwrap();
    assert_eq!(outcome.n, 0);
    assert!(matches!(outcome.err, Some(StreamError::RemoteReset { .. })));
}

// ---- idempotence -------------------------------------------------------------

#[test]
fn reset_twice_is_equivalent_to_once() {
    let (stream, cb) = test_stream();
    stream.reset(ResetCause(1));
    stream.reset(ResetCause(2));
    assert_eq!(cb.resets.lock().len(), 1);
    assert!(matches!(
        stream.err.get(),
        Some(StreamError::LocalReset {
            cause: ResetCause(1)
        })
    ));
}

#[test]
fn register_remote_error_twice_is_equivalent_to_once() {
    let (stream, cb) = test_stream();
    stream.register_remote_error(ResetCause(1), 10).unwrap();
    stream.register_remote_error(ResetCause(2), 20).unwrap();
    assert_eq!(cb.resets.lock().len(), 1);
}

#[test]
fn close_twice_is_a_no_op() {
    let (stream, _cb) = test_stream();
    stream.close();
    stream.close();
    assert!(stream.context().is_cancelled());
}

#[test]
fn add_stream_frame_twice_is_identical_to_once() {
    let (stream, _cb) = test_stream();
    let frame = Bytes::from_static(b"hello");
    stream.add_stream_frame(0, frame.clone(), false).unwrap();
    stream.add_stream_frame(0, frame, false).unwrap();

    let mut buf = [0u8; 16];
    let outcome = stream.read(&mut buf).unwrap();
    assert_eq!(outcome.n, 5);
    assert_eq!(&buf[..5], b"hello");
}

// ---- quantified invariant: frames entirely below read-position are no-ops --

#[test]
fn frame_entirely_below_read_position_is_unobservable() {
    let (stream, _cb) = test_stream();
    stream
        .add_stream_frame(0, Bytes::from_static(b"ab"), false)
        .unwrap();
    let mut buf = [0u8; 2];
    stream.read(&mut buf).unwrap();

    // already delivered; this must be a silent no-op, not an error, and
    // must not hand the same bytes back again
    stream
        .add_stream_frame(0, Bytes::from_static(b"ab"), false)
        .unwrap();

    stream.set_read_deadline(Some(Instant::now() + Duration::from_millis(10)));
    let err = stream.read(&mut buf).unwrap_err();
    assert!(err.is_timeout());
}

// ---- quantified invariant: a FIN-at-offset-0-with-zero-bytes doesn't --------
// ---- preempt earlier undelivered bytes --------------------------------------

#[test]
fn fin_frame_does_not_preempt_earlier_undelivered_bytes() {
    let (stream, _cb) = test_stream();
    // FIN arrives first, declaring the final offset, before the data
    // that precedes it.
    stream.add_stream_frame(5, Bytes::new(), true).unwrap();

    let mut buf = [0u8; 1];
    stream.set_read_deadline(Some(Instant::now() + Duration::from_millis(10)));
    let err = stream.read(&mut buf).unwrap_err();
    assert!(err.is_timeout());

    stream.set_read_deadline(None);
    stream
        .add_stream_frame(0, Bytes::from_static(b"hello"), false)
        .unwrap();
    let mut buf = [0u8; 5];
    let outcome = stream.read(&mut buf).unwrap();
    assert_eq!(outcome.n, 5);
    assert!(outcome.end_of_stream);
}

// ---- property: write/packetizer interleavings preserve order and total -----

/// Drives `get_data_for_writing` with an arbitrary, possibly very
/// uneven, sequence of pull sizes against a single in-flight `Write`,
/// and checks that the bytes the packetizer sees are the write's bytes,
/// in order, with no gaps or duplicates.
#[test]
#[cfg_attr(miri, ignore)]
fn model_write_packetizer_interleaving() {
    check!()
        .with_type::<Vec<u8>>()
        .for_each(|pull_sizes| {
            let (stream, _cb) = test_stream();
            let payload = b"the quick brown fox jumps over the lazy dog".to_vec();

            let writer = {
                let stream = stream.clone();
                let payload = payload.clone();
                thread::spawn(move || stream.write(&payload))
            };

            thread::sleep(Duration::from_millis(5));

            let mut received = Vec::new();
            let mut idx = 0usize;
            loop {
                let max = if pull_sizes.is_empty() {
                    4
                } else {
                    (pull_sizes[idx % pull_sizes.len()] as usize % 8) + 1
                };
                idx += 1;

                let (chunk, fin) = stream.get_data_for_writing(max);
                received.extend_from_slice(&chunk);

                if fin {
                    break;
                }
                if received.len() >= payload.len() && chunk.is_empty() {
                    break;
                }
                if idx > 10_000 {
                    panic!("packetizer loop did not converge");
                }
            }

            let outcome = writer.join().unwrap();
            assert_eq!(received, payload);
            assert_eq!(outcome.n, payload.len());
            assert_eq!(stream.write_offset(), payload.len() as u64);
        })
}
