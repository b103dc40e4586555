// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A single stream of a multiplexed, QUIC-like transport: a blocking
//! reader and writer layered over an unordered, offset-addressed frame
//! channel, plus the packetizer contract a session multiplexer drives
//! from its own thread.
//!
//! The session (stream map, frame routing, congestion control, the wire
//! codec) is out of scope here; this crate only implements the
//! single-stream state machine and its companion frame sorter.

pub mod cancellation;
pub mod error;
pub mod flow_control;
pub mod signal;
pub mod sorter;
pub mod state;
pub mod stream;
#[cfg(test)]
pub mod testing;

pub use cancellation::CancellationToken;
pub use error::{ResetCause, StreamError};
pub use stream::{Stream, StreamConfig};
