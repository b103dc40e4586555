// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The flow-control contract a stream consumes, plus a reference
//! implementation.
//!
//! The session multiplexer owns the authoritative flow controller in a
//! full deployment; this crate only needs the narrow contract in
//! [`FlowController`]. [`Credit`] is a standalone implementation of that
//! contract, a pure byte-counting accountant with no RTT or congestion
//! modeling, so the stream state machine can be exercised (and used)
//! without wiring up a session.

use parking_lot::Mutex;

/// The subset of flow control a stream needs from its session.
pub trait FlowController: Send + Sync {
    /// Tells the controller the highest offset (and whether it is final)
    /// observed on the receive side so far. Returns an error if this
    /// contradicts a previously reported final offset.
    fn update_highest_received(&self, offset: u64, is_fin: bool) -> Result<(), String>;

    /// Credits `n` bytes read by the application back to the receive
    /// window, potentially unblocking a future `get_window_update`.
    fn add_bytes_read(&self, n: u64);

    /// Debits `n` bytes handed to the packetizer from the send window.
    fn add_bytes_sent(&self, n: u64);

    /// Remaining bytes the stream may hand to the packetizer right now.
    fn send_window_size(&self) -> u64;

    /// Applies a peer-advertised increase to the send window.
    fn update_send_window(&self, n: u64);

    /// True when the send window is currently exhausted.
    fn is_blocked(&self) -> bool;

    /// Returns a new receive-window limit to advertise to the peer, if
    /// one should be sent (i.e. consumption has freed up enough credit
    /// to be worth announcing), clearing the pending amount.
    fn get_window_update(&self) -> Option<u64>;
}

#[derive(Debug, Default)]
struct State {
    highest_received: u64,
    final_offset: Option<u64>,
    bytes_read: u64,
    receive_window: u64,
    send_window: u64,
    bytes_sent: u64,
    pending_window_update: bool,
}

/// A plain byte-counting flow controller: two independent windows (send,
/// receive), each simply debited and credited as bytes move. No attempt
/// is made to model round-trip time or congestion; callers that need
/// that belong one layer up, in the session.
#[derive(Debug)]
pub struct Credit {
    state: Mutex<State>,
}

impl Credit {
    pub fn new(initial_receive_window: u64, initial_send_window: u64) -> Self {
        Self {
            state: Mutex::new(State {
                receive_window: initial_receive_window,
                send_window: initial_send_window,
                ..Default::default()
            }),
        }
    }
}

impl FlowController for Credit {
    fn update_highest_received(&self, offset: u64, is_fin: bool) -> Result<(), String> {
        let mut state = self.state.lock();

        if let Some(final_offset) = state.final_offset {
            if offset > final_offset || (is_fin && offset != final_offset) {
                return Err(format!(
                    "stream final size changed from {final_offset} to {offset}"
                ));
            }
        }

        if offset > state.highest_received {
            state.highest_received = offset;
        }

        if is_fin {
            state.final_offset = Some(offset);
        }

        Ok(())
    }

    fn add_bytes_read(&self, n: u64) {
        let mut state = self.state.lock();
        state.bytes_read += n;
        state.receive_window += n;
        state.pending_window_update = true;
    }

    fn add_bytes_sent(&self, n: u64) {
        let mut state = self.state.lock();
        state.bytes_sent += n;
        state.send_window = state.send_window.saturating_sub(n);
    }

    fn send_window_size(&self) -> u64 {
        self.state.lock().send_window
    }

    fn update_send_window(&self, n: u64) {
        let mut state = self.state.lock();
        if n > state.send_window {
            state.send_window = n;
        }
    }

    fn is_blocked(&self) -> bool {
        self.state.lock().send_window == 0
    }

    fn get_window_update(&self) -> Option<u64> {
        let mut state = self.state.lock();
        if state.pending_window_update {
            state.pending_window_update = false;
            Some(state.receive_window)
        } else {
            None
        }
    }
}
