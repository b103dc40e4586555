// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::state::{event, is};

//#        o
//#       | construct stream
//#       v
//#   +-------+  App calls Close   +---------+  packetizer confirms  +--------+
//#   | Open  |------------------->| Closing |---------------------->| Closed |
//#   +-------+                    +---------+   send-fin == true    +--------+
//#
//# collapsed relative to a full QUIC stack's Sender: this port tracks no
//# acks, so there is no DataRecvd/ResetRecvd pair — `finished-writing`
//# and `fin-sent` are exactly this enum's Closing and Closed states.
//# Reset is cross-cutting (it can latch from any of these states, and
//# independently of them) and is tracked separately as plain atomics on
//# `Stream`, not folded into this machine; see DESIGN.md.

/// The write-side half of a stream's latched state: `finished-writing`
/// (app called [`crate::stream::Stream::close`]) and `fin-sent`
/// (packetizer confirmed FIN is on the wire), as a two-step transition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Sender {
    #[default]
    Open,
    Closing,
    Closed,
}

impl Sender {
    is!(is_open, Open);
    is!(is_closing, Closing);
    is!(is_closed, Closed);
    is!(is_finished_writing, Closing | Closed);

    event! {
        on_close(Open => Closing);
        on_send_fin(Closing => Closed);
    }
}
