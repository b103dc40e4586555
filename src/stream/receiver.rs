// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::state::{event, is};

//#        o
//#       | construct stream
//#       v
//#   +-------+  App reads past      +-------+
//#   |  Recv |  reset-remotely /    |  Done |
//#   |       |  reads FIN / reset-  |       |
//#   +-------+  locally observed    +-------+
//#       |------------------------------^
//#
//# collapsed relative to a full QUIC stack's Receiver: this port has no
//# ACK tracking, so "all data received" and "all data read" are the same
//# transition — the only thing the read side latches is "no further
//# bytes will ever reach the application".

/// The read-side half of a stream's latched state.
///
/// `finished-reading` is this enum's terminal state; it is reached by
/// observing end-of-stream, a local reset/cancel, or a remote reset
/// (once the queue has drained, per the read-side resolution of open
/// question 1 in DESIGN.md).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Receiver {
    #[default]
    Recv,
    Done,
}

impl Receiver {
    is!(is_receiving, Recv);
    is!(is_finished, Done);

    event! {
        on_finish(Recv => Done);
    }
}
