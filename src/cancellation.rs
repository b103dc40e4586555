// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The cancellation handle exposed to callers awaiting a stream
//! out-of-band (`Context()` in the application-facing interface).

use crate::signal::Signal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    signal: Signal,
}

/// A cheaply cloneable cancellation token. `Close`, `Cancel`, `Reset`, and
/// `RegisterRemoteError` all cancel it; deadlines do not.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Idempotent; the second and later calls are a no-op.
    #[inline]
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.signal.notify();
    }

    /// Blocks until cancelled, or `timeout` elapses.
    pub fn wait(&self, timeout: Option<Duration>) {
        if self.is_cancelled() {
            return;
        }
        self.inner.signal.wait(timeout);
    }
}
