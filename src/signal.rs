// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A single-slot, coalescing wakeup primitive.
//!
//! Each stream has one [`Signal`] for its reader and one for its writer.
//! `notify` can be called any number of times between waits and is
//! coalesced into a single wakeup, guaranteeing every state change that
//! happened before a `notify` is observable to whoever wakes up after it
//! (no missed-wakeup race between checking a predicate and waiting).
//! This is the "condition variable plus a generation counter" shape the
//! blocking port of this component is expected to take.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct State {
    generation: u64,
}

pub struct Signal {
    state: Mutex<State>,
    condvar: Condvar,
}

/// Why [`Signal::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// At least one `notify` was observed.
    Notified,
    /// The deadline elapsed with no `notify` observed.
    TimedOut,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            condvar: Condvar::new(),
        }
    }

    /// Returns an opaque token for the current generation; pass it to
    /// [`Self::wait_from`] to wait for the *next* notify after this point,
    /// even if it raced ahead of the call to `wait_from` itself.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Bumps the generation and wakes every waiter. Safe to call with no
    /// waiters present; the bump is simply observed by the next `wait`.
    #[inline]
    pub fn notify(&self) {
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);
        self.condvar.notify_all();
    }

    /// Blocks until a `notify` lands at or after `from`, or `deadline`
    /// elapses.
    pub fn wait_from(&self, from: u64, deadline: Option<Instant>) -> Wait {
        let mut state = self.state.lock();
        while state.generation == from {
            let now = Instant::now();
            let timed_out = match deadline {
                Some(deadline) if deadline <= now => true,
                Some(deadline) => {
                    let remaining = deadline - now;
                    self.condvar.wait_for(&mut state, remaining).timed_out()
                }
                None => {
                    self.condvar.wait(&mut state);
                    false
                }
            };
            if timed_out {
                return Wait::TimedOut;
            }
        }
        Wait::Notified
    }

    /// Convenience form of [`Self::wait_from`] starting from the current
    /// generation; only correct when the caller has just re-checked its
    /// predicate under the same lock that guards the state `notify` is
    /// announcing changes to; see [`crate::stream`] for the intended usage.
    pub fn wait(&self, timeout: Option<Duration>) -> Wait {
        let deadline = timeout.map(|d| Instant::now() + d);
        let from = self.generation();
        self.wait_from(from, deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn notify_before_wait_is_not_lost() {
        let signal = Signal::new();
        let gen = signal.generation();
        signal.notify();
        assert_eq!(signal.wait_from(gen, None), Wait::Notified);
    }

    #[test]
    fn wait_times_out_with_no_notify() {
        let signal = Signal::new();
        let gen = signal.generation();
        let deadline = Instant::now() + Duration::from_millis(10);
        assert_eq!(signal.wait_from(gen, Some(deadline)), Wait::TimedOut);
    }

    #[test]
    fn concurrent_notify_wakes_waiter() {
        let signal = Arc::new(Signal::new());
        let gen = signal.generation();
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait_from(gen, None))
        };
        thread::sleep(Duration::from_millis(20));
        signal.notify();
        assert_eq!(waiter.join().unwrap(), Wait::Notified);
    }

    #[test]
    fn multiple_notifies_coalesce_into_one_wakeup() {
        let signal = Signal::new();
        let gen = signal.generation();
        signal.notify();
        signal.notify();
        signal.notify();
        assert_eq!(signal.wait_from(gen, None), Wait::Notified);
    }
}
