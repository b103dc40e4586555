// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A tiny declarative state-machine builder.
//!
//! Each of [`crate::stream::Receiver`] and
//! [`crate::stream::Sender`] is expressed as a plain enum plus a
//! list of `event => valid-states -> target-state` rules built with the
//! [`event`] macro. An event applied from a state with no matching rule
//! returns [`Error::InvalidTransition`]; applied again from the state it
//! already produced, it returns [`Error::NoOp`] so idempotent control
//! operations (`Close`, `Reset`, ...) can treat re-application as a
//! harmless no-op rather than a bug.

use core::fmt;

pub type Result<T> = core::result::Result<(), Error<T>>;

#[cfg(feature = "tracing")]
#[doc(hidden)]
pub use tracing::debug as _debug;

#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
pub use crate::__state_debug_noop__ as _debug;

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! __state_debug_noop__ {
    ($($tt:tt)*) => {};
}

#[macro_export]
#[doc(hidden)]
macro_rules! __state_transition__ {
    ($state:ident, $valid:pat => $target:expr) => {
        $crate::state::transition!(@build [], _, $state, [$valid => $target])
    };
    (@build [$($targets:expr),*], $event:ident, $state:ident, [$valid:pat => $target:expr] $($remaining:tt)*) => {{
        // if the transition is valid, then perform it
        if matches!($state, $valid) {
            let __event__ = stringify!($event);
            if __event__.is_empty() || __event__ == "_" {
                $crate::state::_debug!(prev = ?$state, next = ?$target);
            } else {
                $crate::state::_debug!(event = %__event__, prev = ?$state, next = ?$target);
            }

            *$state = $target;
            Ok(())
        } else {
            $crate::state::transition!(
                @build [$($targets,)* $target],
                $event,
                $state,
                $($remaining)*
            )
        }
    }};
    (@build [$($targets:expr),*], $event:ident, $state:ident $(,)?) => {{
        let targets = [$($targets),*];

        // if we only have a single target and the current state matches it, then return a no-op
        if targets.len() == 1 && targets[0].eq($state) {
            let current = targets[0].clone();
            Err($crate::state::Error::NoOp { current })
        } else {
            // if we didn't get a valid match then error out
            Err($crate::state::Error::InvalidTransition {
                current: $state.clone(),
                event: stringify!($event),
            })
        }
    }};
}

pub use crate::__state_transition__ as transition;

#[macro_export]
#[doc(hidden)]
macro_rules! __state_event__ {
    (
        $(#[doc = $doc:literal])*
        $event:ident (
            $(
                $($valid:ident)|* => $target:ident
            ),*
            $(,)?
        )
    ) => {
        $(
            #[doc = $doc]
        )*
        #[inline]
        pub fn $event(&mut self) -> $crate::state::Result<Self> {
            $crate::state::transition!(
                @build [],
                $event,
                self,
                $(
                    [$(Self::$valid)|* => Self::$target]
                )*
            )
        }
    };
    ($(
        $(#[doc = $doc:literal])*
        $event:ident (
            $(
                $($valid:ident)|* => $target:ident
            ),*
            $(,)?
        );
    )*) => {
        $(
            $crate::state::event!(
                $(#[doc = $doc])*
                $event($($($valid)|* => $target),*)
            );
        )*

        /// Generates a dot graph of all state transitions, handy for
        /// pasting into a graphviz renderer while reviewing a change to
        /// this state machine.
        pub fn dot() -> impl ::core::fmt::Display {
            struct Dot;

            impl ::core::fmt::Display for Dot {
                fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                    writeln!(f, "digraph {{")?;

                    let mut all_states = [
                        // collect all of the states we've observed
                        $($(
                            $(
                                stringify!($valid),
                            )*
                            stringify!($target),
                        )*)*
                    ];

                    all_states.sort_unstable();
                    all_states.dedup();

                    for state in all_states {
                        writeln!(f, "  {state};")?;
                    }

                    $($(
                        $(
                            writeln!(
                                f,
                                "  {} -> {} [label = {:?}];",
                                stringify!($valid),
                                stringify!($target),
                                stringify!($event),
                            )?;
                        )*
                    )*)*

                    writeln!(f, "}}")?;
                    Ok(())
                }
            }

            Dot
        }
    }
}

pub use crate::__state_event__ as event;

#[macro_export]
#[doc(hidden)]
macro_rules! __state_is__ {
    ($(#[doc = $doc:literal])* $function:ident, $($state:ident)|+) => {
        $(
            #[doc = $doc]
        )*
        #[inline]
        pub fn $function(&self) -> bool {
            matches!(self, $(Self::$state)|*)
        }
    };
}

pub use crate::__state_is__ as is;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error<T> {
    NoOp { current: T },
    InvalidTransition { current: T, event: &'static str },
}

impl<T: fmt::Debug> fmt::Display for Error<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOp { current } => {
                write!(f, "state is already set to {current:?}")
            }
            Self::InvalidTransition { current, event } => {
                write!(f, "invalid event {event:?} for state {current:?}")
            }
        }
    }
}

impl<T: fmt::Debug> std::error::Error for Error<T> {}
