// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Errors a stream can surface to its reader, writer, or session.

use std::io;

/// Errors that a stream can encounter.
///
/// This is the single error type returned from every application- and
/// session-facing operation. `Read` reports end-of-stream through
/// [`StreamError::EndOfStream`] rather than a zero-length, error-free
/// return, matching the source contract this crate ports; callers that
/// want ordinary `std::io::Read` semantics can use the `std::io::Read`
/// impl on [`crate::stream::StreamReader`], which maps `EndOfStream`
/// back to `Ok(0)`.
#[derive(Debug, Clone, displaydoc::Display, thiserror::Error)]
#[non_exhaustive]
pub enum StreamError {
    /// end of stream
    EndOfStream,
    /// deadline exceeded
    DeadlineExceeded,
    /// stream reset locally: {cause}
    LocalReset { cause: ResetCause },
    /// stream reset by peer: {cause}
    RemoteReset { cause: ResetCause },
    /// stream cancelled: {cause}
    Cancelled { cause: ResetCause },
    /// write on closed stream
    WriteAfterClose,
    /// conflicting frame data at overlapping offsets
    SorterConflict,
    /// flow control violation: {0}
    FlowControlViolation(String),
}

impl StreamError {
    /// Mirrors Go's `net.Error` contract: a timer firing before progress
    /// was made is both a timeout and (by convention) retryable.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }

    /// See [`Self::is_timeout`]; deadlines are always reported as temporary.
    #[inline]
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }

    #[inline]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

/// An application-supplied reason for a local `Reset`, or the peer's
/// decoded reason for a `RESET_STREAM`.
///
/// The session multiplexer is responsible for encoding/decoding this to
/// and from the wire's application error code; this crate only carries
/// it around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResetCause(pub u64);

impl core::fmt::Display for ResetCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "error code {}", self.0)
    }
}

impl From<StreamError> for io::Error {
    #[inline]
    fn from(error: StreamError) -> Self {
        let kind = (&error).into();
        io::Error::new(kind, error)
    }
}

impl From<&StreamError> for io::ErrorKind {
    #[inline]
    fn from(error: &StreamError) -> Self {
        use io::ErrorKind;
        match error {
            StreamError::EndOfStream => ErrorKind::UnexpectedEof,
            StreamError::DeadlineExceeded => ErrorKind::TimedOut,
            StreamError::LocalReset { .. } => ErrorKind::ConnectionAborted,
            StreamError::RemoteReset { .. } => ErrorKind::ConnectionReset,
            StreamError::Cancelled { .. } => ErrorKind::ConnectionAborted,
            StreamError::WriteAfterClose => ErrorKind::BrokenPipe,
            StreamError::SorterConflict => ErrorKind::InvalidData,
            StreamError::FlowControlViolation(_) => ErrorKind::InvalidData,
        }
    }
}

impl From<crate::sorter::Error> for StreamError {
    #[inline]
    fn from(_: crate::sorter::Error) -> Self {
        Self::SorterConflict
    }
}
