// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! `std::io::{Read, Write}` adapters over [`super::Stream`], for callers
//! that want ordinary Rust I/O semantics (`Ok(0)` for EOF) instead of the
//! `EndOfStream`-as-error contract [`Stream::read`]/[`Stream::write`]
//! expose directly.

use super::Stream;
use std::io;
use std::sync::Arc;

/// Adapts [`Stream::read`] to `std::io::Read`.
pub struct StreamReader {
    stream: Arc<Stream>,
}

impl StreamReader {
    pub fn new(stream: Arc<Stream>) -> Self {
        Self { stream }
    }
}

impl io::Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.read(buf) {
            Ok(outcome) => Ok(outcome.n),
            Err(err) if err.is_end_of_stream() => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
}

/// Adapts [`Stream::write`] to `std::io::Write`.
pub struct StreamWriter {
    stream: Arc<Stream>,
}

impl StreamWriter {
    pub fn new(stream: Arc<Stream>) -> Self {
        Self { stream }
    }
}

impl io::Write for StreamWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let outcome = self.stream.write(buf);
        match outcome.err {
            Some(err) if outcome.n == 0 => Err(err.into()),
            _ => Ok(outcome.n),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
