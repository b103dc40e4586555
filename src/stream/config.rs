// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

/// Construction-time parameters for a [`super::Stream`].
///
/// A stream cannot be reconfigured after construction. In particular,
/// the crypto-stream's `SetReadOffset` rewind (open question 4) is
/// modeled by constructing a fresh stream with `initial_read_offset`
/// already seeked past, not as a runtime method — see DESIGN.md.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub stream_id: u64,
    /// Starting receive credit, in bytes. `Stream::new` does not read
    /// this itself - the flow controller is constructed and owned by
    /// the session, out of scope for this crate - but it travels
    /// with the rest of the construction-time parameters so a session
    /// (or, in this crate, [`crate::testing::test_environment`]) has a
    /// single value object to build both the stream and its flow
    /// controller from.
    pub initial_receive_window: u64,
    /// Starting peer-advertised send credit, in bytes. See
    /// [`Self::initial_receive_window`].
    pub initial_send_window: u64,
    /// Caps how much a single `Write` stages before blocking on drain.
    pub max_staging_buffer_size: usize,
    /// Read cursor the stream starts at, for the crypto-stream rewind
    /// case; zero for an ordinary stream.
    pub initial_read_offset: u64,
    /// The crypto stream is exempt from the per-stream send-window
    /// clamp in [`super::Stream::get_data_for_writing`]; every other
    /// stream is clamped.
    pub is_crypto_stream: bool,
}

impl StreamConfig {
    pub fn new(stream_id: u64) -> Self {
        Self {
            stream_id,
            initial_receive_window: 64 * 1024,
            initial_send_window: 64 * 1024,
            max_staging_buffer_size: 1024 * 1024,
            initial_read_offset: 0,
            is_crypto_stream: false,
        }
    }

    pub fn with_initial_receive_window(mut self, window: u64) -> Self {
        self.initial_receive_window = window;
        self
    }

    pub fn with_initial_send_window(mut self, window: u64) -> Self {
        self.initial_send_window = window;
        self
    }

    pub fn with_max_staging_buffer_size(mut self, size: usize) -> Self {
        self.max_staging_buffer_size = size;
        self
    }

    pub fn with_initial_read_offset(mut self, offset: u64) -> Self {
        self.initial_read_offset = offset;
        self
    }

    pub fn as_crypto_stream(mut self) -> Self {
        self.is_crypto_stream = true;
        self
    }
}
