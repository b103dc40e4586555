// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

/// Errors produced while pushing a frame into a [`super::Sorter`].
///
/// Duplicate pushes are not represented here: they are reported through
/// [`super::Push::Duplicate`] instead, since a frame carrying bytes
/// already delivered or already queued is a normal, silently-absorbed
/// outcome rather than a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The incoming frame overlaps a previously stored or delivered range
    /// with different bytes.
    Conflict,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Conflict => write!(f, "conflicting frame data at overlapping offsets"),
        }
    }
}

impl std::error::Error for Error {}
