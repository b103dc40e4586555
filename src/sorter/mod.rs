// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Reassembly of out-of-order, possibly overlapping stream frames.
//!
//! [`Sorter`] is the per-stream reassembly buffer: a map from offset to
//! the frame stored there, plus a `read_position` cursor marking the next
//! byte the application expects. It does not copy or coalesce bytes the
//! way a production reassembly buffer (e.g. `s2n_quic_core::buffer::Reassembler`)
//! would for efficiency; it keeps the individual frames the session handed
//! it and lets [`Sorter::pop`] hand them back one at a time, which is all
//! the read-path state machine in [`crate::stream`] needs.

mod error;

pub use error::Error;

use bytes::Bytes;
use std::collections::BTreeMap;

/// A contiguous run of stream bytes starting at `offset`, optionally
/// carrying FIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub offset: u64,
    pub data: Bytes,
    pub fin: bool,
}

impl Frame {
    #[inline]
    pub fn new(offset: u64, data: Bytes, fin: bool) -> Self {
        Self { offset, data, fin }
    }

    #[inline]
    fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }
}

/// The outcome of [`Sorter::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    /// The frame (or the part of it not already known) was stored.
    Inserted,
    /// The frame carried no bytes the sorter didn't already have, and no
    /// new FIN information; the caller should treat this as a no-op, not
    /// an error.
    Duplicate,
}

#[derive(Debug, Default)]
pub struct Sorter {
    frames: BTreeMap<u64, Frame>,
    read_position: u64,
    /// The stream length declared by whichever push first carried FIN, if
    /// any has arrived yet. Tracked separately from any one frame so that
    /// FIN can be latched onto the right frame regardless of whether the
    /// bytes reaching that offset arrive before or after the FIN itself.
    final_offset: Option<u64>,
}

impl Sorter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally reseats the read cursor.
    ///
    /// Only valid when the queue is empty and no reader is active; used by
    /// the crypto-stream collaborator to rewind during a handshake retry.
    /// Per open question 4 (see DESIGN.md) this crate exposes it as a
    /// construction-time option on [`crate::stream::StreamConfig`] rather
    /// than a method callable at arbitrary times, but the primitive
    /// operation lives here so that collaborator can use it.
    #[inline]
    pub fn set_read_position(&mut self, offset: u64) {
        debug_assert!(self.is_empty(), "SetReadPosition with a non-empty queue");
        self.read_position = offset;
    }

    #[inline]
    pub fn read_position(&self) -> u64 {
        self.read_position
    }

    /// Returns the frame at `read_position`, if any, without removing it.
    #[inline]
    pub fn head(&self) -> Option<&Frame> {
        self.frames.get(&self.read_position)
    }

    /// Removes and returns the head frame, advancing `read_position` past
    /// it. A FIN-only frame advances the position by zero.
    #[inline]
    pub fn pop(&mut self) -> Option<Frame> {
        let frame = self.frames.remove(&self.read_position)?;
        self.read_position += frame.data.len() as u64;
        Some(frame)
    }

    /// Pushes a frame into the sorter, trimming and conflict-checking it
    /// against already-delivered and already-queued bytes.
    pub fn push(&mut self, frame: Frame) -> Result<Push, Error> {
        let Frame {
            mut offset,
            mut data,
            fin,
        } = frame;
        let end = offset + data.len() as u64;

        if let Some(existing) = self.final_offset {
            // any push - FIN or not - that claims bytes past an already
            // known final offset contradicts the stream's declared length;
            // a FIN push must additionally agree on exactly where that is.
            if end > existing || (fin && end != existing) {
                return Err(Error::Conflict);
            }
        } else if fin {
            // a final offset behind the read cursor means bytes we've
            // already delivered would have to un-happen; reject before
            // touching any state.
            if end < self.read_position {
                return Err(Error::Conflict);
            }
            // a frame already queued past the newly declared final offset
            // means the peer is contradicting itself about where the
            // stream ends
            if self.frames.values().any(|f| f.end() > end) {
                return Err(Error::Conflict);
            }
            self.final_offset = Some(end);
        }

        // entirely below the read cursor and not carrying new FIN info
        if end <= self.read_position && !fin {
            return Ok(Push::Duplicate);
        }

        // trim the prefix we've already delivered to the application
        if offset < self.read_position {
            let trim = (self.read_position - offset) as usize;
            data = data.slice(trim..);
            offset = self.read_position;
        }

        // carve the incoming range into the sub-ranges that don't overlap
        // anything already queued, erroring if an overlap disagrees about
        // the bytes it covers
        let mut remaining = vec![(offset, data)];
        let overlapping: Vec<(u64, u64)> = self
            .frames
            .range(..end)
            .map(|(&o, f)| (o, f.end()))
            .filter(|&(_, fend)| fend > offset)
            .collect();

        for (foff, fend) in overlapping {
            let existing_data = self.frames[&foff].data.clone();
            let mut next = Vec::with_capacity(remaining.len() + 1);
            for (roff, rdata) in remaining {
                let rend = roff + rdata.len() as u64;
                let ostart = foff.max(roff);
                let oend = fend.min(rend);
                if ostart >= oend {
                    next.push((roff, rdata));
                    continue;
                }
                let existing_slice =
                    &existing_data[(ostart - foff) as usize..(oend - foff) as usize];
                let incoming_slice = &rdata[(ostart - roff) as usize..(oend - roff) as usize];
                if existing_slice != incoming_slice {
                    return Err(Error::Conflict);
                }
                if roff < ostart {
                    next.push((roff, rdata.slice(0..(ostart - roff) as usize)));
                }
                if oend < rend {
                    next.push((oend, rdata.slice((oend - roff) as usize..)));
                }
            }
            remaining = next;
        }

        let mut inserted = false;
        for (roff, rdata) in remaining {
            if rdata.is_empty() {
                continue;
            }
            inserted = true;
            self.frames.insert(
                roff,
                Frame {
                    offset: roff,
                    data: rdata,
                    fin: false,
                },
            );
        }

        if self.ensure_fin_latched() {
            inserted = true;
        }

        if inserted {
            Ok(Push::Inserted)
        } else {
            Ok(Push::Duplicate)
        }
    }

    /// If the final offset is known, makes sure the frame ending exactly
    /// there carries FIN - whether that's a frame just inserted above, one
    /// queued by an earlier push before FIN was known, or (if no frame ends
    /// there yet) a new zero-length marker. Idempotent: returns whether it
    /// changed anything.
    fn ensure_fin_latched(&mut self) -> bool {
        let Some(final_offset) = self.final_offset else {
            return false;
        };

        if let Some((&koff, existing)) = self.frames.range(..=final_offset).next_back() {
            if existing.end() == final_offset {
                if existing.fin {
                    return false;
                }
                self.frames.get_mut(&koff).unwrap().fin = true;
                return true;
            }
        }

        if !self.frames.contains_key(&final_offset) {
            self.frames.insert(
                final_offset,
                Frame {
                    offset: final_offset,
                    data: Bytes::new(),
                    fin: true,
                },
            );
            return true;
        }

        false
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
