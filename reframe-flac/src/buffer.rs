// Reframe
// Copyright (c) 2026 The Project Reframe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::debug;

/// A byte accumulator for data spanning input packet boundaries.
///
/// Bytes are appended at the tail and consumed from the head; consumption compacts the buffer in
/// place. The buffer tracks the source byte offset of its first byte when upstream supplies
/// packet offsets: a packet whose offset continues the previous data keeps the anchor, any
/// discontinuity drops it until the buffer drains and the next offset re-anchors it.
pub struct RingBuffer {
    buf: Vec<u8>,
    base_offset: Option<u64>,
}

impl Default for RingBuffer {
    fn default() -> Self {
        RingBuffer { buf: Vec::new(), base_offset: None }
    }
}

impl RingBuffer {
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// The source byte offset of the buffer head, when known.
    pub fn base_offset(&self) -> Option<u64> {
        self.base_offset
    }

    /// Append the bytes of an input packet, updating the source offset anchor.
    pub fn push(&mut self, data: &[u8], src_offset: Option<u64>) {
        if let Some(offset) = src_offset {
            if self.buf.is_empty() {
                self.base_offset = Some(offset);
            }
            else if let Some(base) = self.base_offset {
                if offset != base + self.buf.len() as u64 {
                    debug!(
                        "discontinuous source offset (expected {}, got {}), dropping anchor",
                        base + self.buf.len() as u64,
                        offset
                    );
                    self.base_offset = None;
                }
            }
        }

        self.buf.extend_from_slice(data);
    }

    /// Drop `count` bytes from the head of the buffer, compacting the tail in place.
    pub fn consume(&mut self, count: usize) {
        debug_assert!(count <= self.buf.len());

        let remaining = self.buf.len() - count;
        self.buf.copy_within(count.., 0);
        self.buf.truncate(remaining);

        if let Some(base) = self.base_offset {
            self.base_offset = Some(base + count as u64);
        }
    }

    /// Drop all bytes and the offset anchor.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.base_offset = None;
    }
}

#[cfg(test)]
mod tests {
    use super::RingBuffer;

    #[test]
    fn verify_append_consume() {
        let mut ring = RingBuffer::default();

        ring.push(&[1, 2, 3, 4], None);
        ring.push(&[5, 6], None);
        assert_eq!(ring.as_slice(), &[1, 2, 3, 4, 5, 6]);

        ring.consume(3);
        assert_eq!(ring.as_slice(), &[4, 5, 6]);

        ring.consume(3);
        assert!(ring.is_empty());
    }

    #[test]
    fn verify_offset_anchor() {
        let mut ring = RingBuffer::default();

        ring.push(&[0; 10], Some(100));
        assert_eq!(ring.base_offset(), Some(100));

        // Contiguous packet keeps the anchor.
        ring.push(&[0; 5], Some(110));
        assert_eq!(ring.base_offset(), Some(100));

        ring.consume(8);
        assert_eq!(ring.base_offset(), Some(108));

        // Discontinuity drops the anchor, and it stays unknown while data remains.
        ring.push(&[0; 4], Some(999));
        assert_eq!(ring.base_offset(), None);
        ring.push(&[0; 4], Some(119));
        assert_eq!(ring.base_offset(), None);

        // Once drained, the next offset re-anchors.
        ring.consume(ring.len());
        ring.push(&[0; 4], Some(200));
        assert_eq!(ring.base_offset(), Some(200));
    }

    #[test]
    fn verify_unknown_offsets_preserve_anchor() {
        let mut ring = RingBuffer::default();

        // The head offset stays valid when later packets carry no offset: appending bytes of
        // unknown origin does not move the head.
        ring.push(&[0; 4], Some(0));
        ring.push(&[0; 4], None);
        assert_eq!(ring.base_offset(), Some(0));

        ring.consume(6);
        assert_eq!(ring.base_offset(), Some(6));
    }
}
