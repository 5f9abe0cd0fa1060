// Reframe
// Copyright (c) 2026 The Project Reframe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `index` module provides a seek index mapping stream time to byte offsets.

use log::debug;

/// A `SeekPoint` is a mapping between a stream time and a byte offset within a media stream.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SeekPoint {
    /// The stream time of the `SeekPoint` in seconds.
    pub time: f64,
    /// The byte offset of the `SeekPoint` within the source.
    pub byte_offset: u64,
}

/// A `SeekIndex` stores `SeekPoint`s ordered by time and provides an efficient search for the
/// point preceding a desired stream time.
///
/// A `SeekIndex` does not require complete coverage of the entire media stream. However, the
/// better the coverage, the closer the returned point will be to the desired time.
#[derive(Default)]
pub struct SeekIndex {
    points: Vec<SeekPoint>,
}

impl SeekIndex {
    /// Create an empty `SeekIndex`.
    pub fn new() -> SeekIndex {
        SeekIndex { points: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Insert a `SeekPoint` into the index.
    ///
    /// Points must be inserted in ascending time and byte offset order; out-of-order points are
    /// discarded.
    pub fn insert(&mut self, time: f64, byte_offset: u64) {
        let ordered = self
            .points
            .last()
            .map_or(true, |last| time > last.time && byte_offset >= last.byte_offset);

        if ordered {
            self.points.push(SeekPoint { time, byte_offset });
        }
        else {
            debug!("discarding out-of-order seek point, time={}, offset={}", time, byte_offset);
        }
    }

    /// Search the index for the last point at or before the given stream time.
    ///
    /// Returns `None` when the index is empty or every point lies after the desired time.
    pub fn search(&self, time: f64) -> Option<SeekPoint> {
        let n = self.points.partition_point(|p| p.time <= time);

        if n == 0 {
            return None;
        }

        Some(self.points[n - 1])
    }
}
