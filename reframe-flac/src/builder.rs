// Reframe
// Copyright (c) 2026 The Project Reframe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One-shot seek index construction over a local FLAC file.

use log::debug;

use reframe_core::errors::{bad_bitstream, Result};
use reframe_core::index::SeekIndex;

use crate::frame::{is_likely_frame_header, parse_frame_header, FLAC_FRAME_PROBE_SIZE};
use crate::metadata::{read_metadata, StreamInfo};

/// The result of an indexing pass over a FLAC file.
pub struct FlacIndex {
    pub index: SeekIndex,
    pub info: StreamInfo,
    /// The number of samples counted while walking the frame headers. May fall short of the
    /// true total when the file ends in a frame too short to interrogate.
    pub n_samples: u64,
}

/// Walk the validated frame headers of a complete FLAC file and record one seek point each time
/// the accumulated stream time crosses a `granularity` boundary (in seconds).
///
/// Byte offsets in the returned index are absolute within `data`, so they can be handed straight
/// to a source seek request.
pub fn build_index(data: &[u8], granularity: f64) -> Result<FlacIndex> {
    let meta = match read_metadata(data, true)? {
        Some(meta) => meta,
        None => return bad_bitstream("flac: file too short to hold its metadata chain"),
    };

    let sample_rate = f64::from(meta.info.sample_rate);

    let mut index = SeekIndex::new();
    let mut pos = meta.len;
    let mut samples = 0u64;
    let mut next_time = 0.0;

    while pos + FLAC_FRAME_PROBE_SIZE <= data.len() {
        if data[pos] != 0xff || (data[pos + 1] & 0xfc) != 0xf8 {
            pos += 1;
            continue;
        }

        if !is_likely_frame_header(&data[pos..]) {
            pos += 1;
            continue;
        }

        match parse_frame_header(&data[pos..]) {
            Some(header) => {
                let time = samples as f64 / sample_rate;

                if granularity > 0.0 && time >= next_time {
                    index.insert(time, pos as u64);

                    while next_time <= time {
                        next_time += granularity;
                    }
                }

                samples += u64::from(header.block_size);
                pos += 2;
            }
            None => pos += 1,
        }
    }

    debug!("indexed {} seek points over {} samples", index.len(), samples);

    Ok(FlacIndex { index, info: meta.info, n_samples: samples })
}
