// Reframe
// Copyright (c) 2026 The Project Reframe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Streaming FLAC reframer.
//!
//! [`FlacReframer`] consumes a byte stream carrying a FLAC bitstream and emits one framed,
//! timed access unit per FLAC audio frame. See the struct documentation for the full input and
//! output contract.

pub mod frame;
pub mod metadata;

mod buffer;
mod builder;
mod reframer;

pub use reframer::{FlacReframer, ReframerOptions};

pub use builder::{build_index, FlacIndex};

use reframe_core::probe::{ProbeDescriptor, Score};

/// How the FLAC reframer registers itself with a probe.
pub const FLAC_PROBE: ProbeDescriptor =
    ProbeDescriptor { mime: "audio/flac", extension: "flac", marker: b"fLaC" };

/// Score a byte stream for FLAC support. Any stream whose first four bytes equal the `fLaC`
/// stream marker is supported.
pub fn score(data: &[u8]) -> Score {
    FLAC_PROBE.score(data)
}
