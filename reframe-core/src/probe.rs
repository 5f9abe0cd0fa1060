// Reframe
// Copyright (c) 2026 The Project Reframe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `probe` module defines how a format announces support for a byte stream.

/// The result of probing the start of a byte stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Score {
    /// The format is not supported.
    Unsupported,
    /// The format is supported with a confidence between 0 (not confident) and 255 (very
    /// confident).
    Supported(u8),
}

/// Describes the byte patterns and naming under which a format registers itself.
#[derive(Copy, Clone, Debug)]
pub struct ProbeDescriptor {
    /// The canonical MIME type.
    pub mime: &'static str,
    /// The canonical file extension, without a leading dot.
    pub extension: &'static str,
    /// The start-of-stream marker bytes.
    pub marker: &'static [u8],
}

impl ProbeDescriptor {
    /// Score a byte stream against this descriptor's start-of-stream marker.
    pub fn score(&self, data: &[u8]) -> Score {
        if data.len() >= self.marker.len() && &data[..self.marker.len()] == self.marker {
            Score::Supported(255)
        }
        else {
            Score::Unsupported
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ProbeDescriptor, Score};

    const DESC: ProbeDescriptor =
        ProbeDescriptor { mime: "audio/test", extension: "tst", marker: b"tEsT" };

    #[test]
    fn verify_probe_descriptor() {
        assert_eq!(DESC.score(b"tEsT\x00\x01"), Score::Supported(255));
        assert_eq!(DESC.score(b"tEs"), Score::Unsupported);
        assert_eq!(DESC.score(b"fLaC"), Score::Unsupported);
    }
}
