// Reframe
// Copyright (c) 2026 The Project Reframe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `audio` module provides audio channel descriptions.

use bitflags::bitflags;

bitflags! {
    /// A bitmask representing positional audio channels.
    ///
    /// The channel positions are identical to those specified by the channel mask in Microsoft's
    /// `WAVEFORMATEXTENSIBLE` structure.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Position: u64 {
        /// Front-left (left) channel.
        const FRONT_LEFT   = 1 << 0;
        /// Front-right (right) channel.
        const FRONT_RIGHT  = 1 << 1;
        /// Front-center (center) or the Mono channel.
        const FRONT_CENTER = 1 << 2;
        /// Low-frequency effects (LFE) channel.
        const LFE1         = 1 << 3;
        /// Rear-left channel. Also called "surround rear left".
        const REAR_LEFT    = 1 << 4;
        /// Rear-right channel. Also called "surround rear right".
        const REAR_RIGHT   = 1 << 5;
        /// Rear-center channel. Also called "surround rear center".
        const REAR_CENTER  = 1 << 8;
        /// Side-left channel. Also called "surround left".
        const SIDE_LEFT    = 1 << 9;
        /// Side-right channel. Also called "surround right".
        const SIDE_RIGHT   = 1 << 10;
    }
}

impl Position {
    /// The number of channels the mask describes.
    pub fn count(&self) -> u32 {
        self.bits().count_ones()
    }
}

/// Map a FLAC channel count onto positioned channels.
///
/// FLAC streams with 1 to 8 channels use a fixed assignment of channels to speaker positions.
/// Returns `Position::empty()` for channel counts outside that range.
pub fn flac_channel_positions(channels: u32) -> Position {
    match channels {
        1 => Position::FRONT_CENTER,
        2 => Position::FRONT_LEFT | Position::FRONT_RIGHT,
        3 => Position::FRONT_LEFT | Position::FRONT_RIGHT | Position::FRONT_CENTER,
        4 => {
            Position::FRONT_LEFT
                | Position::FRONT_RIGHT
                | Position::REAR_LEFT
                | Position::REAR_RIGHT
        }
        5 => {
            Position::FRONT_LEFT
                | Position::FRONT_RIGHT
                | Position::FRONT_CENTER
                | Position::REAR_LEFT
                | Position::REAR_RIGHT
        }
        6 => {
            Position::FRONT_LEFT
                | Position::FRONT_RIGHT
                | Position::FRONT_CENTER
                | Position::LFE1
                | Position::REAR_LEFT
                | Position::REAR_RIGHT
        }
        7 => {
            Position::FRONT_LEFT
                | Position::FRONT_RIGHT
                | Position::FRONT_CENTER
                | Position::LFE1
                | Position::REAR_LEFT
                | Position::REAR_RIGHT
                | Position::REAR_CENTER
        }
        8 => {
            Position::FRONT_LEFT
                | Position::FRONT_RIGHT
                | Position::FRONT_CENTER
                | Position::LFE1
                | Position::SIDE_LEFT
                | Position::SIDE_RIGHT
                | Position::REAR_LEFT
                | Position::REAR_RIGHT
        }
        _ => Position::empty(),
    }
}
