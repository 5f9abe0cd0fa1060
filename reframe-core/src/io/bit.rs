// Reframe
// Copyright (c) 2026 The Project Reframe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::errors::{underrun_error, Result};

/// A `BitReader` reads bits from most-significant to least-significant order over a byte slice.
///
/// It is a plain value type: a slice plus a bit position. Reads past the end of the slice fail
/// with an underrun error.
pub struct BitReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Instantiate a new `BitReader` over the given byte buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        BitReader { buf, pos: 0 }
    }

    /// Reads a single bit from the stream.
    #[inline(always)]
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.pos >= 8 * self.buf.len() {
            return underrun_error();
        }

        let bit = (self.buf[self.pos >> 3] >> (7 - (self.pos & 0x7))) & 1;
        self.pos += 1;

        Ok(bit == 1)
    }

    /// Reads up-to 32 bits from the stream and returns them as an unsigned integer.
    pub fn read_bits(&mut self, bit_width: u32) -> Result<u32> {
        debug_assert!(bit_width <= 32);
        Ok(self.read_bits_64(bit_width)? as u32)
    }

    /// Reads up-to 64 bits from the stream and returns them as an unsigned integer.
    pub fn read_bits_64(&mut self, bit_width: u32) -> Result<u64> {
        debug_assert!(bit_width <= 64);

        if self.pos + bit_width as usize > 8 * self.buf.len() {
            return underrun_error();
        }

        let mut value = 0u64;

        for _ in 0..bit_width {
            let bit = (self.buf[self.pos >> 3] >> (7 - (self.pos & 0x7))) & 1;
            value = (value << 1) | u64::from(bit);
            self.pos += 1;
        }

        Ok(value)
    }

    /// Ignores the specified number of bits.
    pub fn ignore_bits(&mut self, bit_width: u32) -> Result<()> {
        if self.pos + bit_width as usize > 8 * self.buf.len() {
            return underrun_error();
        }

        self.pos += bit_width as usize;
        Ok(())
    }
}
