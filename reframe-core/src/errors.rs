// Reframe
// Copyright (c) 2026 The Project Reframe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error::Error as StdError;
use std::fmt;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Reframe.
#[derive(Debug)]
pub enum Error {
    /// The stream contained malformed data and could not be parsed. This error is fatal for the
    /// stream that produced it: no further parsing is attempted.
    BadBitstream(&'static str),
    /// An output packet could not be allocated. This error is transient: no input is consumed, and
    /// the operation may be retried later.
    OutOfMemory,
    /// The declared capabilities of the input do not match what the component supports.
    NotSupported(&'static str),
    /// The end of the buffered data was reached before the read completed. This error never
    /// escapes a `process` call: it signals that more input is required.
    Underrun,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::BadBitstream(msg) => {
                write!(f, "malformed stream: {}", msg)
            }
            Error::OutOfMemory => {
                write!(f, "output packet allocation failed")
            }
            Error::NotSupported(msg) => {
                write!(f, "unsupported input: {}", msg)
            }
            Error::Underrun => {
                write!(f, "unexpected end of buffered data")
            }
        }
    }
}

impl StdError for Error {}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a bad bitstream error.
pub fn bad_bitstream<T>(desc: &'static str) -> Result<T> {
    Err(Error::BadBitstream(desc))
}

/// Convenience function to create an unsupported input error.
pub fn not_supported<T>(desc: &'static str) -> Result<T> {
    Err(Error::NotSupported(desc))
}

/// Convenience function to create an underrun error.
pub fn underrun_error<T>() -> Result<T> {
    Err(Error::Underrun)
}
