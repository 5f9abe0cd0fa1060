// Reframe
// Copyright (c) 2026 The Project Reframe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `filter` module defines the data model a reframing filter exchanges with its host
//! runtime: input and output packets, output pid properties, and playback events.
//!
//! The host runtime itself (packet queues, pid graphs, event dispatch) is out of scope; a filter
//! only sees the narrow capability set expressed by the [`FilterHost`] trait.

use crate::audio::Position;
use crate::errors::Result;
use crate::units::Fraction;

/// The class of data carried by a stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamType {
    /// An unparsed file stream, identified by MIME type or file extension.
    File,
    /// An audio stream.
    Audio,
}

/// Well-known codec identifiers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Codec {
    Flac,
    /// A codec this crate has no knowledge of.
    Other,
}

/// Playback modes a pid may advertise.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlaybackMode {
    /// The pid supports fast-forward playback through sparse access.
    FastForward,
}

/// The capabilities declared by the upstream pid feeding a filter.
#[derive(Clone, Debug, Default)]
pub struct InputCaps {
    /// The declared stream type. `None` if the upstream declared nothing.
    pub stream_type: Option<StreamType>,
    /// The declared MIME type, for file streams.
    pub mime: Option<String>,
    /// The declared file extension, for file streams.
    pub file_ext: Option<String>,
    /// The declared codec, for audio streams.
    pub codec: Option<Codec>,
    /// Whether the audio stream is unframed (no access-unit boundaries).
    pub unframed: bool,
    /// The timescale of input packet timestamps, when the input is already timed.
    pub timescale: Option<u32>,
    /// Total size of the source in bytes, when known.
    pub file_size: Option<u64>,
    /// Whether the source is a local file that can be probed and seeked at will.
    pub local_file: bool,
}

/// A property set on an output pid.
#[derive(Clone, Debug, PartialEq)]
pub enum PidProperty {
    StreamType(StreamType),
    Codec(Codec),
    /// Whether the stream still requires framing. A reframer always clears this.
    Unframed(bool),
    /// The timescale of output packet timestamps and durations.
    Timescale(u32),
    SampleRate(u32),
    NumChannels(u32),
    /// The channel mask matching `NumChannels`.
    ChannelPositions(Position),
    /// Samples per frame. 0 if the stream uses variable block sizes.
    SamplesPerFrame(u32),
    /// Bits per audio sample.
    AudioBps(u32),
    /// Average stream bitrate in bits per second.
    Bitrate(u32),
    /// The opaque decoder configuration record required by downstream decoders.
    DecoderConfig(Box<[u8]>),
    /// Total stream duration as a fraction (units over timescale).
    Duration(Fraction),
    PlaybackMode(PlaybackMode),
    /// Whether downstream may reference source bytes directly instead of copying.
    CanDataref(bool),
}

/// An untimed or partially-timed packet of bytes arriving from upstream.
#[derive(Clone, Debug)]
pub struct RawPacket {
    pub data: Box<[u8]>,
    /// Composition timestamp in the upstream-declared timescale, if the input is timed.
    pub cts: Option<u64>,
    /// Byte offset of `data[0]` within the source, if known.
    pub byte_offset: Option<u64>,
}

impl RawPacket {
    /// A packet carrying bytes only, with no timing or offset information.
    pub fn from_bytes(data: impl Into<Box<[u8]>>) -> Self {
        RawPacket { data: data.into(), cts: None, byte_offset: None }
    }
}

/// A framed output packet: exactly one access unit, fully timed.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub data: Box<[u8]>,
    /// Composition timestamp in the output timescale.
    pub cts: u64,
    /// Duration in the output timescale.
    pub dur: u64,
    /// Whether the packet is a stream access point.
    pub sap: bool,
    /// Whether the packet starts, respectively ends, an access unit. A reframer emits whole
    /// access units, so both are always true.
    pub framing: (bool, bool),
    /// Byte offset of the access unit within the source, if known.
    pub byte_offset: Option<u64>,
}

/// A playback event delivered to a filter by the host runtime.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Event {
    /// Start or resume playback from `start_range` seconds.
    Play { start_range: f64 },
    /// Stop playback. Stream configuration is retained so a later `Play` needs no reprobe.
    Stop,
    /// A playback speed change. Absorbed by reframers.
    SetSpeed(f64),
}

/// The capability set a filter needs from its host runtime.
///
/// `send_packet` may fail with `OutOfMemory`; the filter must consume no input on that path so
/// the host can retry the operation later.
pub trait FilterHost {
    /// Send a framed packet downstream.
    fn send_packet(&mut self, packet: Packet) -> Result<()>;

    /// Declare or update a property on the output pid.
    fn set_property(&mut self, prop: PidProperty);

    /// Ask the upstream source to reposition itself at the given byte offset.
    fn seek_source(&mut self, byte_offset: u64);
}
