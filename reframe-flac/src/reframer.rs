// Reframe
// Copyright (c) 2026 The Project Reframe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;

use log::{debug, info, warn};

use reframe_core::audio::flac_channel_positions;
use reframe_core::checksum::{Crc16Ansi, Crc32};
use reframe_core::errors::{not_supported, Error, Result};
use reframe_core::filter::{
    Codec, Event, FilterHost, InputCaps, Packet, PidProperty, PlaybackMode, RawPacket, StreamType,
};
use reframe_core::index::SeekIndex;
use reframe_core::io::Monitor;
use reframe_core::units::{rescale, Fraction};

use crate::buffer::RingBuffer;
use crate::builder::build_index;
use crate::frame::{
    is_likely_frame_header, parse_frame_header, FrameHeader, FLAC_FRAME_PROBE_SIZE,
    FLAC_MAX_FRAME_SIZE, FLAC_MIN_FRAME_SIZE,
};
use crate::metadata::{read_metadata, FlacMetadata, StreamInfo};

/// Options accepted by [`FlacReframer`].
#[derive(Copy, Clone, Debug)]
pub struct ReframerOptions {
    /// Granularity in seconds of the seek index built over local files. Values at or below 0
    /// disable indexing, and with it seeking.
    pub index: f64,
    /// Validate the CRC16 footer of every frame, instead of only across parameter changes.
    pub docrc: bool,
}

impl Default for ReframerOptions {
    fn default() -> Self {
        ReframerOptions { index: 1.0, docrc: false }
    }
}

/// A validated frame header whose frame boundary could not be confirmed yet.
#[derive(Copy, Clone)]
struct Candidate {
    pos: usize,
    header: FrameHeader,
}

/// The outcome of one boundary search over the buffered bytes.
enum Locate {
    /// No boundary can be decided until more data arrives.
    NeedData,
    /// The frame at the buffer head ends at `data_len`; `consumed` bytes precede the next
    /// frame's header (they differ when garbage trails the frame).
    Frame { data_len: usize, consumed: usize, next: FrameHeader },
    /// The bytes before `at` do not form a frame. Drop them and restart from the header at
    /// `at`.
    Corrupt { at: usize, header: FrameHeader },
}

/// A streaming FLAC reframer.
///
/// Consumes a byte stream carrying a FLAC bitstream, either a raw FLAC file (stream marker and
/// metadata blocks first) or packetized unframed FLAC data, and emits one framed access unit
/// per FLAC audio frame with its composition timestamp and duration.
///
/// Bytes are fed with [`process`](FlacReframer::process) in arbitrarily sized packets; frame
/// boundaries never need to align with packet boundaries. End of input is signalled with
/// [`end_of_stream`](FlacReframer::end_of_stream), which flushes the trailing frame.
///
/// On the first confirmed frame the output pid is configured with the full stream description:
/// codec, timescale, sample rate, channel count and positions, samples per frame, bits per
/// sample, the decoder configuration record, and, when known, duration and bitrate. Mid-stream
/// sample rate or channel changes re-declare the affected properties.
pub struct FlacReframer {
    opts: ReframerOptions,
    caps: InputCaps,
    file_mode: bool,

    ring: RingBuffer,
    initialized: bool,
    fatal: Option<&'static str>,

    // Stream parameters negotiated from STREAMINFO, then updated by frame headers.
    sample_rate: u32,
    channels: u32,
    channel_assignment: u8,
    bits_per_sample: u32,
    block_size: u32,
    duration: Fraction,
    max_frame_len: usize,

    // Output timing.
    timescale: u32,
    cts: u64,
    pending_cts: Option<u64>,

    // Boundary search state.
    head: Option<FrameHeader>,
    scan_pos: usize,
    pending: VecDeque<Candidate>,
    is_sync: bool,

    // Decoder configuration change detection.
    dcfg_crc: Option<u32>,

    // Seek support.
    index: Option<SeekIndex>,
    indexed_info: Option<StreamInfo>,
    indexed_samples: u64,
    in_seek: bool,
    seek_target: f64,
}

impl FlacReframer {
    /// Create a reframer for an input pid with the given capabilities.
    ///
    /// The input must either be a file stream declared as FLAC by MIME type or file extension,
    /// or an unframed FLAC audio stream. Anything else fails with `NotSupported`.
    pub fn try_new(caps: InputCaps, opts: ReframerOptions) -> Result<FlacReframer> {
        let file_mode = match caps.stream_type {
            Some(StreamType::File) => {
                let mime_ok = caps.mime.as_deref() == Some("audio/flac");
                let ext_ok = caps.file_ext.as_deref() == Some("flac");

                if !mime_ok && !ext_ok {
                    return not_supported("flac: file stream is not declared as FLAC");
                }

                true
            }
            Some(StreamType::Audio) => {
                if caps.codec != Some(Codec::Flac) {
                    return not_supported("flac: audio stream codec is not FLAC");
                }

                if !caps.unframed {
                    return not_supported("flac: audio stream is already framed");
                }

                false
            }
            None => return not_supported("flac: input declares no stream type"),
        };

        Ok(FlacReframer {
            opts,
            caps,
            file_mode,
            ring: RingBuffer::default(),
            initialized: false,
            fatal: None,
            sample_rate: 0,
            channels: 0,
            channel_assignment: 0,
            bits_per_sample: 0,
            block_size: 0,
            duration: Fraction::default(),
            max_frame_len: FLAC_MAX_FRAME_SIZE,
            timescale: 0,
            cts: 0,
            pending_cts: None,
            head: None,
            scan_pos: 0,
            pending: VecDeque::new(),
            is_sync: false,
            dcfg_crc: None,
            index: None,
            indexed_info: None,
            indexed_samples: 0,
            in_seek: false,
            seek_target: 0.0,
        })
    }

    /// Run the one-time indexing pass over the complete source file.
    ///
    /// A no-op unless the source is a local file and indexing is enabled. Should be called
    /// before playback when seeking is desired; the built index also supplies the stream
    /// duration when STREAMINFO does not declare one.
    pub fn index_source(&mut self, data: &[u8]) -> Result<()> {
        if self.opts.index <= 0.0 || !self.caps.local_file {
            return Ok(());
        }

        let built = build_index(data, self.opts.index)?;

        self.indexed_samples = built.n_samples;
        self.indexed_info = Some(built.info);
        self.index = Some(built.index);

        Ok(())
    }

    /// Consume at most one input packet and emit any frames it completes.
    ///
    /// Pass `None` to retry emission without new input, for example after an `OutOfMemory`
    /// failure. No input is consumed on a failed emission.
    pub fn process(&mut self, packet: Option<RawPacket>, host: &mut dyn FilterHost) -> Result<()> {
        if let Some(reason) = self.fatal {
            return Err(Error::BadBitstream(reason));
        }

        if let Some(packet) = packet {
            // Timed input: the next emitted frame adopts the most recent upstream timestamp.
            if !self.file_mode {
                if let Some(cts) = packet.cts {
                    self.pending_cts = Some(cts);
                }
            }

            self.ring.push(&packet.data, packet.byte_offset);
        }

        if !self.initialized && !self.parse_metadata(host)? {
            return Ok(());
        }

        self.drain(false, host)
    }

    /// Signal end of input: the remaining buffered bytes are flushed as the last frame.
    pub fn end_of_stream(&mut self, host: &mut dyn FilterHost) -> Result<()> {
        if let Some(reason) = self.fatal {
            return Err(Error::BadBitstream(reason));
        }

        if !self.initialized {
            if self.ring.is_empty() {
                return Ok(());
            }
            return self.fatal_error("flac: stream ended inside the metadata chain");
        }

        self.drain(true, host)
    }

    /// Handle a playback event from the host runtime.
    pub fn handle_event(&mut self, event: Event, host: &mut dyn FilterHost) {
        match event {
            Event::Play { start_range } => self.play(start_range, host),
            Event::Stop => self.stop(),
            // Speed changes do not affect reframing.
            Event::SetSpeed(_) => (),
        }
    }

    fn fatal_error(&mut self, reason: &'static str) -> Result<()> {
        self.ring.clear();
        self.fatal = Some(reason);
        Err(Error::BadBitstream(reason))
    }

    /// Parse the metadata chain at the head of the ring. Returns `Ok(false)` while incomplete.
    fn parse_metadata(&mut self, host: &mut dyn FilterHost) -> Result<bool> {
        let parsed = match read_metadata(self.ring.as_slice(), self.file_mode) {
            Ok(None) => return Ok(false),
            Ok(Some(parsed)) => parsed,
            Err(Error::BadBitstream(reason)) => {
                self.ring.clear();
                self.fatal = Some(reason);
                return Err(Error::BadBitstream(reason));
            }
            Err(err) => return Err(err),
        };

        let len = parsed.len;
        self.configure_output(parsed, host);
        self.ring.consume(len);
        self.initialized = true;
        self.scan_pos = 0;

        Ok(true)
    }

    /// Declare the full output pid description from the parsed metadata.
    fn configure_output(&mut self, parsed: FlacMetadata, host: &mut dyn FilterHost) {
        let info = &parsed.info;

        self.sample_rate = info.sample_rate;
        self.channels = info.channels;
        // Until a frame header says otherwise, assume the direct layout for this channel
        // count. Codes 0-7 encode one fewer than the channel count.
        self.channel_assignment = (info.channels - 1) as u8;
        self.bits_per_sample = info.bits_per_sample;
        self.block_size = info.fixed_block_len();

        self.max_frame_len = if info.max_frame_len > 0 {
            info.max_frame_len as usize
        }
        else {
            FLAC_MAX_FRAME_SIZE
        };

        if let Some(indexed) = &self.indexed_info {
            if indexed.sample_rate != info.sample_rate {
                warn!(
                    "seek index was built at {} Hz but the stream declares {} Hz",
                    indexed.sample_rate, info.sample_rate
                );
            }
        }

        // Fall back on the sample count found while indexing when STREAMINFO does not declare
        // one.
        let n_samples = match info.total_samples {
            Some(n) => Some(n),
            None if self.indexed_samples > 0 => Some(self.indexed_samples),
            None => None,
        };

        self.duration = match n_samples {
            Some(n) => Fraction::new(n, u64::from(info.sample_rate)),
            None => Fraction::default(),
        };

        self.timescale = if self.file_mode {
            info.sample_rate
        }
        else {
            self.caps.timescale.unwrap_or(info.sample_rate)
        };

        host.set_property(PidProperty::StreamType(StreamType::Audio));
        host.set_property(PidProperty::Codec(Codec::Flac));
        host.set_property(PidProperty::Unframed(false));
        host.set_property(PidProperty::Timescale(self.timescale));
        host.set_property(PidProperty::SampleRate(self.sample_rate));
        host.set_property(PidProperty::NumChannels(self.channels));
        host.set_property(PidProperty::ChannelPositions(flac_channel_positions(self.channels)));
        host.set_property(PidProperty::SamplesPerFrame(self.block_size));
        host.set_property(PidProperty::AudioBps(self.bits_per_sample));

        if self.duration.is_known() {
            host.set_property(PidProperty::Duration(self.duration));

            if self.file_mode {
                if let Some(file_size) = self.caps.file_size {
                    let bits = 8 * u128::from(file_size) * u128::from(self.duration.den);
                    let bitrate = (bits / u128::from(self.duration.num)) as u32;
                    host.set_property(PidProperty::Bitrate(bitrate));
                }
            }
        }

        // Re-declare the decoder configuration only when it actually changed.
        let mut crc = Crc32::new(0);
        crc.process_buf_bytes(&parsed.decoder_config);

        if self.dcfg_crc != Some(crc.crc()) {
            self.dcfg_crc = Some(crc.crc());
            host.set_property(PidProperty::DecoderConfig(parsed.decoder_config));
        }

        if self.file_mode {
            host.set_property(PidProperty::CanDataref(true));

            if self.index.is_some() {
                host.set_property(PidProperty::PlaybackMode(PlaybackMode::FastForward));
            }
        }
    }

    /// Emit every frame the buffered bytes can delimit; flush the remainder at end of stream.
    fn drain(&mut self, eos: bool, host: &mut dyn FilterHost) -> Result<()> {
        loop {
            if self.head.is_none() && !self.hunt() {
                break;
            }

            match self.locate() {
                Locate::NeedData => {
                    if self.ring.len() > self.max_frame_len + FLAC_FRAME_PROBE_SIZE {
                        self.overlong_resync();
                        continue;
                    }
                    break;
                }
                Locate::Corrupt { at, header } => {
                    self.log_resync(at, "bytes do not delimit a valid frame");
                    self.ring.consume(at);
                    self.head = Some(header);
                    self.pending.clear();
                    self.scan_pos = 0;
                }
                Locate::Frame { data_len, consumed, next } => {
                    let header = self.head.expect("boundary search requires a head frame");
                    let data = Box::from(&self.ring.as_slice()[..data_len]);
                    let byte_offset = self.ring.base_offset();

                    self.emit(&header, data, byte_offset, host)?;

                    if consumed > data_len {
                        debug!("skipping {} bytes trailing the frame", consumed - data_len);
                    }

                    self.ring.consume(consumed);
                    self.head = Some(next);
                    self.pending.clear();
                    self.scan_pos = 0;
                }
            }
        }

        if eos {
            self.flush(host)?;
        }

        Ok(())
    }

    /// Flush the remaining buffered bytes as the final frame.
    fn flush(&mut self, host: &mut dyn FilterHost) -> Result<()> {
        if let Some(header) = self.head {
            if !self.ring.is_empty() {
                let data = Box::from(self.ring.as_slice());
                let byte_offset = self.ring.base_offset();

                self.emit(&header, data, byte_offset, host)?;
            }

            self.head = None;
        }
        else if !self.ring.is_empty() {
            debug!("dropping {} trailing bytes with no frame sync", self.ring.len());
        }

        self.ring.clear();
        self.pending.clear();
        self.scan_pos = 0;

        Ok(())
    }

    /// Find the first parseable frame header in the ring and make it the head frame, dropping
    /// whatever precedes it. Returns false when more data is needed.
    fn hunt(&mut self) -> bool {
        let mut found = None;
        let mut drop = 0;

        {
            let data = self.ring.as_slice();
            let mut pos = self.scan_pos;

            loop {
                match next_sync(data, pos) {
                    SyncScan::None => {
                        drop = data.len().saturating_sub(1);
                        break;
                    }
                    SyncScan::NeedData(at) => {
                        drop = at;
                        break;
                    }
                    SyncScan::At(at) => {
                        if let Some(header) = parse_frame_header(&data[at..]) {
                            found = Some((at, header));
                            break;
                        }
                        pos = at + 1;
                    }
                }
            }
        }

        match found {
            Some((at, header)) => {
                if at > 0 {
                    self.log_resync(at, "bytes precede the first frame sync");
                    self.ring.consume(at);
                }

                self.head = Some(header);
                self.scan_pos = 0;

                true
            }
            None => {
                if drop > 0 {
                    self.log_resync(drop, "bytes hold no frame sync");
                    self.ring.consume(drop);
                }

                self.scan_pos = 0;

                false
            }
        }
    }

    /// Search for the boundary that closes the head frame.
    ///
    /// A boundary is the next candidate whose header parses and validates. When the frame body
    /// CRC16 applies (`docrc`, or the candidate changes stream parameters), a failed checksum
    /// makes the candidate a suspected false sync; rejected candidates are remembered so that a
    /// later boundary can expose a corrupt head frame or trailing garbage.
    fn locate(&mut self) -> Locate {
        let data = self.ring.as_slice();
        let mut pos = self.scan_pos.max(FLAC_MIN_FRAME_SIZE);

        loop {
            match next_sync(data, pos) {
                SyncScan::None => {
                    self.scan_pos = data.len().saturating_sub(1);
                    return Locate::NeedData;
                }
                SyncScan::NeedData(at) => {
                    self.scan_pos = at;
                    return Locate::NeedData;
                }
                SyncScan::At(at) => {
                    if !is_likely_frame_header(&data[at..]) {
                        pos = at + 1;
                        continue;
                    }

                    let header = match parse_frame_header(&data[at..]) {
                        Some(header) => header,
                        None => {
                            pos = at + 1;
                            continue;
                        }
                    };

                    // A raw channel assignment change counts: even when the channel count is
                    // unaffected (the stereo decorrelation modes all carry two channels), a
                    // boundary that flips the assignment deserves the body check.
                    let changed = (header.sample_rate != 0
                        && header.sample_rate != self.sample_rate)
                        || header.channel_assignment != self.channel_assignment;

                    if !self.opts.docrc && !changed {
                        return Locate::Frame { data_len: at, consumed: at, next: header };
                    }

                    if frame_crc_ok(&data[..at]) {
                        return Locate::Frame { data_len: at, consumed: at, next: header };
                    }

                    // The body failed its checksum: either this sync is a coincidence inside
                    // the frame payload, the head frame is corrupt, or garbage trails it.
                    // Check the candidates seen so far for a body that does check out.
                    if let Some(i) =
                        self.pending.iter().position(|c| frame_crc_ok(&data[c.pos..at]))
                    {
                        let candidate = self.pending[i];
                        return Locate::Corrupt { at: candidate.pos, header: candidate.header };
                    }

                    if self.pending.is_empty() {
                        // No other candidate to blame: the frame may end early, with garbage
                        // between its footer and this header.
                        if let Some(end) = find_early_footer(&data[..at]) {
                            return Locate::Frame { data_len: end, consumed: at, next: header };
                        }
                    }

                    if self.pending.back().map_or(true, |c| c.pos < at) {
                        self.pending.push_back(Candidate { pos: at, header });
                    }

                    pos = at + 1;
                }
            }
        }
    }

    /// The head frame exceeded the maximum frame length without a boundary: resynchronize at
    /// the best rejected candidate, or drop the buffer wholesale.
    fn overlong_resync(&mut self) {
        if let Some(candidate) = self.pending.pop_front() {
            self.log_resync(candidate.pos, "frame exceeds the maximum frame length");
            self.ring.consume(candidate.pos);
            self.head = Some(candidate.header);
        }
        else {
            let count = self.ring.len() - FLAC_FRAME_PROBE_SIZE;
            self.log_resync(count, "frame exceeds the maximum frame length");
            self.ring.consume(count);
            self.head = None;
        }

        self.pending.clear();
        self.scan_pos = 0;
    }

    /// Emit one frame downstream, or account for it silently while a seek is in progress.
    fn emit(
        &mut self,
        header: &FrameHeader,
        data: Box<[u8]>,
        byte_offset: Option<u64>,
        host: &mut dyn FilterHost,
    ) -> Result<()> {
        // Parameter changes carried by the frame header update the output pid before the frame
        // is sent.
        if header.sample_rate != 0 && header.sample_rate != self.sample_rate {
            info!("sample rate change {} -> {}", self.sample_rate, header.sample_rate);
            self.sample_rate = header.sample_rate;
            host.set_property(PidProperty::SampleRate(self.sample_rate));
        }

        if header.channels != self.channels {
            info!("channel count change {} -> {}", self.channels, header.channels);
            self.channels = header.channels;
            host.set_property(PidProperty::NumChannels(self.channels));
            host.set_property(PidProperty::ChannelPositions(flac_channel_positions(
                self.channels,
            )));
        }

        // Track the raw assignment code as well: it is what the boundary search compares
        // against, and it moves without the channel count following (mid/side modes).
        self.channel_assignment = header.channel_assignment;

        let dur = rescale(u64::from(header.block_size), self.sample_rate, self.timescale);
        let cts = self.pending_cts.unwrap_or(self.cts);

        if self.in_seek {
            let target = (self.seek_target * f64::from(self.sample_rate)).floor() as u64;

            if cts + u64::from(header.block_size) >= target {
                self.in_seek = false;
            }
            else {
                // Still before the seek target: account for the frame without emitting it.
                self.cts = cts + dur;
                self.pending_cts = None;
                return Ok(());
            }
        }

        host.send_packet(Packet {
            data,
            cts,
            dur,
            sap: true,
            framing: (true, true),
            byte_offset,
        })?;

        self.pending_cts = None;
        self.cts = cts + dur;
        self.is_sync = true;

        Ok(())
    }

    fn play(&mut self, start_range: f64, host: &mut dyn FilterHost) {
        if self.fatal.is_some() || !self.initialized {
            return;
        }

        // Without an index the source cannot be repositioned; playback continues from wherever
        // the source currently is.
        let point = match self.index.as_ref().and_then(|index| index.search(start_range)) {
            Some(point) => point,
            None => return,
        };

        debug!("seek to {}s via indexed offset {}", start_range, point.byte_offset);

        self.ring.clear();
        self.head = None;
        self.pending.clear();
        self.scan_pos = 0;
        self.is_sync = false;

        self.cts = (point.time * f64::from(self.sample_rate)).floor() as u64;
        self.seek_target = start_range;
        self.in_seek = true;

        host.seek_source(point.byte_offset);
    }

    fn stop(&mut self) {
        self.ring.clear();
        self.head = None;
        self.pending.clear();
        self.scan_pos = 0;
        self.cts = 0;
        self.pending_cts = None;
        self.in_seek = false;
        self.is_sync = false;
    }

    fn log_resync(&mut self, count: usize, what: &str) {
        // A sync loss right after a confirmed frame is worth a warning; while already hunting
        // it is routine.
        if self.is_sync {
            warn!("lost frame sync, dropping {} bytes: {}", count, what);
        }
        else {
            debug!("resync, dropping {} bytes: {}", count, what);
        }

        self.is_sync = false;
    }
}

enum SyncScan {
    /// No sync byte pair in the remaining data.
    None,
    /// A sync byte pair at this position cannot be interrogated until more data arrives.
    NeedData(usize),
    /// A sync byte pair at this position, with enough data behind it to interrogate.
    At(usize),
}

/// Scan for the next `0xff 0xf8..=0xfb` sync byte pair at or after `pos`.
fn next_sync(data: &[u8], mut pos: usize) -> SyncScan {
    while pos + 1 < data.len() {
        if data[pos] == 0xff && (data[pos + 1] & 0xfc) == 0xf8 {
            if pos + FLAC_FRAME_PROBE_SIZE > data.len() {
                return SyncScan::NeedData(pos);
            }

            return SyncScan::At(pos);
        }

        pos += 1;
    }

    SyncScan::None
}

/// Whether `frame` ends in a CRC16 footer matching its body.
fn frame_crc_ok(frame: &[u8]) -> bool {
    if frame.len() < FLAC_MIN_FRAME_SIZE {
        return false;
    }

    let (body, footer) = frame.split_at(frame.len() - 2);

    let mut crc = Crc16Ansi::new(0);
    crc.process_buf_bytes(body);

    crc.crc() == u16::from_be_bytes([footer[0], footer[1]])
}

/// Search for a footer that closes `frame` before its full length. Used when the full range
/// fails its checksum, to detect garbage appended after a valid frame.
fn find_early_footer(frame: &[u8]) -> Option<usize> {
    if frame.len() <= FLAC_MIN_FRAME_SIZE {
        return None;
    }

    let mut crc = Crc16Ansi::new(0);
    crc.process_buf_bytes(&frame[..FLAC_MIN_FRAME_SIZE - 2]);

    for end in FLAC_MIN_FRAME_SIZE..frame.len() {
        let footer = u16::from_be_bytes([frame[end - 2], frame[end - 1]]);

        if crc.crc() == footer {
            return Some(end);
        }

        crc.process_byte(frame[end - 2]);
    }

    None
}
