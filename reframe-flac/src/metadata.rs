// Reframe
// Copyright (c) 2026 The Project Reframe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! FLAC stream marker and metadata block parsing.
//!
//! The reframer interprets exactly one block, STREAMINFO; everything else only matters as raw
//! bytes of the decoder configuration record.

use log::info;

use reframe_core::errors::{bad_bitstream, Error, Result};
use reframe_core::io::{BitReader, BufReader, ReadBytes};

/// The FLAC start of stream marker: "fLaC" in ASCII.
pub const FLAC_STREAM_MARKER: [u8; 4] = *b"fLaC";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MetadataBlockType {
    StreamInfo,
    Padding,
    Application,
    SeekTable,
    VorbisComment,
    Cuesheet,
    Picture,
    Unknown(u8),
}

impl MetadataBlockType {
    fn from_tag(tag: u8) -> MetadataBlockType {
        match tag {
            0 => MetadataBlockType::StreamInfo,
            1 => MetadataBlockType::Padding,
            2 => MetadataBlockType::Application,
            3 => MetadataBlockType::SeekTable,
            4 => MetadataBlockType::VorbisComment,
            5 => MetadataBlockType::Cuesheet,
            6 => MetadataBlockType::Picture,
            tag => MetadataBlockType::Unknown(tag),
        }
    }
}

pub struct MetadataBlockHeader {
    pub is_last: bool,
    pub block_type: MetadataBlockType,
    pub block_len: u32,
}

impl MetadataBlockHeader {
    /// Read a metadata block header: a tag byte whose top bit closes the chain and whose low
    /// seven bits select the block type, followed by a 24-bit payload length.
    pub fn read<B: ReadBytes>(reader: &mut B) -> Result<MetadataBlockHeader> {
        let tag = reader.read_u8()?;
        let block_len = reader.read_be_u24()?;

        Ok(MetadataBlockHeader {
            is_last: tag & 0x80 != 0,
            block_type: MetadataBlockType::from_tag(tag & 0x7f),
            block_len,
        })
    }
}

/// The parsed contents of a STREAMINFO metadata block.
///
/// STREAMINFO seeds everything the reframer declares downstream before the first frame header
/// is seen, and bounds the frame locator's search.
#[derive(Clone, Debug, Default)]
pub struct StreamInfo {
    /// Smallest and largest block length of the stream in samples. Equal bounds mean every
    /// frame carries the same sample count, which becomes the samples-per-frame of the output
    /// pid.
    pub min_block_len: u16,
    pub max_block_len: u16,
    /// Smallest and largest encoded frame length in bytes; 0 when the encoder left them
    /// unrecorded. The upper bound caps how far a frame boundary may be searched for.
    pub min_frame_len: u32,
    pub max_frame_len: u32,
    /// The sample rate in Hz. Doubles as the output timescale in file mode.
    pub sample_rate: u32,
    /// The channel count, 1 to 8.
    pub channels: u32,
    /// The sample depth in bits, 4 to 32.
    pub bits_per_sample: u32,
    /// Total samples in the stream, from which the duration property derives. `None` when the
    /// encoder wrote zero.
    pub total_samples: Option<u64>,
}

impl StreamInfo {
    /// Payload length of a STREAMINFO block in bytes.
    pub const SIZE: usize = 34;

    /// Parse a STREAMINFO payload.
    ///
    /// The payload is one packed bit field, so the whole block is pulled through a single bit
    /// reader; the trailing 16 MD5 bytes of decoded audio are of no use to frame delimitation
    /// and stay unread.
    pub fn parse(payload: &[u8]) -> Result<StreamInfo> {
        if payload.len() != StreamInfo::SIZE {
            return bad_bitstream("flac: stream info block is not 34 bytes");
        }

        let mut bits = BitReader::new(payload);

        let min_block_len = bits.read_bits(16)? as u16;
        let max_block_len = bits.read_bits(16)? as u16;
        let min_frame_len = bits.read_bits(24)?;
        let max_frame_len = bits.read_bits(24)?;
        let sample_rate = bits.read_bits(20)?;
        let channels = bits.read_bits(3)? + 1;
        let bits_per_sample = bits.read_bits(5)? + 1;
        let total_samples = bits.read_bits_64(36)?;

        // Frames below 16 samples are not legal, and an inverted range means the header is
        // trash rather than merely unusual.
        if min_block_len < 16 || max_block_len < min_block_len {
            return bad_bitstream("flac: stream block length bounds are not sane");
        }

        if max_frame_len != 0 && min_frame_len > max_frame_len {
            return bad_bitstream("flac: stream frame length bounds are not sane");
        }

        if sample_rate == 0 || sample_rate > 655_350 {
            return bad_bitstream("flac: stream sample rate is outside 1-655350 Hz");
        }

        if bits_per_sample < 4 {
            return bad_bitstream("flac: stream sample depth is below 4 bits");
        }

        Ok(StreamInfo {
            min_block_len,
            max_block_len,
            min_frame_len,
            max_frame_len,
            sample_rate,
            channels,
            bits_per_sample,
            total_samples: match total_samples {
                0 => None,
                n => Some(n),
            },
        })
    }

    /// The fixed samples-per-frame of the stream, or 0 if the block size is variable.
    pub fn fixed_block_len(&self) -> u32 {
        if self.min_block_len == self.max_block_len {
            u32::from(self.min_block_len)
        }
        else {
            0
        }
    }
}

/// The fully parsed metadata chain of a FLAC stream.
#[derive(Debug)]
pub struct FlacMetadata {
    pub info: StreamInfo,
    /// The decoder configuration record: every byte after the stream marker up to and including
    /// the last metadata block, verbatim.
    pub decoder_config: Box<[u8]>,
    /// Total number of bytes the metadata chain occupies in `buf`, marker included.
    pub len: usize,
}

/// Parse the metadata chain at the start of `buf`.
///
/// Returns `Ok(None)` when `buf` does not yet hold the complete chain, so the caller can retry
/// once more data arrives. When `require_marker` is false a stream starting directly with
/// metadata blocks (no `fLaC` marker) is accepted; this is the shape of a decoder configuration
/// record fed back as unframed input.
pub fn read_metadata(buf: &[u8], require_marker: bool) -> Result<Option<FlacMetadata>> {
    if buf.len() < 4 {
        return Ok(None);
    }

    let mut reader = BufReader::new(buf);

    let config_start = if buf[0..4] == FLAC_STREAM_MARKER {
        reader.ignore_bytes(4)?;
        4
    }
    else if require_marker {
        return bad_bitstream("flac: stream does not start with the flac marker");
    }
    else {
        0
    };

    let mut info = None;

    loop {
        let header = match MetadataBlockHeader::read(&mut reader) {
            Ok(header) => header,
            Err(Error::Underrun) => return Ok(None),
            Err(err) => return Err(err),
        };

        if reader.bytes_available() < header.block_len as usize {
            return Ok(None);
        }

        match header.block_type {
            MetadataBlockType::StreamInfo => {
                if info.is_some() {
                    return bad_bitstream("flac: duplicate stream info block");
                }

                let start = reader.pos() as usize;
                let end = start + header.block_len as usize;

                info = Some(StreamInfo::parse(&buf[start..end])?);
                reader.ignore_bytes(u64::from(header.block_len))?;
            }
            block_type => {
                // Reframing needs the raw bytes of the remaining block types, not their
                // contents. Skip them.
                reader.ignore_bytes(u64::from(header.block_len))?;
                info!("skipping {} bytes of {:?} block", header.block_len, block_type);
            }
        }

        if header.is_last {
            break;
        }
    }

    // A stream without STREAMINFO cannot be timed or described downstream.
    let info = match info {
        Some(info) => info,
        None => return bad_bitstream("flac: metadata chain carries no stream info block"),
    };

    let len = reader.pos() as usize;

    Ok(Some(FlacMetadata {
        info,
        decoder_config: Box::from(&buf[config_start..len]),
        len,
    }))
}

#[cfg(test)]
mod tests {
    use super::{read_metadata, StreamInfo};
    use reframe_core::errors::Error;

    fn stream_info_payload() -> [u8; 34] {
        let mut payload = [0u8; 34];

        // Block lengths 4096/4096, unknown frame byte lengths.
        payload[0..2].copy_from_slice(&4096u16.to_be_bytes());
        payload[2..4].copy_from_slice(&4096u16.to_be_bytes());

        // 44100 Hz (20 bits), 2 channels (3 bits), 16 bps (5 bits), 441000 samples (36 bits).
        let packed: u64 =
            (44_100u64 << 44) | (1u64 << 41) | (15u64 << 36) | 441_000;
        payload[10..18].copy_from_slice(&packed.to_be_bytes());

        payload
    }

    #[test]
    fn verify_stream_info_parse() {
        let info = StreamInfo::parse(&stream_info_payload()).unwrap();

        assert_eq!(info.min_block_len, 4096);
        assert_eq!(info.max_block_len, 4096);
        assert_eq!(info.fixed_block_len(), 4096);
        assert_eq!(info.min_frame_len, 0);
        assert_eq!(info.max_frame_len, 0);
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.total_samples, Some(441_000));
    }

    #[test]
    fn verify_stream_info_rejects_tiny_blocks() {
        let mut payload = stream_info_payload();
        payload[0..2].copy_from_slice(&8u16.to_be_bytes());

        assert!(StreamInfo::parse(&payload).is_err());
    }

    #[test]
    fn verify_stream_info_rejects_wrong_size() {
        assert!(StreamInfo::parse(&stream_info_payload()[..20]).is_err());
    }

    #[test]
    fn verify_read_metadata() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"fLaC");
        // STREAMINFO, not last.
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 34]);
        buf.extend_from_slice(&stream_info_payload());
        // PADDING, last.
        buf.extend_from_slice(&[0x81, 0x00, 0x00, 4]);
        buf.extend_from_slice(&[0; 4]);
        // Trailing audio bytes that must not be consumed.
        buf.extend_from_slice(&[0xff, 0xf8]);

        let parsed = read_metadata(&buf, true).unwrap().unwrap();

        assert_eq!(parsed.len, buf.len() - 2);
        assert_eq!(parsed.decoder_config.len(), buf.len() - 2 - 4);
        assert_eq!(parsed.info.sample_rate, 44_100);
    }

    #[test]
    fn verify_read_metadata_incomplete() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"fLaC");
        buf.extend_from_slice(&[0x80, 0x00, 0x00, 34]);
        buf.extend_from_slice(&stream_info_payload()[..20]);

        // The chain is incomplete: not an error, just not ready.
        assert!(read_metadata(&buf, true).unwrap().is_none());
        assert!(read_metadata(b"fLa", true).unwrap().is_none());
    }

    #[test]
    fn verify_read_metadata_bad_marker() {
        let err = read_metadata(b"OggS\x00\x00\x00\x00", true).unwrap_err();
        assert!(matches!(err, Error::BadBitstream(_)));
    }

    #[test]
    fn verify_read_metadata_markerless() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0x80, 0x00, 0x00, 34]);
        buf.extend_from_slice(&stream_info_payload());

        let parsed = read_metadata(&buf, false).unwrap().unwrap();

        assert_eq!(parsed.len, buf.len());
        assert_eq!(&parsed.decoder_config[..], &buf[..]);
    }
}
