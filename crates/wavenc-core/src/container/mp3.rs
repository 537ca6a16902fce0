//! ID3v2 tag and MPEG audio frame header parsing.
//!
//! Only the leading tag blocks and the first frame header are read; this is
//! enough to decide whether a file is a usable MP3 input.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use super::bytes::ByteReader;

const ID3_HEADER_LEN: usize = 10;
const ID3_FOOTER_LEN: usize = 10;
const FRAME_HEADER_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum Id3Error {
    #[error("ID3 header at offset {0} is truncated")]
    Truncated(usize),

    #[error("ID3 flag byte {0:#04x} has reserved bits set")]
    ReservedFlags(u8),

    #[error("ID3 size at offset {0} is not a syncsafe integer")]
    NotSyncsafe(usize),

    #[error("ID3 tag at offset {offset} declares {size} bytes, past the end of the file")]
    SizePastEnd { offset: usize, size: u32 },

    #[error("ID3 extended header of {0} bytes is invalid")]
    BadExtendedHeader(u32),
}

#[derive(Debug, Error)]
pub enum Mp3Error {
    #[error(transparent)]
    Id3(#[from] Id3Error),

    #[error("no MPEG frame header at offset {0}")]
    NoFrameSync(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One ID3v2 tag block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Id3Tag {
    pub marker: [u8; 3],
    pub major_version: u8,
    pub revision: u8,
    pub unsynchronisation: bool,
    pub extended_header: bool,
    pub experimental: bool,
    pub footer_present: bool,
    /// Tag size after the 10-byte header, excluding any footer.
    pub offset: u32,
    pub extended_size: u32,
    /// Decoded `T*` and `COMM` frames keyed by frame id.
    pub frames: BTreeMap<String, String>,
}

impl Id3Tag {
    /// Total bytes this tag occupies, header and footer included.
    pub fn total_len(&self) -> usize {
        let footer = if self.footer_present { ID3_FOOTER_LEN } else { 0 };
        ID3_HEADER_LEN + self.offset as usize + footer
    }

    pub fn get(&self, frame_id: &str) -> Option<&str> {
        self.frames.get(frame_id).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V2_5,
    Reserved,
}

impl MpegVersion {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b11 => MpegVersion::V1,
            0b10 => MpegVersion::V2,
            0b01 => MpegVersion::Reserved,
            _ => MpegVersion::V2_5,
        }
    }

    /// Numeric version, `0.0` for the reserved bit pattern.
    pub fn as_f32(&self) -> f32 {
        match self {
            MpegVersion::V1 => 1.0,
            MpegVersion::V2 => 2.0,
            MpegVersion::V2_5 => 2.5,
            MpegVersion::Reserved => 0.0,
        }
    }

    fn rate_row(&self) -> Option<usize> {
        match self {
            MpegVersion::V1 => Some(0),
            MpegVersion::V2 => Some(1),
            MpegVersion::V2_5 => Some(2),
            MpegVersion::Reserved => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

const SAMPLE_RATES: [[u32; 3]; 3] = [
    [44100, 48000, 32000],
    [22050, 24000, 16000],
    [11025, 12000, 8000],
];

/// First MPEG audio frame header after the ID3 blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp3Header {
    pub version: MpegVersion,
    /// 1, 2 or 3; 0 for the reserved layer bits.
    pub layer: u8,
    /// True when the frame carries a CRC (protection bit cleared).
    pub crc: bool,
    /// `None` for reserved version or rate bits.
    pub sample_rate: Option<u32>,
    pub padding: bool,
    pub channel_mode: ChannelMode,
    pub emphasis: u8,
}

/// Parsed leading structure of an MP3 file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mp3Info {
    pub tags: Vec<Id3Tag>,
    pub header: Mp3Header,
    /// Offset of the frame header.
    pub audio_offset: usize,
}

/// Read `path` and parse its tags and first frame header.
pub fn validate(path: &Path) -> Result<Mp3Info, Mp3Error> {
    let bytes = std::fs::read(path)?;
    validate_bytes(&bytes)
}

pub fn validate_bytes(buf: &[u8]) -> Result<Mp3Info, Mp3Error> {
    let (tags, audio_offset) = parse_id3_tags(buf)?;
    let header = buf
        .get(audio_offset..)
        .and_then(parse_frame_header)
        .ok_or(Mp3Error::NoFrameSync(audio_offset))?;
    Ok(Mp3Info {
        tags,
        header,
        audio_offset,
    })
}

/// Parse every concatenated ID3v2 block at the start of `buf`.
///
/// Returns the tags and the offset just past the last one.
pub fn parse_id3_tags(buf: &[u8]) -> Result<(Vec<Id3Tag>, usize), Id3Error> {
    let mut tags = Vec::new();
    let mut pos = 0;
    while buf.get(pos..pos + 3) == Some(b"ID3".as_slice()) {
        let tag = parse_id3_tag(buf, pos)?;
        pos += tag.total_len();
        tags.push(tag);
    }
    Ok((tags, pos))
}

fn parse_id3_tag(buf: &[u8], start: usize) -> Result<Id3Tag, Id3Error> {
    let mut reader = ByteReader::at(buf, start + 3);
    let truncated = || Id3Error::Truncated(start);

    let major_version = reader.u8().ok_or_else(truncated)?;
    let revision = reader.u8().ok_or_else(truncated)?;
    let flags = reader.u8().ok_or_else(truncated)?;
    if flags & 0x0F != 0 {
        return Err(Id3Error::ReservedFlags(flags));
    }
    let offset = reader
        .syncsafe_u32()
        .ok_or(Id3Error::NotSyncsafe(start + 6))?;

    let mut tag = Id3Tag {
        marker: *b"ID3",
        major_version,
        revision,
        unsynchronisation: flags & 0x80 != 0,
        extended_header: flags & 0x40 != 0,
        experimental: flags & 0x20 != 0,
        footer_present: flags & 0x10 != 0,
        offset,
        ..Default::default()
    };

    let frames_start = reader.position();
    let frames_end = frames_start + offset as usize;
    if tag.total_len() > buf.len() - start {
        return Err(Id3Error::SizePastEnd {
            offset: start,
            size: offset,
        });
    }

    if tag.extended_header {
        // The extended header size counts its own four size bytes.
        let size = reader
            .syncsafe_u32()
            .ok_or(Id3Error::NotSyncsafe(frames_start))?;
        if size < 4 || size > offset {
            return Err(Id3Error::BadExtendedHeader(size));
        }
        reader.skip(size as usize - 4).ok_or_else(truncated)?;
        tag.extended_size = size;
    }

    let tag_body = &buf[..frames_end];
    let mut frames = ByteReader::at(tag_body, reader.position());
    while frames.remaining() >= FRAME_HEADER_LEN {
        let Some(id) = frames.peek(4) else { break };
        if !id.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            // Zero padding or garbage: no more frames.
            break;
        }
        let id = String::from_utf8_lossy(id).into_owned();
        frames.skip(4).ok_or_else(truncated)?;
        let size = if major_version >= 4 {
            frames.syncsafe_u32()
        } else {
            frames.u32_be()
        };
        let Some(size) = size else { break };
        frames.skip(2).ok_or_else(truncated)?;
        let Some(payload) = frames.take(size as usize) else {
            break;
        };

        if let Some(value) = decode_frame(&id, payload) {
            tag.frames.insert(id, value);
        }
    }

    Ok(tag)
}

fn decode_frame(id: &str, payload: &[u8]) -> Option<String> {
    if id == "COMM" {
        let (&encoding, rest) = payload.split_first()?;
        // Three-byte language code, then "description\0text".
        let body = rest.get(3..)?;
        let text = decode_text(encoding, body);
        return Some(match text.split_once('\0') {
            Some((_, comment)) => comment.trim_end_matches('\0').to_string(),
            None => text,
        });
    }
    if id.starts_with('T') && id != "TXXX" {
        let (&encoding, body) = payload.split_first()?;
        return Some(decode_text(encoding, body));
    }
    None
}

fn decode_text(encoding: u8, body: &[u8]) -> String {
    let text = match encoding {
        1 | 2 => {
            let (big_endian, data) = match body {
                [0xFE, 0xFF, rest @ ..] => (true, rest),
                [0xFF, 0xFE, rest @ ..] => (false, rest),
                _ => (encoding == 2, body),
            };
            let units: Vec<u16> = data
                .chunks_exact(2)
                .map(|c| {
                    if big_endian {
                        u16::from_be_bytes([c[0], c[1]])
                    } else {
                        u16::from_le_bytes([c[0], c[1]])
                    }
                })
                .collect();
            String::from_utf16_lossy(&units)
        }
        3 => String::from_utf8_lossy(body).into_owned(),
        _ => body.iter().map(|&b| b as char).collect(),
    };
    text.trim_end_matches('\0').to_string()
}

/// Parse a 4-byte MPEG audio frame header.
///
/// Returns `None` unless byte 0 is the `0xFF` sync byte.
pub fn parse_frame_header(bytes: &[u8]) -> Option<Mp3Header> {
    let &[b0, b1, b2, b3, ..] = bytes else {
        return None;
    };
    if b0 != 0xFF {
        return None;
    }

    let version = MpegVersion::from_bits(b1 >> 3);
    let layer = match (b1 >> 1) & 0b11 {
        0b00 => 0,
        bits => 4 - bits,
    };
    let rate_code = usize::from((b2 >> 2) & 0b11);
    let sample_rate = match (version.rate_row(), rate_code) {
        (Some(row), code) if code < 3 => Some(SAMPLE_RATES[row][code]),
        _ => None,
    };
    let channel_mode = match b3 >> 6 {
        0b00 => ChannelMode::Stereo,
        0b01 => ChannelMode::JointStereo,
        0b10 => ChannelMode::DualChannel,
        _ => ChannelMode::Mono,
    };

    Some(Mp3Header {
        version,
        layer,
        crc: b1 & 0x01 == 0,
        sample_rate,
        padding: (b2 >> 1) & 0x01 != 0,
        channel_mode,
        emphasis: b3 & 0b11,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// MPEG-1 Layer III, 128 kbps, 44.1 kHz, joint stereo, no CRC.
    pub(crate) const MPEG1_L3_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x44];

    fn syncsafe(value: u32) -> [u8; 4] {
        [
            ((value >> 21) & 0x7F) as u8,
            ((value >> 14) & 0x7F) as u8,
            ((value >> 7) & 0x7F) as u8,
            (value & 0x7F) as u8,
        ]
    }

    fn frame(id: &[u8; 4], payload: &[u8], syncsafe_size: bool) -> Vec<u8> {
        let mut out = id.to_vec();
        let size = payload.len() as u32;
        if syncsafe_size {
            out.extend_from_slice(&syncsafe(size));
        } else {
            out.extend_from_slice(&size.to_be_bytes());
        }
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(payload);
        out
    }

    pub(crate) fn id3_tag(major: u8, flags: u8, body: &[u8]) -> Vec<u8> {
        let mut out = b"ID3".to_vec();
        out.push(major);
        out.push(0);
        out.push(flags);
        out.extend_from_slice(&syncsafe(body.len() as u32));
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_tag_size_is_syncsafe() {
        let mut bytes = b"ID3\x04\x00\x00\x00\x00\x02\x01".to_vec();
        bytes.resize(10 + 0x101, 0);
        let (tags, end) = parse_id3_tags(&bytes).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].offset, 0x101);
        assert_ne!(tags[0].offset, 0x201);
        assert_eq!(end, 10 + 0x101);
    }

    #[test]
    fn test_text_and_comment_frames() {
        let mut body = frame(b"TIT2", b"\x03Hello", true);
        body.extend(frame(b"TPE1", b"\x00Caf\xe9", true));
        body.extend(frame(b"COMM", b"\x03engdesc\x00nice track", true));
        body.extend_from_slice(&[0; 16]);
        let bytes = id3_tag(4, 0, &body);

        let (tags, _) = parse_id3_tags(&bytes).unwrap();
        let tag = &tags[0];
        assert_eq!(tag.major_version, 4);
        assert_eq!(tag.get("TIT2"), Some("Hello"));
        assert_eq!(tag.get("TPE1"), Some("Café"));
        assert_eq!(tag.get("COMM"), Some("nice track"));
    }

    #[test]
    fn test_v23_frame_sizes_are_plain_big_endian() {
        // 200 bytes of payload: syncsafe and plain encodings differ.
        let mut title = vec![0u8];
        title.extend(std::iter::repeat_n(b'a', 199));
        let mut body = frame(b"TIT2", &title, false);
        body.extend(frame(b"TALB", b"\x00Album", false));
        let bytes = id3_tag(3, 0, &body);

        let (tags, _) = parse_id3_tags(&bytes).unwrap();
        assert_eq!(tags[0].get("TIT2").map(str::len), Some(199));
        assert_eq!(tags[0].get("TALB"), Some("Album"));
    }

    #[test]
    fn test_utf16_text_frame() {
        let body = frame(b"TIT2", b"\x01\xFF\xFEH\x00i\x00\x00\x00", true);
        let (tags, _) = parse_id3_tags(&id3_tag(4, 0, &body)).unwrap();
        assert_eq!(tags[0].get("TIT2"), Some("Hi"));
    }

    #[test]
    fn test_flags_map_to_high_bits() {
        let mut body = syncsafe(6).to_vec();
        body.extend_from_slice(&[1, 0]);
        body.extend(frame(b"TIT2", b"\x03x", true));
        let mut bytes = id3_tag(4, 0x80 | 0x40 | 0x20 | 0x10, &body);
        bytes.extend_from_slice(b"3DI\x04\x00\x00\x00\x00\x00\x00");

        let (tags, end) = parse_id3_tags(&bytes).unwrap();
        let tag = &tags[0];
        assert!(tag.unsynchronisation);
        assert!(tag.extended_header);
        assert!(tag.experimental);
        assert!(tag.footer_present);
        assert_eq!(tag.extended_size, 6);
        assert_eq!(tag.get("TIT2"), Some("x"));
        assert_eq!(end, bytes.len());
    }

    #[test]
    fn test_reserved_flag_bits_reject_tag() {
        let bytes = id3_tag(4, 0x01, &[0; 8]);
        assert!(matches!(
            parse_id3_tags(&bytes),
            Err(Id3Error::ReservedFlags(0x01))
        ));
    }

    #[test]
    fn test_tag_size_past_end() {
        let mut bytes = id3_tag(4, 0, &[0; 8]);
        bytes.truncate(12);
        assert!(matches!(
            parse_id3_tags(&bytes),
            Err(Id3Error::SizePastEnd { .. })
        ));
    }

    #[test]
    fn test_concatenated_tags_then_frame_header() {
        let mut bytes = id3_tag(3, 0, &frame(b"TIT2", b"\x00One", false));
        bytes.extend(id3_tag(4, 0, &frame(b"TIT2", b"\x00Two", true)));
        let audio_offset = bytes.len();
        bytes.extend_from_slice(&MPEG1_L3_HEADER);

        let info = validate_bytes(&bytes).unwrap();
        assert_eq!(info.tags.len(), 2);
        assert_eq!(info.tags[0].get("TIT2"), Some("One"));
        assert_eq!(info.tags[1].get("TIT2"), Some("Two"));
        assert_eq!(info.audio_offset, audio_offset);
        assert_eq!(info.header.sample_rate, Some(44100));
    }

    #[test]
    fn test_frame_header_fields() {
        let header = parse_frame_header(&MPEG1_L3_HEADER).unwrap();
        assert_eq!(header.version, MpegVersion::V1);
        assert_eq!(header.layer, 3);
        assert!(!header.crc);
        assert_eq!(header.sample_rate, Some(44100));
        assert_eq!(header.channel_mode, ChannelMode::JointStereo);
        assert!(!header.padding);
        assert_eq!(header.emphasis, 0);
    }

    #[test]
    fn test_frame_header_version_table() {
        // MPEG-2 Layer III, CRC present, 24 kHz, padded, mono, emphasis 1.
        let header = parse_frame_header(&[0xFF, 0xF2, 0x86, 0xC1]).unwrap();
        assert_eq!(header.version, MpegVersion::V2);
        assert_eq!(header.version.as_f32(), 2.0);
        assert!(header.crc);
        assert_eq!(header.sample_rate, Some(24000));
        assert!(header.padding);
        assert_eq!(header.channel_mode, ChannelMode::Mono);
        assert_eq!(header.emphasis, 1);

        // MPEG-2.5, rate code 2.
        let header = parse_frame_header(&[0xFF, 0xE3, 0x08, 0x00]).unwrap();
        assert_eq!(header.version, MpegVersion::V2_5);
        assert_eq!(header.sample_rate, Some(8000));

        // Reserved version bits.
        let header = parse_frame_header(&[0xFF, 0xEB, 0x00, 0x00]).unwrap();
        assert_eq!(header.version, MpegVersion::Reserved);
        assert_eq!(header.version.as_f32(), 0.0);
        assert_eq!(header.sample_rate, None);
    }

    #[test]
    fn test_missing_sync_byte() {
        assert!(parse_frame_header(&[0xFE, 0xFB, 0x90, 0x44]).is_none());
        assert!(parse_frame_header(&[0xFF, 0xFB]).is_none());
        let bytes = id3_tag(4, 0, &[0; 4]);
        assert!(matches!(
            validate_bytes(&bytes),
            Err(Mp3Error::NoFrameSync(14))
        ));
    }
}
