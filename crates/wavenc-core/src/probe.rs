//! Identify an encoded stream by its leading bytes.

use crate::config::AudioFormat;
use crate::container::mp3::{parse_frame_header, parse_id3_tags};

/// Bytes of the first Ogg page searched for a codec identification header
const OGG_PROBE_LEN: usize = 512;

/// Guess the container format of `bytes` from magic numbers.
///
/// Recognizes native FLAC, Ogg Opus, Ogg Vorbis, MP3 (optionally behind ID3
/// tags) and ADTS AAC.
pub fn detect_format(bytes: &[u8]) -> Option<AudioFormat> {
    if bytes.starts_with(b"fLaC") {
        return Some(AudioFormat::Flac);
    }

    if bytes.starts_with(b"OggS") {
        let page = &bytes[..bytes.len().min(OGG_PROBE_LEN)];
        if contains(page, b"OpusHead") {
            return Some(AudioFormat::Opus);
        }
        if contains(page, b"\x01vorbis") {
            return Some(AudioFormat::Vorbis);
        }
        return None;
    }

    let audio_offset = match parse_id3_tags(bytes) {
        Ok((tags, _)) if !tags.is_empty() => return Some(AudioFormat::Mp3),
        Ok((_, offset)) => offset,
        Err(_) => return None,
    };

    let frame = bytes.get(audio_offset..)?;
    match frame {
        // 12-bit sync, layer bits 00
        [0xFF, b1, ..] if b1 & 0xF6 == 0xF0 => Some(AudioFormat::Aac),
        [0xFF, b1, ..] if b1 & 0xE0 == 0xE0 => parse_frame_header(frame)
            .filter(|header| header.layer == 3)
            .map(|_| AudioFormat::Mp3),
        _ => None,
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
