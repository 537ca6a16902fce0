//! RIFF/WAVE container validation and PCM extraction.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

use super::bytes::ByteReader;
use crate::pcm::PcmData;

/// Smallest buffer that can hold a canonical PCM WAV header.
pub const MIN_WAV_LEN: usize = 44;

const PCM_FORMAT: u16 = 1;
const FMT_FIELDS_LEN: u32 = 16;

#[derive(Debug, Error)]
pub enum WavError {
    #[error("file is {0} bytes, shorter than a WAV header")]
    TooShort(usize),

    #[error("expected {expected:?} tag, found {found:?}")]
    BadTag { expected: &'static str, found: String },

    #[error("no {0:?} chunk found")]
    MissingChunk(&'static str),

    #[error("\"data\" chunk appears before \"fmt \"")]
    DataBeforeFmt,

    #[error("{tag:?} chunk at offset {offset} runs past the end of the file")]
    Truncated { tag: String, offset: usize },

    #[error("\"fmt \" chunk is {0} bytes, expected at least 16")]
    FmtTooSmall(u32),

    #[error("format {0} is not PCM")]
    NotPcm(u16),

    #[error("{0} channels not supported")]
    UnsupportedChannels(u16),

    #[error("block align {block_align} does not match {channels} channels of {bits_per_sample} bits")]
    BadBlockAlign {
        block_align: u16,
        channels: u16,
        bits_per_sample: u16,
    },

    #[error("data size {data_size} is not a multiple of block align {block_align}")]
    MisalignedData { data_size: u32, block_align: u16 },

    #[error("{0}-bit samples not supported, only 16-bit")]
    UnsupportedBitDepth(u16),

    #[error("expected {expected} bytes of PCM, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Parsed and validated RIFF/WAVE header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveHeader {
    pub riff: [u8; 4],
    pub file_length: u32,
    pub wave: [u8; 4],
    pub fmt: [u8; 4],
    pub chunk_size: u32,
    pub format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data: [u8; 4],
    pub data_size: u32,
    /// Absolute offset of the first payload byte.
    pub data_offset: u64,
}

impl WaveHeader {
    /// Sample frames in the payload.
    pub fn frame_count(&self) -> usize {
        if self.block_align == 0 {
            return 0;
        }
        (self.data_size / u32::from(self.block_align)) as usize
    }
}

struct FmtFields {
    chunk_size: u32,
    format: u16,
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
}

/// Read `path` fully and validate it as a PCM WAV file.
pub fn validate(path: &Path) -> Result<WaveHeader, WavError> {
    let bytes = std::fs::read(path)?;
    validate_bytes(&bytes)
}

/// Validate an in-memory WAV image.
pub fn validate_bytes(buf: &[u8]) -> Result<WaveHeader, WavError> {
    if buf.len() < MIN_WAV_LEN {
        return Err(WavError::TooShort(buf.len()));
    }

    let mut reader = ByteReader::new(buf);
    let riff = expect_tag(&mut reader, b"RIFF", "RIFF")?;
    let file_length = reader.u32_le().ok_or_else(|| truncated(b"RIFF", 0))?;
    let wave = expect_tag(&mut reader, b"WAVE", "WAVE")?;

    let mut fmt: Option<([u8; 4], FmtFields)> = None;
    loop {
        let chunk_start = reader.position();
        let (Some(tag), Some(size)) = (reader.tag(), reader.u32_le()) else {
            return Err(WavError::MissingChunk(if fmt.is_none() {
                "fmt "
            } else {
                "data"
            }));
        };

        match &tag {
            b"fmt " if fmt.is_none() => {
                fmt = Some((tag, parse_fmt(&mut reader, size, chunk_start)?));
            }
            b"data" => {
                let Some((fmt_tag, fields)) = fmt else {
                    return Err(WavError::DataBeforeFmt);
                };
                if size as usize > reader.remaining() {
                    return Err(truncated(&tag, chunk_start));
                }
                let header = WaveHeader {
                    riff,
                    file_length,
                    wave,
                    fmt: fmt_tag,
                    chunk_size: fields.chunk_size,
                    format: fields.format,
                    channels: fields.channels,
                    sample_rate: fields.sample_rate,
                    byte_rate: fields.byte_rate,
                    block_align: fields.block_align,
                    bits_per_sample: fields.bits_per_sample,
                    data: tag,
                    data_size: size,
                    data_offset: reader.position() as u64,
                };
                check_invariants(&header)?;
                return Ok(header);
            }
            _ => {
                reader
                    .skip(size as usize)
                    .ok_or_else(|| truncated(&tag, chunk_start))?;
            }
        }
    }
}

fn parse_fmt(
    reader: &mut ByteReader<'_>,
    size: u32,
    chunk_start: usize,
) -> Result<FmtFields, WavError> {
    if size < FMT_FIELDS_LEN {
        return Err(WavError::FmtTooSmall(size));
    }
    let mut body = ByteReader::new(
        reader
            .take(size as usize)
            .ok_or_else(|| truncated(b"fmt ", chunk_start))?,
    );
    // `body` holds at least 16 bytes here, the trailing extension bytes are ignored.
    let field_err = || truncated(b"fmt ", chunk_start);
    Ok(FmtFields {
        chunk_size: size,
        format: body.u16_le().ok_or_else(field_err)?,
        channels: body.u16_le().ok_or_else(field_err)?,
        sample_rate: body.u32_le().ok_or_else(field_err)?,
        byte_rate: body.u32_le().ok_or_else(field_err)?,
        block_align: body.u16_le().ok_or_else(field_err)?,
        bits_per_sample: body.u16_le().ok_or_else(field_err)?,
    })
}

fn check_invariants(header: &WaveHeader) -> Result<(), WavError> {
    if header.format != PCM_FORMAT {
        return Err(WavError::NotPcm(header.format));
    }
    if !(1..=2).contains(&header.channels) {
        return Err(WavError::UnsupportedChannels(header.channels));
    }
    let expected_align = u32::from(header.channels) * u32::from(header.bits_per_sample) / 8;
    if header.bits_per_sample == 0
        || header.bits_per_sample % 8 != 0
        || u32::from(header.block_align) != expected_align
    {
        return Err(WavError::BadBlockAlign {
            block_align: header.block_align,
            channels: header.channels,
            bits_per_sample: header.bits_per_sample,
        });
    }
    if header.data_size % u32::from(header.block_align) != 0 {
        return Err(WavError::MisalignedData {
            data_size: header.data_size,
            block_align: header.block_align,
        });
    }
    Ok(())
}

fn expect_tag(
    reader: &mut ByteReader<'_>,
    literal: &[u8; 4],
    name: &'static str,
) -> Result<[u8; 4], WavError> {
    let offset = reader.position();
    let tag = reader.tag().ok_or_else(|| truncated(literal, offset))?;
    if &tag != literal {
        return Err(WavError::BadTag {
            expected: name,
            found: String::from_utf8_lossy(&tag).into_owned(),
        });
    }
    Ok(tag)
}

fn truncated(tag: &[u8; 4], offset: usize) -> WavError {
    WavError::Truncated {
        tag: String::from_utf8_lossy(tag).into_owned(),
        offset,
    }
}

/// Read the PCM payload described by `header` from `path`.
///
/// Seeks to the recorded data offset, so files with `LIST` or other chunks
/// ahead of `data` are read correctly.
pub fn get_wave_data(header: &WaveHeader, path: &Path) -> Result<PcmData, WavError> {
    if header.bits_per_sample != 16 {
        return Err(WavError::UnsupportedBitDepth(header.bits_per_sample));
    }

    let expected = header.frame_count() * usize::from(header.block_align);
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(header.data_offset))?;

    let mut bytes = Vec::with_capacity(expected);
    file.take(expected as u64).read_to_end(&mut bytes)?;
    if bytes.len() < expected {
        return Err(WavError::ShortRead {
            expected,
            actual: bytes.len(),
        });
    }

    Ok(PcmData::from_interleaved_le(&bytes, header.channels))
}
