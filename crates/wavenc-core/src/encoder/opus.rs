//! Opus encoding through libopus, muxed into an Ogg stream.

use audiopus::coder::Encoder as OpusEnc;
use audiopus::{Application, Bitrate, Channels, SampleRate};
use ogg::writing::{PacketWriteEndInfo, PacketWriter};

use super::AudioEncoder;
use crate::config::AudioFormat;
use crate::container::WaveHeader;
use crate::error::{EncoderError, Result};
use crate::pcm::{PcmData, f32_to_i16};
use crate::resample::{OPUS_SAMPLE_RATE, resample};

const VERSION: &str = "libopus 1.3 (audiopus)";

const BITRATE: i32 = 128_000;

/// 20 ms at 48 kHz
const FRAME_SIZE: usize = 960;

/// Largest packet libopus produces for one frame
const MAX_PACKET: usize = 4000;

/// Encoder lookahead at 48 kHz, signalled so players trim it.
const PRE_SKIP: u16 = 312;

const STREAM_SERIAL: u32 = 1;

/// Ogg Opus encoder at 128 kbps, always encoding at 48 kHz.
pub struct OpusEncoder;

impl OpusEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Identification header (RFC 7845 section 5.1)
    fn opus_head(channels: u8, input_rate: u32) -> Vec<u8> {
        let mut head = Vec::with_capacity(19);
        head.extend_from_slice(b"OpusHead");
        head.push(1);
        head.push(channels);
        head.extend_from_slice(&PRE_SKIP.to_le_bytes());
        head.extend_from_slice(&input_rate.to_le_bytes());
        head.extend_from_slice(&0i16.to_le_bytes());
        // Mapping family 0: mono or stereo, no table
        head.push(0);
        head
    }

    /// Comment header (RFC 7845 section 5.2)
    fn opus_tags() -> Vec<u8> {
        let vendor = concat!("wavenc ", env!("CARGO_PKG_VERSION")).as_bytes();
        let mut tags = Vec::with_capacity(16 + vendor.len());
        tags.extend_from_slice(b"OpusTags");
        tags.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        tags.extend_from_slice(vendor);
        tags.extend_from_slice(&0u32.to_le_bytes());
        tags
    }
}

/// 20 ms packets needed to carry `frames` samples plus the pre-skip.
fn packets_for(frames: usize) -> usize {
    (frames + usize::from(PRE_SKIP)).div_ceil(FRAME_SIZE).max(1)
}

/// Granule position of the last page: every input sample after the pre-skip.
fn final_granule(frames: usize) -> u64 {
    u64::from(PRE_SKIP) + frames as u64
}

impl Default for OpusEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEncoder for OpusEncoder {
    fn format(&self) -> AudioFormat {
        AudioFormat::Opus
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn encode(&self, header: &WaveHeader, pcm: &PcmData) -> Result<Vec<u8>> {
        let channels = pcm.channels();
        let opus_channels = if channels == 2 {
            Channels::Stereo
        } else {
            Channels::Mono
        };
        crate::verbose!(
            "[opus] {} Hz -> {} Hz, {} channel(s), {} kbps",
            header.sample_rate,
            OPUS_SAMPLE_RATE,
            channels,
            BITRATE / 1000
        );

        let planes = resample(&pcm.planar_f32(), header.sample_rate, OPUS_SAMPLE_RATE)
            .map_err(|e| EncoderError::Opus(e.to_string()))?;
        let frames = planes.first().map_or(0, Vec::len);
        let interleaved: Vec<i16> = (0..frames)
            .flat_map(|i| planes.iter().map(move |plane| f32_to_i16(plane[i])))
            .collect();

        let mut encoder = OpusEnc::new(SampleRate::Hz48000, opus_channels, Application::Audio)
            .map_err(|e| EncoderError::Opus(format!("Opus encoder init failed: {:?}", e)))?;
        encoder
            .set_bitrate(Bitrate::BitsPerSecond(BITRATE))
            .map_err(|e| EncoderError::Opus(format!("Opus set bitrate failed: {:?}", e)))?;

        let mut ogg_data = Vec::new();
        let mut writer = PacketWriter::new(&mut ogg_data);
        let ogg_err = |e: std::io::Error| EncoderError::Opus(format!("Ogg write failed: {e}"));

        writer
            .write_packet(
                Self::opus_head(channels as u8, header.sample_rate),
                STREAM_SERIAL,
                PacketWriteEndInfo::EndPage,
                0,
            )
            .map_err(ogg_err)?;
        writer
            .write_packet(Self::opus_tags(), STREAM_SERIAL, PacketWriteEndInfo::EndPage, 0)
            .map_err(ogg_err)?;

        // Encode past the end by the lookahead so the tail is flushed out of
        // libopus; at least one packet so the stream is terminated.
        let frame_samples = FRAME_SIZE * usize::from(channels);
        let packet_count = packets_for(frames);
        let mut packet = [0u8; MAX_PACKET];
        let mut frame = vec![0i16; frame_samples];

        for index in 0..packet_count {
            let start = index * frame_samples;
            let end = (start + frame_samples).min(interleaved.len());
            let available = end.saturating_sub(start);
            frame[..available].copy_from_slice(&interleaved[start.min(end)..end]);
            frame[available..].fill(0);

            let len = encoder
                .encode(&frame, &mut packet)
                .map_err(|e| EncoderError::Opus(format!("Opus encode failed: {:?}", e)))?;

            let last = index + 1 == packet_count;
            // Final granule trims the zero padding of the last frame
            let granule = if last {
                final_granule(frames)
            } else {
                ((index + 1) * FRAME_SIZE) as u64
            };
            let end_info = if last {
                PacketWriteEndInfo::EndStream
            } else {
                PacketWriteEndInfo::NormalPacket
            };
            writer
                .write_packet(packet[..len].to_vec(), STREAM_SERIAL, end_info, granule)
                .map_err(ogg_err)?;
        }
        drop(writer);

        Ok(ogg_data)
    }
}
