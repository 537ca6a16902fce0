//! Ogg Vorbis encoding through libvorbis.

use super::AudioEncoder;
use crate::config::AudioFormat;
use crate::container::WaveHeader;
use crate::error::{EncoderError, Result};
use crate::pcm::PcmData;

const VERSION: &str = "libvorbis 1.3 (vorbis-encoder)";

/// libvorbis VBR quality, roughly 128 kbps for stereo 44.1 kHz
const QUALITY: f32 = 0.4;

/// Frames per encode call
const CHUNK_FRAMES: usize = 1024;

/// Ogg Vorbis VBR encoder.
pub struct VorbisEncoder;

impl VorbisEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VorbisEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEncoder for VorbisEncoder {
    fn format(&self) -> AudioFormat {
        AudioFormat::Vorbis
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn encode(&self, header: &WaveHeader, pcm: &PcmData) -> Result<Vec<u8>> {
        use vorbis_encoder::Encoder;

        let channels = usize::from(pcm.channels());
        crate::verbose!(
            "[vorbis] {} Hz, {} channel(s), quality {}",
            header.sample_rate,
            channels,
            QUALITY
        );

        let mut encoder = Encoder::new(channels as u32, u64::from(header.sample_rate), QUALITY)
            .map_err(|e| EncoderError::Vorbis(format!("Vorbis encoder init failed: {}", e)))?;

        let samples = pcm.interleaved();
        let mut ogg_data = Vec::new();
        for chunk in samples.chunks(CHUNK_FRAMES * channels) {
            let encoded = encoder
                .encode(&chunk.to_vec())
                .map_err(|e| EncoderError::Vorbis(format!("Vorbis encode failed: {}", e)))?;
            ogg_data.extend(encoded);
        }

        let flushed = encoder
            .flush()
            .map_err(|e| EncoderError::Vorbis(format!("Vorbis flush failed: {}", e)))?;
        ogg_data.extend(flushed);

        Ok(ogg_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::wav::{tests::wav_bytes, validate_bytes};
    use crate::probe::detect_format;

    #[test]
    fn test_encode_stereo() {
        let header = validate_bytes(&wav_bytes(2, 44100, 16, &[], &[])).unwrap();
        let left: Vec<i16> = (0..20_000)
            .map(|i| ((i as f32 * 0.02).sin() * 12000.0) as i16)
            .collect();
        let right = left.iter().rev().copied().collect();
        let pcm = PcmData::stereo(left, right);

        let ogg = VorbisEncoder::new().encode(&header, &pcm).unwrap();
        assert_eq!(&ogg[..4], b"OggS");
        assert_eq!(detect_format(&ogg), Some(AudioFormat::Vorbis));
    }

    #[test]
    fn test_format_and_extension() {
        let encoder = VorbisEncoder::new();
        assert_eq!(encoder.format(), AudioFormat::Vorbis);
        assert_eq!(encoder.format().extension(), ".ogg");
    }
}
