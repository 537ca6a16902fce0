//! MP3 encoding through the embedded LAME library.

use mp3lame_encoder::{Bitrate, Builder, DualPcm, FlushNoGap, MonoPcm, Quality};

use super::AudioEncoder;
use crate::config::AudioFormat;
use crate::container::WaveHeader;
use crate::error::{EncoderError, Result};
use crate::pcm::PcmData;

const VERSION: &str = "LAME 3.100 (mp3lame-encoder)";

/// Frames handed to LAME per encode call
const CHUNK_FRAMES: usize = 8192;

/// Room LAME needs for the final flush.
const FLUSH_RESERVE: usize = 7200;

/// 128 kbps CBR MP3 encoder, LAME quality 3.
pub struct Mp3Encoder;

impl Mp3Encoder {
    pub fn new() -> Self {
        Self
    }

    /// Build and configure the LAME encoder.
    fn build_encoder(&self, channels: u16, sample_rate: u32) -> Result<mp3lame_encoder::Encoder> {
        let mut builder =
            Builder::new().ok_or_else(|| EncoderError::Lame("Failed to create LAME builder".into()))?;

        builder
            .set_num_channels(channels as u8)
            .map_err(|e| EncoderError::Lame(format!("Failed to set channels: {:?}", e)))?;

        builder
            .set_sample_rate(sample_rate)
            .map_err(|e| EncoderError::Lame(format!("Failed to set sample rate: {:?}", e)))?;

        builder
            .set_brate(Bitrate::Kbps128)
            .map_err(|e| EncoderError::Lame(format!("Failed to set bitrate: {:?}", e)))?;

        builder
            .set_quality(Quality::VeryNice)
            .map_err(|e| EncoderError::Lame(format!("Failed to set quality: {:?}", e)))?;

        builder
            .build()
            .map_err(|e| EncoderError::Lame(format!("Failed to initialize LAME encoder: {:?}", e)))
    }
}

impl Default for Mp3Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEncoder for Mp3Encoder {
    fn format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn encode(&self, header: &WaveHeader, pcm: &PcmData) -> Result<Vec<u8>> {
        crate::verbose!(
            "[mp3] {} Hz, {} channel(s), {} frames",
            header.sample_rate,
            pcm.channels(),
            pcm.frames()
        );
        let mut encoder = self.build_encoder(pcm.channels(), header.sample_rate)?;

        let mut mp3_data = Vec::new();
        let frames = pcm.frames();
        let mut start = 0;
        while start < frames {
            let end = (start + CHUNK_FRAMES).min(frames);
            mp3_data.reserve(mp3lame_encoder::max_required_buffer_size(end - start));

            let left = &pcm.left[start..end];
            let encoded_size = match &pcm.right {
                Some(right) => encoder.encode(
                    DualPcm {
                        left,
                        right: &right[start..end],
                    },
                    mp3_data.spare_capacity_mut(),
                ),
                None => encoder.encode(MonoPcm(left), mp3_data.spare_capacity_mut()),
            }
            .map_err(|e| EncoderError::Lame(format!("Failed to encode MP3: {:?}", e)))?;

            // SAFETY: encoder.encode returns the number of bytes written to the
            // spare capacity and guarantees exactly that many are initialized.
            unsafe {
                mp3_data.set_len(mp3_data.len() + encoded_size);
            }
            start = end;
        }

        mp3_data.reserve(FLUSH_RESERVE);
        let flush_size = encoder
            .flush::<FlushNoGap>(mp3_data.spare_capacity_mut())
            .map_err(|e| EncoderError::Lame(format!("Failed to flush MP3 encoder: {:?}", e)))?;

        // SAFETY: flush returns the number of additional bytes written.
        // The encoder guarantees flush_size bytes are initialized.
        unsafe {
            mp3_data.set_len(mp3_data.len() + flush_size);
        }

        Ok(mp3_data)
    }
}
