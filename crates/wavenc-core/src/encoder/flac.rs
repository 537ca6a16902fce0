//! FLAC encoding with the pure Rust flacenc encoder.

use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr as _;
use flacenc::error::Verify as _;
use flacenc::source::MemSource;

use super::AudioEncoder;
use crate::config::AudioFormat;
use crate::container::WaveHeader;
use crate::error::{EncoderError, Result};
use crate::pcm::PcmData;

const VERSION: &str = "flacenc 0.5";

/// Samples per channel in each FLAC frame
const BLOCK_SIZE: usize = 4096;

const BITS_PER_SAMPLE: usize = 16;

/// Lossless FLAC encoder with a fixed 4096-sample block size.
pub struct FlacEncoder;

impl FlacEncoder {
    pub fn new() -> Self {
        Self
    }

    fn config(&self) -> Result<flacenc::error::Verified<flacenc::config::Encoder>> {
        let mut config = flacenc::config::Encoder::default();
        config.block_size = BLOCK_SIZE;
        config
            .into_verified()
            .map_err(|(_, e)| EncoderError::Flac(format!("Invalid encoder config: {e}")))
    }
}

impl Default for FlacEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEncoder for FlacEncoder {
    fn format(&self) -> AudioFormat {
        AudioFormat::Flac
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn encode(&self, header: &WaveHeader, pcm: &PcmData) -> Result<Vec<u8>> {
        crate::verbose!(
            "[flac] {} Hz, {} channel(s), {} frames, block size {}",
            header.sample_rate,
            pcm.channels(),
            pcm.frames(),
            BLOCK_SIZE
        );
        let config = self.config()?;

        let samples: Vec<i32> = pcm.interleaved().into_iter().map(i32::from).collect();
        let source = MemSource::from_samples(
            &samples,
            usize::from(pcm.channels()),
            BITS_PER_SAMPLE,
            header.sample_rate as usize,
        );

        let stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
            .map_err(|e| EncoderError::Flac(format!("Failed to encode FLAC: {:?}", e)))?;

        let mut sink = ByteSink::new();
        stream
            .write(&mut sink)
            .map_err(|e| EncoderError::Flac(format!("Failed to write FLAC stream: {e}")))?;

        Ok(sink.as_slice().to_vec())
    }
}
