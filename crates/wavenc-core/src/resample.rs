//! Sample-rate conversion for codecs that only accept fixed rates.
//!
//! libopus encodes at 48kHz, so other rates are converted first.

use rubato::{FftFixedIn, Resampler};
use thiserror::Error;

/// Sample rate libopus is driven at
pub const OPUS_SAMPLE_RATE: u32 = 48000;

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("Failed to create resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    #[error("Resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

/// Resample planar audio from `source_rate` to `target_rate`.
///
/// # Arguments
/// * `planes` - One buffer per channel, all the same length
/// * `source_rate` - Source sample rate in Hz
/// * `target_rate` - Target sample rate in Hz
///
/// # Returns
/// * One buffer per channel of `ceil(len * target / source)` samples, with the
///   resampler's delay removed
pub fn resample(
    planes: &[Vec<f32>],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<Vec<f32>>, ResampleError> {
    let frames = planes.first().map_or(0, Vec::len);

    // If already at the target rate (or nothing to do), return as-is
    if source_rate == target_rate || frames == 0 || planes.is_empty() {
        return Ok(planes.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        1024, // chunk size
        2,    // sub-chunks
        planes.len(),
    )?;

    let expected = output_len(frames, source_rate, target_rate);
    let delay = resampler.output_delay();
    let chunk_size = resampler.input_frames_max();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); planes.len()];

    // Process in chunks, feeding zeros past the end until the delayed tail is out
    let mut pos = 0;
    while output[0].len() < expected + delay {
        let chunk: Vec<Vec<f32>> = planes
            .iter()
            .map(|plane| {
                let mut padded = plane.get(pos..).unwrap_or_default().to_vec();
                padded.truncate(chunk_size);
                padded.resize(chunk_size, 0.0);
                padded
            })
            .collect();

        let result = resampler.process(&chunk, None)?;
        for (out, resampled) in output.iter_mut().zip(result) {
            out.extend_from_slice(&resampled);
        }
        pos += chunk_size;
    }

    for plane in &mut output {
        plane.drain(..delay);
        plane.truncate(expected);
    }
    Ok(output)
}

/// Samples per channel after converting `frames` from `source_rate` to `target_rate`.
pub fn output_len(frames: usize, source_rate: u32, target_rate: u32) -> usize {
    let scaled = frames as u64 * u64::from(target_rate);
    scaled.div_ceil(u64::from(source_rate.max(1))) as usize
}
