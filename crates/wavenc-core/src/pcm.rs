//! Owned 16-bit PCM buffers for one file.

/// Deinterleaved 16-bit samples. `right` is `None` for mono input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcmData {
    pub left: Vec<i16>,
    pub right: Option<Vec<i16>>,
}

impl PcmData {
    pub fn mono(samples: Vec<i16>) -> Self {
        Self {
            left: samples,
            right: None,
        }
    }

    pub fn stereo(left: Vec<i16>, right: Vec<i16>) -> Self {
        Self {
            left,
            right: Some(right),
        }
    }

    /// Split little-endian interleaved 16-bit bytes into per-channel buffers.
    ///
    /// A trailing partial frame is ignored.
    pub fn from_interleaved_le(bytes: &[u8], channels: u16) -> Self {
        let mut words = bytes
            .chunks_exact(2)
            .map(|w| i16::from_le_bytes([w[0], w[1]]));

        if channels == 2 {
            let frames = bytes.len() / 4;
            let mut left = Vec::with_capacity(frames);
            let mut right = Vec::with_capacity(frames);
            while let (Some(l), Some(r)) = (words.next(), words.next()) {
                left.push(l);
                right.push(r);
            }
            Self::stereo(left, right)
        } else {
            Self::mono(words.collect())
        }
    }

    pub fn channels(&self) -> u16 {
        if self.right.is_some() { 2 } else { 1 }
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    /// Interleave back into `L R L R ...` order (or a copy of `left` for mono).
    pub fn interleaved(&self) -> Vec<i16> {
        match &self.right {
            Some(right) => self
                .left
                .iter()
                .zip(right)
                .flat_map(|(&l, &r)| [l, r])
                .collect(),
            None => self.left.clone(),
        }
    }

    /// One `f32` buffer per channel, scaled to [-1.0, 1.0).
    pub fn planar_f32(&self) -> Vec<Vec<f32>> {
        let to_f32 = |ch: &[i16]| -> Vec<f32> { ch.iter().map(|&s| s as f32 / 32768.0).collect() };
        let mut planes = vec![to_f32(&self.left)];
        if let Some(right) = &self.right {
            planes.push(to_f32(right));
        }
        planes
    }
}

/// Convert a float sample back to 16-bit, clamping out-of-range values.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
