//! Binary container parsers for encoder input.

pub mod bytes;
pub mod mp3;
pub mod wav;

pub use mp3::{Id3Tag, Mp3Header, Mp3Info, MpegVersion};
pub use wav::{WavError, WaveHeader, get_wave_data};
