pub mod config;
pub mod container;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod pcm;
pub mod probe;
#[cfg(feature = "opus")]
pub mod resample;
pub mod verbose;

#[doc(hidden)]
pub use log;

pub use config::{AudioFormat, EncoderConfig, InputFormat};
pub use container::{WaveHeader, get_wave_data};
pub use encoder::{
    AudioEncoder, Encoder, available_formats, create_codec, create_encoder, output_file_name,
};
pub use engine::{CancelHandle, RunState, RunSummary, StatusEvent};
pub use error::{EncoderError, Result};
pub use pcm::PcmData;
pub use probe::detect_format;
pub use verbose::set_verbose;
