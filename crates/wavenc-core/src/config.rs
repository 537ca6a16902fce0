use std::fmt;
use std::path::PathBuf;

/// Output formats the engine can encode to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Mp3,
    #[default]
    Flac,
    Opus,
    Aac,
    Vorbis,
}

impl AudioFormat {
    /// Get the string identifier for this format
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Opus => "opus",
            AudioFormat::Aac => "aac",
            AudioFormat::Vorbis => "vorbis",
        }
    }

    /// File extension of encoded output, including the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => ".mp3",
            AudioFormat::Flac => ".flac",
            AudioFormat::Opus => ".opus",
            AudioFormat::Aac => ".aac",
            AudioFormat::Vorbis => ".ogg",
        }
    }

    /// List all formats
    pub fn all() -> &'static [AudioFormat] {
        &[
            AudioFormat::Flac,
            AudioFormat::Mp3,
            AudioFormat::Opus,
            AudioFormat::Aac,
            AudioFormat::Vorbis,
        ]
    }

    /// Human-readable display name for this format
    pub fn display_name(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "MP3",
            AudioFormat::Flac => "FLAC",
            AudioFormat::Opus => "Opus",
            AudioFormat::Aac => "AAC",
            AudioFormat::Vorbis => "Ogg Vorbis",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "flac" => Ok(AudioFormat::Flac),
            "opus" => Ok(AudioFormat::Opus),
            "aac" => Ok(AudioFormat::Aac),
            "vorbis" | "ogg" => Ok(AudioFormat::Vorbis),
            _ => Err(format!(
                "Unknown format: {}. Available: flac, mp3, opus, aac, vorbis",
                s
            )),
        }
    }
}

/// Container type accepted by the input scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputFormat {
    #[default]
    Wav,
    Mp3,
}

impl InputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Wav => "wav",
            InputFormat::Mp3 => "mp3",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            InputFormat::Wav => "WAV",
            InputFormat::Mp3 => "MP3",
        }
    }
}

/// Configuration for one scan and encode cycle.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub input_format: InputFormat,
    pub output_format: AudioFormat,
    /// Worker threads (at least 1)
    pub threads: usize,
    /// Print status events as they happen
    pub verbose: bool,
    pub output_dir: PathBuf,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            input_format: InputFormat::default(),
            output_format: AudioFormat::default(),
            threads: 1,
            verbose: false,
            output_dir: PathBuf::from("."),
        }
    }
}

impl EncoderConfig {
    /// Create a configuration for the given output format.
    pub fn new(output_format: AudioFormat) -> Self {
        Self {
            output_format,
            ..Self::default()
        }
    }

    pub fn with_input_format(mut self, input_format: InputFormat) -> Self {
        self.input_format = input_format;
        self
    }

    /// Set the worker thread count. Zero is raised to one.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("MP3".parse::<AudioFormat>(), Ok(AudioFormat::Mp3));
        assert_eq!("ogg".parse::<AudioFormat>(), Ok(AudioFormat::Vorbis));
        let err = "wma".parse::<AudioFormat>().unwrap_err();
        assert!(err.contains("Available: flac, mp3, opus, aac, vorbis"));
    }

    #[test]
    fn test_format_names_roundtrip() {
        for format in AudioFormat::all() {
            assert_eq!(format.as_str().parse::<AudioFormat>(), Ok(*format));
            assert!(format.extension().starts_with('.'));
        }
    }

    #[test]
    fn test_config_builder() {
        let config = EncoderConfig::new(AudioFormat::Opus)
            .with_threads(0)
            .with_verbose(true)
            .with_output_dir("/tmp/out")
            .with_input_format(InputFormat::Mp3);
        assert_eq!(config.output_format, AudioFormat::Opus);
        assert_eq!(config.threads, 1);
        assert!(config.verbose);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.input_format, InputFormat::Mp3);
        assert_eq!(EncoderConfig::default().output_format, AudioFormat::Flac);
    }
}
