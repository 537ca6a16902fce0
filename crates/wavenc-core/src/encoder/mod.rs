//! Per-format encoders and the scan/encode driver built on them.

#[cfg(feature = "aac")]
mod aac;
#[cfg(feature = "flac")]
mod flac;
#[cfg(feature = "mp3")]
mod mp3;
#[cfg(feature = "opus")]
mod opus;
#[cfg(feature = "vorbis")]
mod vorbis;

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::config::{AudioFormat, EncoderConfig};
use crate::container::wav::{self, WavError, WaveHeader};
use crate::engine::{
    CancelHandle, Dispatcher, RunState, RunSummary, StatusEvent, scan_directory,
};
use crate::error::{EncoderError, Result};
use crate::pcm::PcmData;

/// Trait for encoding validated PCM to one compressed format.
pub trait AudioEncoder: Send + Sync {
    fn format(&self) -> AudioFormat;

    /// Codec library name and version
    fn version(&self) -> &str;

    /// Encode one file's PCM.
    ///
    /// # Parameters
    /// - `header`: validated header of the source file (rate, channels)
    /// - `pcm`: deinterleaved 16-bit samples
    ///
    /// # Returns
    /// The complete encoded file contents
    fn encode(&self, header: &WaveHeader, pcm: &PcmData) -> Result<Vec<u8>>;
}

/// Create the encoder for `format`.
///
/// Fails with `NotImplemented` when the format's cargo feature is disabled.
pub fn create_codec(format: AudioFormat) -> Result<Box<dyn AudioEncoder>> {
    match format {
        #[cfg(feature = "mp3")]
        AudioFormat::Mp3 => Ok(Box::new(mp3::Mp3Encoder::new())),
        #[cfg(feature = "flac")]
        AudioFormat::Flac => Ok(Box::new(flac::FlacEncoder::new())),
        #[cfg(feature = "opus")]
        AudioFormat::Opus => Ok(Box::new(opus::OpusEncoder::new())),
        #[cfg(feature = "vorbis")]
        AudioFormat::Vorbis => Ok(Box::new(vorbis::VorbisEncoder::new())),
        #[cfg(feature = "aac")]
        AudioFormat::Aac => Ok(Box::new(aac::AacEncoder::new())),
        #[allow(unreachable_patterns)]
        other => Err(EncoderError::NotImplemented(
            other.display_name().to_string(),
        )),
    }
}

/// Formats compiled into this build.
pub fn available_formats() -> Vec<AudioFormat> {
    AudioFormat::all()
        .iter()
        .copied()
        .filter(|format| is_compiled(*format))
        .collect()
}

/// Whether the cargo feature for `format` is enabled.
fn is_compiled(format: AudioFormat) -> bool {
    match format {
        AudioFormat::Mp3 => cfg!(feature = "mp3"),
        AudioFormat::Flac => cfg!(feature = "flac"),
        AudioFormat::Opus => cfg!(feature = "opus"),
        AudioFormat::Vorbis => cfg!(feature = "vorbis"),
        AudioFormat::Aac => cfg!(feature = "aac"),
    }
}

/// Create an [`Encoder`] for `config.output_format`.
pub fn create_encoder(config: EncoderConfig) -> Result<Encoder> {
    let codec = create_codec(config.output_format)?;
    Ok(Encoder::new(config, codec))
}

/// Output file name: everything from the last `.` of `file_name` is replaced
/// by `extension`; names without a `.` get `extension` appended.
pub fn output_file_name(file_name: &str, extension: &str) -> String {
    match file_name.rfind('.') {
        Some(dot) => format!("{}{}", &file_name[..dot], extension),
        None => format!("{file_name}{extension}"),
    }
}

/// `output_dir` joined with the output file name for `input`.
///
/// The basename is cut on its raw bytes, so non-UTF-8 names are kept intact.
pub fn output_path(output_dir: &Path, input: &Path, extension: &str) -> PathBuf {
    let file_name = input.file_name().unwrap_or_default();
    let bytes = file_name.as_encoded_bytes();
    let stem = match bytes.iter().rposition(|&b| b == b'.') {
        // SAFETY: the split is right before an ASCII '.', a valid boundary of
        // bytes obtained from `as_encoded_bytes`.
        Some(dot) => unsafe { OsStr::from_encoded_bytes_unchecked(&bytes[..dot]) },
        None => file_name,
    };
    let mut name: OsString = stem.to_os_string();
    name.push(extension);
    output_dir.join(name)
}

/// Scans one input directory and encodes every valid file in it.
pub struct Encoder {
    config: EncoderConfig,
    codec: Box<dyn AudioEncoder>,
    input_files: Vec<PathBuf>,
    dispatcher: Dispatcher,
}

impl Encoder {
    pub fn new(config: EncoderConfig, codec: Box<dyn AudioEncoder>) -> Self {
        let dispatcher = Dispatcher::new(config.threads, config.verbose);
        Self {
            config,
            codec,
            input_files: Vec::new(),
            dispatcher,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.codec.format()
    }

    /// Find every valid input file under `dir`, replacing any earlier scan.
    pub fn scan_input_directory(&mut self, dir: &Path) -> Result<()> {
        self.dispatcher.set_state(RunState::Scanning);
        match scan_directory(dir, self.config.input_format) {
            Ok(files) => {
                log::info!("Found {} input files in {}", files.len(), dir.display());
                self.input_files = files;
                self.dispatcher.set_state(RunState::Ready);
                Ok(())
            }
            Err(e) => {
                self.input_files.clear();
                self.dispatcher.set_state(RunState::Idle);
                Err(e)
            }
        }
    }

    pub fn set_output_directory(&mut self, dir: impl Into<PathBuf>) {
        self.config.output_dir = dir.into();
    }

    pub fn output_directory(&self) -> &Path {
        &self.config.output_dir
    }

    pub fn input_files(&self) -> &[PathBuf] {
        &self.input_files
    }

    pub fn encoder_version(&self) -> &str {
        self.codec.version()
    }

    pub fn state(&self) -> RunState {
        self.dispatcher.state()
    }

    /// Every status event recorded so far.
    pub fn status_log(&self) -> Vec<StatusEvent> {
        self.dispatcher.status().snapshot()
    }

    /// Encode every scanned file on the worker pool. Blocks until done.
    ///
    /// Per-file failures are reported as `"Error"` status events and counted
    /// in the summary; only run-level failures return `Err`.
    pub fn start_encoding(&self) -> Result<RunSummary> {
        let output_dir = self.config.output_dir.as_path();
        self.dispatcher
            .run(&self.input_files, |input, thread_id, status| {
                let record = |event: StatusEvent| status.push(event);
                self.process_single_file(input, output_dir, thread_id, &record)
            })
    }

    /// Ask workers to stop claiming files. Files already claimed finish.
    pub fn cancel_encoding(&self) -> RunState {
        self.dispatcher.cancel()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.dispatcher.cancel_handle()
    }

    /// Validate, decode and encode one file into `output_dir`.
    pub fn process_single_file(
        &self,
        input: &Path,
        output_dir: &Path,
        thread_id: u32,
        status_cb: &dyn Fn(StatusEvent),
    ) -> Result<()> {
        status_cb(StatusEvent::processing(thread_id, input));
        match self.encode_file(input, output_dir) {
            Ok(output) => {
                status_cb(StatusEvent::complete(input, &output));
                Ok(())
            }
            Err(e) => {
                crate::verbose!("[{}] {}: {}", self.format(), input.display(), e);
                status_cb(StatusEvent::error(&e, input));
                Err(e)
            }
        }
    }

    fn encode_file(&self, input: &Path, output_dir: &Path) -> Result<PathBuf> {
        let header = wav::validate(input).map_err(|e| EncoderError::WavInvalid {
            path: input.to_path_buf(),
            reason: e.to_string(),
        })?;

        let pcm = wav::get_wave_data(&header, input).map_err(|e| match e {
            WavError::UnsupportedBitDepth(_) => EncoderError::WavInvalid {
                path: input.to_path_buf(),
                reason: e.to_string(),
            },
            _ => EncoderError::ReadFile {
                path: input.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        let output = output_path(output_dir, input, self.format().extension());
        let encoded = self.codec.encode(&header, &pcm)?;
        std::fs::write(&output, encoded)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::wav::tests::wav_bytes;
    use std::sync::Mutex;

    /// Writes the PCM frame count so tests can check what reached the codec.
    struct CountingEncoder;

    impl AudioEncoder for CountingEncoder {
        fn format(&self) -> AudioFormat {
            AudioFormat::Flac
        }

        fn version(&self) -> &str {
            "counting 1.0"
        }

        fn encode(&self, header: &WaveHeader, pcm: &PcmData) -> Result<Vec<u8>> {
            if header.sample_rate == 12345 {
                return Err(EncoderError::Flac("unsupported rate".into()));
            }
            Ok(format!("{} {}", pcm.channels(), pcm.frames()).into_bytes())
        }
    }

    fn counting_encoder(output_dir: &Path, threads: usize) -> Encoder {
        let config = EncoderConfig::new(AudioFormat::Flac)
            .with_threads(threads)
            .with_output_dir(output_dir);
        Encoder::new(config, Box::new(CountingEncoder))
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("track.master.wav", ".mp3"), "track.master.mp3");
        assert_eq!(output_file_name("track", ".flac"), "track.flac");
        assert_eq!(output_file_name("track.wav", ".ogg"), "track.ogg");
        assert_eq!(output_file_name(".wav", ".opus"), ".opus");
        assert_eq!(output_file_name("", ".aac"), ".aac");
    }

    #[test]
    fn test_output_path_uses_basename_only() {
        let path = output_path(Path::new("/out"), Path::new("/in/deep/a.b.wav"), ".mp3");
        assert_eq!(path, PathBuf::from("/out/a.b.mp3"));
    }

    #[test]
    fn test_output_path_matches_name_rule() {
        for name in ["track.master.wav", "track", ".wav", "a.b.c"] {
            let path = output_path(Path::new("/out"), &Path::new("/in").join(name), ".flac");
            assert_eq!(
                path.file_name().unwrap().to_str().unwrap(),
                output_file_name(name, ".flac")
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_output_path_keeps_non_utf8_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let input = Path::new("/in").join(OsStr::from_bytes(b"caf\xe9.take.wav"));
        let path = output_path(Path::new("/out"), &input, ".mp3");
        assert_eq!(path.file_name().unwrap().as_bytes(), b"caf\xe9.take.mp3");
    }

    #[cfg(all(
        feature = "mp3",
        feature = "flac",
        feature = "opus",
        feature = "vorbis",
        feature = "aac"
    ))]
    #[test]
    fn test_default_build_lists_every_format() {
        assert_eq!(available_formats(), AudioFormat::all().to_vec());
    }

    #[test]
    fn test_scan_and_encode_directory() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("one.wav"), wav_bytes(2, 44100, 16, &[], &[0; 8])).unwrap();
        std::fs::write(input.path().join("two.wav"), wav_bytes(1, 8000, 16, &[], &[0; 6])).unwrap();
        std::fs::write(input.path().join("bad.wav"), b"definitely not a wav file, too short").unwrap();

        let mut encoder = counting_encoder(output.path(), 2);
        assert_eq!(encoder.state(), RunState::Idle);
        encoder.scan_input_directory(input.path()).unwrap();
        assert_eq!(encoder.state(), RunState::Ready);
        assert_eq!(encoder.input_files().len(), 2);
        assert_eq!(encoder.encoder_version(), "counting 1.0");

        let summary = encoder.start_encoding().unwrap();
        assert_eq!(summary.succeeded, 2);
        assert_eq!(encoder.state(), RunState::Completed);
        assert_eq!(
            std::fs::read_to_string(output.path().join("one.flac")).unwrap(),
            "2 2"
        );
        assert_eq!(
            std::fs::read_to_string(output.path().join("two.flac")).unwrap(),
            "1 3"
        );

        let events = encoder.status_log();
        assert_eq!(events.iter().filter(|e| e.is_complete()).count(), 2);
        assert_eq!(events.iter().filter(|e| e.key.starts_with("Thread ")).count(), 2);
    }

    #[test]
    fn test_per_file_errors_are_status_events() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("odd.wav"), wav_bytes(1, 12345, 16, &[], &[0; 2])).unwrap();
        std::fs::write(input.path().join("ok.wav"), wav_bytes(1, 8000, 16, &[], &[0; 2])).unwrap();

        let mut encoder = counting_encoder(output.path(), 1);
        encoder.scan_input_directory(input.path()).unwrap();
        let summary = encoder.start_encoding().unwrap();
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.failed, 1);

        let errors: Vec<_> = encoder
            .status_log()
            .into_iter()
            .filter(StatusEvent::is_error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].value.starts_with("FLAC error: unsupported rate: "));
        assert!(errors[0].value.ends_with("odd.wav"));
        assert!(!output.path().join("odd.flac").exists());
    }

    #[test]
    fn test_process_single_file_error_paths() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = counting_encoder(dir.path(), 1);
        let events = Mutex::new(Vec::new());
        let record = |event: StatusEvent| events.lock().unwrap().push(event);

        let garbage = dir.path().join("garbage.wav");
        std::fs::write(&garbage, [0u8; 100]).unwrap();
        let result = encoder.process_single_file(&garbage, dir.path(), 3, &record);
        assert!(matches!(result, Err(EncoderError::WavInvalid { .. })));

        let wide = dir.path().join("wide.wav");
        std::fs::write(&wide, wav_bytes(2, 48000, 24, &[], &[0; 12])).unwrap();
        let result = encoder.process_single_file(&wide, dir.path(), 3, &record);
        assert!(matches!(result, Err(EncoderError::WavInvalid { .. })));

        let missing_dir = dir.path().join("missing");
        let ok = dir.path().join("ok.wav");
        std::fs::write(&ok, wav_bytes(1, 8000, 16, &[], &[0; 2])).unwrap();
        let result = encoder.process_single_file(&ok, &missing_dir, 3, &record);
        assert!(matches!(result, Err(EncoderError::Io(_))));

        let events = events.into_inner().unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(events[0].key, "Thread 3");
        assert!(events[1].is_error());
        assert!(events[5].is_error());
    }

    #[test]
    fn test_scan_failure_resets_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = counting_encoder(dir.path(), 1);
        let result = encoder.scan_input_directory(&dir.path().join("absent"));
        assert!(matches!(result, Err(EncoderError::NotFound(_))));
        assert_eq!(encoder.state(), RunState::Idle);
        assert!(matches!(
            encoder.start_encoding(),
            Err(EncoderError::NotFound(_))
        ));
    }

    #[test]
    fn test_cancel_encoding_returns_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = counting_encoder(dir.path(), 1);
        assert_eq!(encoder.cancel_encoding(), RunState::Cancelled);
        assert!(encoder.cancel_handle().is_cancelled());
    }

    #[test]
    fn test_set_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = counting_encoder(dir.path(), 1);
        encoder.set_output_directory("/elsewhere");
        assert_eq!(encoder.output_directory(), Path::new("/elsewhere"));
    }

    #[test]
    fn test_available_formats_match_factory() {
        for format in AudioFormat::all() {
            let expected = available_formats().contains(format);
            match create_codec(*format) {
                Ok(codec) => {
                    assert!(expected);
                    assert_eq!(codec.format(), *format);
                    assert!(!codec.version().is_empty());
                }
                Err(e) => {
                    assert!(!expected);
                    assert!(matches!(e, EncoderError::NotImplemented(_)));
                }
            }
        }
    }
}
