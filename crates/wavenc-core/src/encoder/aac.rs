//! AAC encoding through an external FFmpeg process.
//!
//! There is no maintained Rust AAC encoder, so raw PCM is piped to `ffmpeg`
//! and the ADTS stream it writes is read back from a temporary file.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use super::AudioEncoder;
use crate::config::AudioFormat;
use crate::container::WaveHeader;
use crate::error::{EncoderError, Result};
use crate::pcm::PcmData;

const FFMPEG: &str = "ffmpeg";

const BITRATE: &str = "128k";

/// Preferred over the native `aac` encoder when FFmpeg was built with it
const FDK_CODEC: &str = "libfdk_aac";
const NATIVE_CODEC: &str = "aac";

/// Bytes written to ffmpeg's stdin per call
const PIPE_CHUNK: usize = 64 * 1024;

/// AAC-LC encoder at 128 kbps with ADTS framing.
pub struct AacEncoder {
    codec: &'static str,
    version: String,
}

impl AacEncoder {
    /// Probe the installed FFmpeg for its version and AAC encoders.
    ///
    /// A missing FFmpeg is not an error here; encoding will fail instead.
    pub fn new() -> Self {
        let version = probe_version()
            .map(|line| format!("{line} (AAC)"))
            .unwrap_or_else(|| "FFmpeg AAC (ffmpeg not found)".to_string());
        let codec = if has_fdk_aac() { FDK_CODEC } else { NATIVE_CODEC };
        crate::verbose!("[aac] using {} via {}", codec, version);
        Self { codec, version }
    }

    pub fn codec(&self) -> &str {
        self.codec
    }
}

impl Default for AacEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// First line of `ffmpeg -version`, e.g. "ffmpeg version 6.1.1".
fn probe_version() -> Option<String> {
    let output = Command::new(FFMPEG)
        .arg("-version")
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().next()?;
    // Drop the trailing copyright notice
    let version = line.split(" Copyright").next().unwrap_or(line).trim();
    (!version.is_empty()).then(|| version.to_string())
}

fn has_fdk_aac() -> bool {
    Command::new(FFMPEG)
        .args(["-hide_banner", "-encoders"])
        .stderr(Stdio::null())
        .output()
        .map(|output| String::from_utf8_lossy(&output.stdout).contains(FDK_CODEC))
        .unwrap_or(false)
}

/// Run `program` with `input` on its stdin and wait for it to exit.
///
/// stderr is drained on a separate thread so a chatty child cannot block on a
/// full pipe while stdin is still being written. The child is always waited
/// on, and its stderr is part of every failure message.
fn run_piped(program: &str, args: &[&str], input: &[u8]) -> Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| EncoderError::Ffmpeg(format!("Failed to spawn {program}: {e}")))?;

    let stderr_reader = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        })
    });

    let write_result = match child.stdin.take() {
        Some(mut stdin) => input
            .chunks(PIPE_CHUNK)
            .try_for_each(|chunk| stdin.write_all(chunk)),
        None => Ok(()),
    };
    // stdin is closed here, so the child sees end of input

    let status = child
        .wait()
        .map_err(|e| EncoderError::Ffmpeg(format!("{program} did not finish: {e}")))?;
    let stderr = stderr_reader
        .and_then(|reader| reader.join().ok())
        .unwrap_or_default();
    let stderr = stderr.trim();

    if !status.success() {
        return Err(EncoderError::Ffmpeg(format!(
            "{program} AAC encoding failed ({status}): {stderr}"
        )));
    }
    write_result.map_err(|e| {
        EncoderError::Ffmpeg(format!("Failed to write PCM to {program}: {e}: {stderr}"))
    })
}

impl AudioEncoder for AacEncoder {
    fn format(&self) -> AudioFormat {
        AudioFormat::Aac
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn encode(&self, header: &WaveHeader, pcm: &PcmData) -> Result<Vec<u8>> {
        let output_file = tempfile::Builder::new()
            .prefix("wavenc_")
            .suffix(".aac")
            .tempfile()
            .map_err(|e| EncoderError::Ffmpeg(format!("Failed to create temp file: {e}")))?;
        let output_path = output_file.path().to_string_lossy().into_owned();

        let sample_rate = header.sample_rate.to_string();
        let channels = pcm.channels().to_string();

        let args: &[&str] = &[
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "s16le",
            "-ar",
            &sample_rate,
            "-ac",
            &channels,
            "-i",
            "pipe:0",
            "-c:a",
            self.codec,
            "-b:a",
            BITRATE,
            "-f",
            "adts",
            "-y",
            &output_path,
        ];
        let pcm_bytes: Vec<u8> = pcm
            .interleaved()
            .into_iter()
            .flat_map(i16::to_le_bytes)
            .collect();
        run_piped(FFMPEG, args, &pcm_bytes)?;

        let aac_data = std::fs::read(output_file.path())
            .map_err(|e| EncoderError::Ffmpeg(format!("Failed to read encoded AAC: {e}")))?;
        crate::verbose!("[aac] encoded {:.1} KB", aac_data.len() as f64 / 1024.0);

        Ok(aac_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::wav::{tests::wav_bytes, validate_bytes};
    use crate::probe::detect_format;

    #[test]
    fn test_version_is_never_empty() {
        let encoder = AacEncoder::new();
        assert!(!encoder.version().is_empty());
        assert!([FDK_CODEC, NATIVE_CODEC].contains(&encoder.codec()));
    }

    #[cfg(unix)]
    #[test]
    fn test_early_exit_reports_stderr_and_reaps_child() {
        // Far more than a pipe buffer, so writing fails once the child is gone
        let input = vec![0u8; 4 * 1024 * 1024];
        let err = run_piped("sh", &["-c", "echo unknown encoder >&2; exit 3"], &input)
            .unwrap_err();
        let EncoderError::Ffmpeg(message) = err else {
            panic!("unexpected error: {err}");
        };
        assert!(message.contains("unknown encoder"), "{message}");
        assert!(!message.contains("Broken pipe"), "{message}");
    }

    #[cfg(unix)]
    #[test]
    fn test_chatty_stderr_does_not_block_stdin() {
        let input = vec![0u8; 1024 * 1024];
        let script = "head -c 300000 /dev/zero | tr '\\0' x >&2; cat > /dev/null";
        run_piped("sh", &["-c", script], &input).unwrap();
    }

    #[test]
    fn test_missing_program_is_ffmpeg_error() {
        let err = run_piped("wavenc-no-such-binary", &[], &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, EncoderError::Ffmpeg(_)));
    }

    #[test]
    fn test_encode_when_ffmpeg_available() {
        if probe_version().is_none() {
            eprintln!("ffmpeg not installed, skipping");
            return;
        }
        let header = validate_bytes(&wav_bytes(2, 44100, 16, &[], &[])).unwrap();
        let left: Vec<i16> = (0..44100)
            .map(|i| ((i as f32 * 0.04).sin() * 9000.0) as i16)
            .collect();
        let pcm = PcmData::stereo(left.clone(), left);

        let aac = AacEncoder::new().encode(&header, &pcm).unwrap();
        assert_eq!(detect_format(&aac), Some(AudioFormat::Aac));
    }
}
