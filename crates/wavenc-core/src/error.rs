//! Error types for the encode engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by scanning, per-file encoding and the dispatcher.
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid WAV: {reason}")]
    WavInvalid { path: PathBuf, reason: String },

    #[error("Failed to read PCM data: {reason}")]
    ReadFile { path: PathBuf, reason: String },

    #[error("LAME error: {0}")]
    Lame(String),

    #[error("Opus error: {0}")]
    Opus(String),

    #[error("FLAC error: {0}")]
    Flac(String),

    #[error("Vorbis error: {0}")]
    Vorbis(String),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create worker thread: {0}")]
    ThreadCreate(std::io::Error),

    #[error("Worker thread {0} panicked")]
    ThreadJoin(u32),

    #[error("Encoding cancelled")]
    Cancelled,

    #[error("No encoder available for {0}")]
    NotImplemented(String),
}

pub type Result<T, E = EncoderError> = std::result::Result<T, E>;
