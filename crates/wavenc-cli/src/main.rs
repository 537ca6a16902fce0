//! `wavenc`: batch-encode a directory of WAV files.
//!
//! ```text
//! wavenc -i <INPUT_DIR> -o <OUTPUT_DIR> [-f flac|mp3|opus|aac|vorbis] [-j THREADS] [-v]
//! ```

mod app;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Encode every valid WAV file in a directory to MP3, FLAC, Opus, AAC or Vorbis.
#[derive(Parser, Debug)]
#[command(name = "wavenc", version, about, long_about = None)]
pub struct Args {
    /// Directory to scan for WAV files (must exist)
    #[arg(short, long, value_name = "DIR")]
    pub input: PathBuf,

    /// Directory encoded files are written to (created if missing)
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Output format: flac, mp3, opus, aac or vorbis
    #[arg(short, long, default_value = "flac")]
    pub format: String,

    /// Worker threads, between 1 and the number of hardware threads
    #[arg(
        short = 'j',
        long,
        value_parser = app::parse_threads,
        default_value_t = app::default_threads()
    )]
    pub threads: usize,

    /// Print every status event and codec diagnostics
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    match app::run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
