use anyhow::{Context, Result, bail};
use wavenc_core::{
    AudioFormat, EncoderConfig, EncoderError, RunSummary, StatusEvent, create_encoder,
};

use crate::Args;

/// Hardware threads reported by the OS, at least 1.
pub fn hardware_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Half of the hardware threads, at least 1.
pub fn default_threads() -> usize {
    (hardware_threads() / 2).max(1)
}

/// Parse `-j`, rejecting values outside `1..=hardware_threads()`.
pub fn parse_threads(value: &str) -> Result<usize, String> {
    let max = hardware_threads();
    let threads: usize = value
        .parse()
        .map_err(|_| format!("`{value}` is not a thread count"))?;
    if (1..=max).contains(&threads) {
        Ok(threads)
    } else {
        Err(format!("thread count must be between 1 and {max}"))
    }
}

pub fn run(args: &Args) -> Result<()> {
    if !args.input.is_dir() {
        bail!("Input directory {} does not exist", args.input.display());
    }
    std::fs::create_dir_all(&args.output).with_context(|| {
        format!("Failed to create output directory {}", args.output.display())
    })?;

    let format: AudioFormat = args.format.parse().map_err(anyhow::Error::msg)?;

    wavenc_core::set_verbose(args.verbose);
    log::debug!(
        "input={} output={} format={} threads={}",
        args.input.display(),
        args.output.display(),
        format,
        args.threads
    );

    let config = EncoderConfig::new(format)
        .with_threads(args.threads)
        .with_verbose(args.verbose)
        .with_output_dir(&args.output);
    let input_label = config.input_format.display_name();
    let mut encoder = create_encoder(config)
        .with_context(|| format!("{} output is not available in this build", format.display_name()))?;

    match encoder.scan_input_directory(&args.input) {
        Ok(()) => {}
        Err(EncoderError::NotFound(_)) => {
            println!(
                "No valid {input_label} files found in {}",
                args.input.display()
            );
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to scan input directory"),
    }

    println!(
        "Found {} valid {input_label} files to be encoded using {}:",
        encoder.input_files().len(),
        encoder.encoder_version()
    );
    for file in encoder.input_files() {
        println!("  {}", file.display());
    }

    let summary = encoder.start_encoding().context("Encoding failed")?;
    print_summary(&summary, &encoder.status_log());
    summary.into_result().context("Encoding was cancelled")?;
    Ok(())
}

fn print_summary(summary: &RunSummary, events: &[StatusEvent]) {
    println!("Encoded {}/{} files", summary.succeeded, summary.attempted);
    let failures: Vec<_> = events.iter().filter(|e| e.is_error()).collect();
    if !failures.is_empty() {
        eprintln!("Failed:");
        for event in failures {
            eprintln!("  {}", event.value);
        }
    }
}
