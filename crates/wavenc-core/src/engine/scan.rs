//! Recursive input discovery filtered by container validation.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::InputFormat;
use crate::container::{mp3, wav};
use crate::error::{EncoderError, Result};

/// Collect every file under `dir` that validates as `format`, sorted by path.
///
/// Fails with `NotFound` if `dir` is not a directory or nothing valid is found.
pub fn scan_directory(dir: &Path, format: InputFormat) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(EncoderError::NotFound(format!(
            "input directory {} does not exist",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_valid_input(path, format))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(EncoderError::NotFound(format!(
            "no valid {} files in {}",
            format.display_name(),
            dir.display()
        )));
    }
    Ok(files)
}

/// Whether `path` passes the validator for `format`.
pub fn is_valid_input(path: &Path, format: InputFormat) -> bool {
    let verdict = match format {
        InputFormat::Wav => wav::validate(path).map(|_| ()).map_err(|e| e.to_string()),
        InputFormat::Mp3 => mp3::validate(path).map(|_| ()).map_err(|e| e.to_string()),
    };
    match verdict {
        Ok(()) => true,
        Err(reason) => {
            crate::verbose!("Skipping {}: {}", path.display(), reason);
            false
        }
    }
}
