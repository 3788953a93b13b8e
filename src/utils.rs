use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DatasetError;

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Create `path` and its parents if missing. Existing contents are kept.
pub fn ensure_directory(path: &Path) -> Result<PathBuf, DatasetError> {
    fs::create_dir_all(path).map_err(DatasetError::io(path))?;
    Ok(path.to_path_buf())
}

/// Absolute form of `path`, which must exist.
pub fn absolute_path(path: &Path) -> Result<PathBuf, DatasetError> {
    fs::canonicalize(path).map_err(DatasetError::io(path))
}

/// Sorted list of files matching a glob pattern. Unreadable entries are skipped.
pub fn glob_files(pattern: &str) -> Result<Vec<PathBuf>, DatasetError> {
    let entries = glob::glob(pattern).map_err(|source| DatasetError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Skipping unreadable glob entry: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}
