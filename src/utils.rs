use indicatif::{ProgressBar, ProgressStyle};
use jwalk::WalkDir;
use log::warn;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{PrepError, Result};

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

/// Create a directory (and its parents) if it does not exist yet
pub fn ensure_dir(path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(path).map_err(|e| PrepError::io(path, e))?;
    Ok(path.to_path_buf())
}

/// Final path component as UTF-8, if it has one
pub fn file_name_str(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// Collect every file below `root`, sorted by path.
///
/// Symlinks are listed as entries of their own and never followed, so a
/// caller deleting what it gets back removes the link and not its target.
/// Entries under `exclude` are left out. The walk finishes before the list is
/// returned, so callers may freely move or delete what they get back.
/// Unreadable entries are logged and skipped.
pub fn list_files(root: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(PrepError::MissingInput(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).skip_hidden(false).sort(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        if exclude.is_some_and(|skip| path.starts_with(skip)) {
            continue;
        }
        files.push(path);
    }
    Ok(files)
}

/// File names (without directories) of every file below `root`
pub fn list_file_names(root: &Path) -> Result<Vec<String>> {
    Ok(list_files(root, None)?
        .iter()
        .filter_map(|path| file_name_str(path).map(str::to_owned))
        .collect())
}

/// Move a file, falling back to copy + remove when a rename is not possible
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if !from.is_file() {
                return Err(rename_err);
            }
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}
