//! Keep-only pruning of a live directory tree.
//!
//! Files to keep are first moved into a staging directory nested inside the
//! pruned directory, everything left behind is deleted, then the staged files
//! are moved back. Restoring and removing the staging directory happen in one
//! guard that runs on every exit path, including early returns and panics, so
//! a failure halfway through never loses a kept file.

use log::{error, info, warn};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::{PrepError, Result};
use crate::types::{FileFailure, PruneReport};
use crate::utils::{file_name_str, list_files, move_file};

pub const STAGING_PREFIX: &str = "yolo_sync_temp_";

/// Reduce `directory` (recursively) to exactly the files named in `keep`.
///
/// Names are matched against the file name only, wherever the file sits in the
/// tree. Kept files end up at their original location with their original
/// contents; every other file is deleted. Failures on individual files are
/// logged and collected in the report without stopping the sweep.
pub fn prune<S: AsRef<str>>(directory: &Path, keep: &[S]) -> Result<PruneReport> {
    if !directory.is_dir() {
        return Err(PrepError::MissingInput(directory.to_path_buf()));
    }
    let keep: HashSet<&str> = keep.iter().map(|name| name.as_ref()).collect();
    info!(
        "Pruning {} down to {} file name(s)",
        directory.display(),
        keep.len()
    );

    let mut report = PruneReport::default();
    let mut staging = StagingArea::create(directory)?;

    let files = list_files(directory, Some(staging.path()))?;
    stage_kept(&mut staging, files, &keep, &mut report);
    let files = list_files(directory, Some(staging.path()))?;
    delete_unkept(files, &keep, &mut report);

    let outcome = staging.release();
    report.restored = outcome.restored;
    let restore_failures = outcome.failures.len();
    report.failures.extend(outcome.failures);
    if let Some(path) = outcome.retained {
        return Err(PrepError::StagingRetained {
            path,
            count: restore_failures,
        });
    }

    report.print_summary(directory);
    Ok(report)
}

fn is_kept(path: &Path, keep: &HashSet<&str>) -> bool {
    file_name_str(path).is_some_and(|name| keep.contains(name))
}

fn stage_kept(
    staging: &mut StagingArea,
    files: Vec<PathBuf>,
    keep: &HashSet<&str>,
    report: &mut PruneReport,
) {
    for path in files {
        if !is_kept(&path, keep) {
            continue;
        }
        match staging.stage(&path) {
            Ok(()) => report.staged += 1,
            Err(e) => {
                error!("Failed to stage {}: {}", path.display(), e);
                report.failures.push(FileFailure::new(&path, e));
            }
        }
    }
}

// Symlinks are removed as links; their targets are never touched.
fn delete_unkept(files: Vec<PathBuf>, keep: &HashSet<&str>, report: &mut PruneReport) {
    for path in files {
        // A kept file is only still here if staging it failed
        if is_kept(&path, keep) {
            warn!("Leaving unstaged kept file in place: {}", path.display());
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => report.deleted += 1,
            Err(e) => {
                error!("Failed to delete {}: {}", path.display(), e);
                report.failures.push(FileFailure::new(&path, e));
            }
        }
    }
}

#[derive(Debug, Default)]
struct ReleaseOutcome {
    restored: usize,
    failures: Vec<FileFailure>,
    retained: Option<PathBuf>,
}

/// Staging directory owned by a single prune call.
///
/// Staged files keep their path relative to the pruned root, so two kept files
/// with the same name in different subdirectories never collide.
struct StagingArea {
    root: PathBuf,
    path: PathBuf,
    dir: Option<TempDir>,
    // (staged, original)
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagingArea {
    fn create(root: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)
            .map_err(|e| PrepError::io(root, e))?;
        let path = dir.path().to_path_buf();
        info!("Created staging directory {}", path.display());
        Ok(Self {
            root: root.to_path_buf(),
            path,
            dir: Some(dir),
            staged: Vec::new(),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn stage(&mut self, original: &Path) -> io::Result<()> {
        let relative = match original.strip_prefix(&self.root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => PathBuf::from(original.file_name().unwrap_or_default()),
        };
        let staged = self.path.join(relative);
        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent)?;
        }
        move_file(original, &staged)?;
        self.staged.push((staged, original.to_path_buf()));
        Ok(())
    }

    /// Move every staged file back, then delete the staging directory.
    ///
    /// The directory is kept when any file could not be restored, since it then
    /// holds the only copy. Calling this twice is harmless.
    fn release(&mut self) -> ReleaseOutcome {
        let mut outcome = ReleaseOutcome::default();

        for (staged, original) in self.staged.drain(..) {
            let restored = match original.parent() {
                Some(parent) => fs::create_dir_all(parent),
                None => Ok(()),
            }
            .and_then(|_| move_file(&staged, &original));
            match restored {
                Ok(()) => outcome.restored += 1,
                Err(e) => {
                    error!(
                        "Failed to restore {} to {}: {}",
                        staged.display(),
                        original.display(),
                        e
                    );
                    outcome.failures.push(FileFailure::new(&original, e));
                }
            }
        }

        if let Some(dir) = self.dir.take() {
            if outcome.failures.is_empty() {
                if let Err(e) = dir.close() {
                    warn!(
                        "Failed to remove staging directory {}: {}",
                        self.path.display(),
                        e
                    );
                } else {
                    info!("Removed staging directory {}", self.path.display());
                }
            } else {
                let kept = dir.keep();
                error!(
                    "Staging directory retained with unrestored files: {}",
                    kept.display()
                );
                outcome.retained = Some(kept);
            }
        }
        outcome
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if self.dir.is_some() {
            warn!(
                "Prune of {} interrupted, restoring staged files",
                self.root.display()
            );
            self.release();
        }
    }
}
