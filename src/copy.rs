use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{PrepError, Result};
use crate::types::{CopyStats, FileFailure};
use crate::utils::{create_progress_bar, ensure_dir, file_name_str, list_files};

/// Case-insensitive substring matcher for file names, e.g. `"meta"`.
///
/// An empty pattern matches nothing.
pub fn name_contains(pattern: &str) -> impl Fn(&str) -> bool {
    let pattern = pattern.to_lowercase();
    move |name: &str| !pattern.is_empty() && name.to_lowercase().contains(&pattern)
}

/// Copy every file under `source` directly into `dest`, dropping the directory
/// structure. Names matched by `exclude` are skipped. A file that fails to copy
/// is logged and counted, and the rest of the batch carries on.
///
/// Symlinked files are copied through the link. When two source folders hold
/// the same file name, the later one replaces the earlier copy and the
/// collision is logged and counted in `overwritten`.
pub fn copy_flat<F>(source: &Path, dest: &Path, exclude: F) -> Result<CopyStats>
where
    F: Fn(&str) -> bool,
{
    if !source.is_dir() {
        return Err(PrepError::MissingInput(source.to_path_buf()));
    }
    ensure_dir(dest)?;
    info!("Copying {} into {}", source.display(), dest.display());

    let files = list_files(source, None)?;
    let pb = create_progress_bar(files.len() as u64, "Copy");
    let mut stats = CopyStats::default();
    let mut copied_from: HashMap<String, &Path> = HashMap::new();

    for path in &files {
        pb.inc(1);
        let Some(name) = file_name_str(path) else {
            stats
                .failures
                .push(FileFailure::new(path, "file name is not valid UTF-8"));
            continue;
        };
        if exclude(name) {
            stats.excluded += 1;
            continue;
        }
        if path.is_dir() {
            debug!("Skipping symlinked directory {}", path.display());
            continue;
        }
        match fs::copy(path, dest.join(name)) {
            Ok(_) => {
                stats.copied += 1;
                if let Some(previous) = copied_from.insert(name.to_string(), path) {
                    warn!(
                        "{} overwrote {} in {}",
                        path.display(),
                        previous.display(),
                        dest.display()
                    );
                    stats.overwritten += 1;
                }
            }
            Err(e) => {
                error!("Failed to copy {}: {}", path.display(), e);
                stats.failures.push(FileFailure::new(path, e));
            }
        }
    }
    pb.finish_with_message("Copy complete");

    stats.print_summary(dest);
    Ok(stats)
}
