use image::imageops::FilterType;
use log::{error, info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use crate::error::{PrepError, Result};
use crate::types::{ResizeStats, RESIZE_FORMATS};
use crate::utils::create_progress_bar;

fn is_resizable(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| RESIZE_FORMATS.contains(&ext.to_lowercase().as_str()))
}

fn resize_one(path: &Path, size: (u32, u32)) -> Result<()> {
    let img = image::open(path).map_err(|source| PrepError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    img.resize_exact(size.0, size.1, FilterType::Triangle)
        .save(path)
        .map_err(|source| PrepError::Image {
            path: path.to_path_buf(),
            source,
        })
}

/// Resize every JPEG directly inside `dir` to exactly `size`, overwriting the
/// originals. Images that cannot be read or written are logged and skipped.
pub fn resize_images(dir: &Path, size: (u32, u32)) -> Result<ResizeStats> {
    let entries = fs::read_dir(dir).map_err(|e| PrepError::io(dir, e))?;
    let images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_resizable(path))
        .collect();

    if images.is_empty() {
        warn!("No JPG/JPEG images found in {}", dir.display());
        return Ok(ResizeStats::default());
    }
    info!(
        "Resizing {} image(s) in {} to {}x{}",
        images.len(),
        dir.display(),
        size.0,
        size.1
    );

    let resized = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let pb = create_progress_bar(images.len() as u64, "Resize");
    images.par_iter().for_each(|path| {
        match resize_one(path, size) {
            Ok(()) => {
                resized.fetch_add(1, Relaxed);
            }
            Err(e) => {
                error!("Failed to resize {}: {}", path.display(), e);
                failed.fetch_add(1, Relaxed);
            }
        }
        pb.inc(1);
    });
    pb.finish_with_message("Resize complete");

    Ok(ResizeStats {
        resized: resized.into_inner(),
        failed: failed.into_inner(),
    })
}
