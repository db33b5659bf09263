use std::path::{Path, PathBuf};

// Image extensions that get resized in place
pub const RESIZE_FORMATS: &[&str] = &["jpg", "jpeg"];

// Pixel-space box as stored in a VOC <bndbox> element (1-based coordinates)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BndBox {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

// One <object> element of a VOC annotation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VocObject {
    pub name: String,
    pub difficult: bool,
    pub bndbox: Option<BndBox>,
}

// The parts of a VOC annotation file needed to produce YOLO labels
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VocAnnotation {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub objects: Vec<VocObject>,
}

/// A single file operation that failed without stopping the batch.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl FileFailure {
    pub fn new(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

// Result of flattening one source tree into a destination directory
#[derive(Debug, Default, Clone)]
pub struct CopyStats {
    pub copied: usize,
    pub excluded: usize,
    pub overwritten: usize,
    pub failures: Vec<FileFailure>,
}

impl CopyStats {
    pub fn print_summary(&self, dest: &Path) {
        log::info!(
            "Copied {} file(s) into {} ({} excluded)",
            self.copied,
            dest.display(),
            self.excluded
        );
        if self.overwritten > 0 {
            log::warn!(
                "{} file(s) replaced a same-named file from another folder",
                self.overwritten
            );
        }
        if !self.failures.is_empty() {
            log::warn!("{} file(s) failed to copy", self.failures.len());
        }
    }
}

/// Counts from one keep-only prune of a directory.
#[derive(Debug, Default, Clone)]
pub struct PruneReport {
    pub staged: usize,
    pub deleted: usize,
    pub restored: usize,
    pub failures: Vec<FileFailure>,
}

impl PruneReport {
    pub fn print_summary(&self, dir: &Path) {
        log::info!("=== Prune Summary: {} ===", dir.display());
        log::info!("Kept files staged: {}", self.staged);
        log::info!("Unlisted files deleted: {}", self.deleted);
        log::info!("Kept files restored: {}", self.restored);
        if !self.failures.is_empty() {
            log::warn!("File operations failed: {}", self.failures.len());
        }
    }
}

// Struct to hold XML conversion statistics
#[derive(Debug, Default, Clone)]
pub struct ConversionStats {
    pub converted: usize,
    pub excluded: usize,
    pub objects_written: usize,
    pub skipped_difficult: usize,
    pub skipped_unknown_class: usize,
    pub failed: usize,
}

impl ConversionStats {
    pub fn merge(&mut self, other: &ConversionStats) {
        self.converted += other.converted;
        self.excluded += other.excluded;
        self.objects_written += other.objects_written;
        self.skipped_difficult += other.skipped_difficult;
        self.skipped_unknown_class += other.skipped_unknown_class;
        self.failed += other.failed;
    }

    pub fn print_summary(&self) {
        log::info!("=== Conversion Summary ===");
        log::info!("XML files converted: {}", self.converted);
        log::info!("Objects written: {}", self.objects_written);
        log::info!("Skipped (difficult): {}", self.skipped_difficult);
        log::info!("Skipped (unknown class): {}", self.skipped_unknown_class);
        if self.failed > 0 {
            log::warn!("Failed conversions: {}", self.failed);
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ResizeStats {
    pub resized: usize,
    pub failed: usize,
}

/// Everything that happened to one split during preparation.
#[derive(Debug, Default, Clone)]
pub struct SplitSummary {
    pub name: String,
    pub conversion: ConversionStats,
    pub images_copied: usize,
    pub labels_copied: usize,
    pub resized: usize,
    pub image_pairs: usize,
    pub label_prune: PruneReport,
    pub image_prune: PruneReport,
}

impl SplitSummary {
    pub fn print_summary(&self) {
        log::info!("=== Split Summary: {} ===", self.name);
        log::info!("Images copied: {}", self.images_copied);
        log::info!("Labels copied: {}", self.labels_copied);
        log::info!("Images resized: {}", self.resized);
        log::info!("Matched image/label pairs: {}", self.image_pairs);
        log::info!(
            "Orphans removed: {} image(s), {} label(s)",
            self.image_prune.deleted,
            self.label_prune.deleted
        );
    }
}

#[derive(Debug, Default, Clone)]
pub struct PipelineSummary {
    pub classes: Vec<String>,
    pub splits: Vec<SplitSummary>,
    pub manifest_path: PathBuf,
}
