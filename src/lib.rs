//! Pascal VOC to YOLO dataset preparation
//!
//! This library copies vendor image/annotation folders into the YOLO training
//! layout, converts VOC XML boxes to normalized YOLO text, keeps images and
//! labels in one-to-one correspondence, and writes the dataset manifest.

pub mod classes;
pub mod config;
pub mod copy;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod prune;
pub mod reconcile;
pub mod resize;
pub mod stem;
pub mod types;
pub mod utils;
pub mod voc;

// Re-export commonly used types and functions
pub use config::{Args, PipelineConfig, SplitConfig};
pub use copy::{copy_flat, name_contains};
pub use error::{PrepError, Result};
pub use manifest::{write_manifest, write_path_list, Manifest};
pub use pipeline::{prepare_split, run, verify_class_files};
pub use prune::prune;
pub use reconcile::{reconcile, retain_by_stems};
pub use stem::stem;
pub use types::{CopyStats, PipelineSummary, PruneReport, SplitSummary};
