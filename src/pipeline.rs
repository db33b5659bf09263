//! In-process driver for the whole dataset preparation.
//!
//! Stages run in a fixed order and hand typed results to each other: class
//! lists, optional XML path rewrite, annotation conversion, per-split copy /
//! resize / reconcile / prune, and finally the manifest.

use log::{info, warn};

use crate::classes::{
    class_difference, ensure_same_classes, find_classes, read_classes_file, remove_class_folders,
    write_classes_file,
};
use crate::config::{PipelineConfig, SplitConfig};
use crate::copy::{copy_flat, name_contains};
use crate::error::{PrepError, Result};
use crate::manifest::{write_manifest, write_path_list};
use crate::prune::prune;
use crate::reconcile::reconcile;
use crate::resize::resize_images;
use crate::types::{ConversionStats, PipelineSummary, SplitSummary};
use crate::utils::list_file_names;
use crate::voc::{convert_tree, rewrite_tree};

fn extract_split_classes(split: &SplitConfig) -> Result<Vec<String>> {
    if !split.label_source.is_dir() {
        return Err(PrepError::MissingInput(split.label_source.clone()));
    }
    let classes = find_classes(&split.label_source)?;
    write_classes_file(&classes, &split.classes_file)?;
    Ok(classes)
}

/// Build the class list shared by both splits.
///
/// Differing lists abort the run unless `reconcile_classes` is set, in which
/// case class folders present in only one split are deleted from both splits
/// and the lists are extracted again. Nothing is deleted before this check.
pub fn prepare_classes(config: &PipelineConfig) -> Result<Vec<String>> {
    let train = extract_split_classes(&config.train)?;
    let valid = extract_split_classes(&config.valid)?;
    if train == valid {
        return Ok(train);
    }
    if !config.reconcile_classes {
        return ensure_same_classes(&train, &valid).map(|_| train);
    }

    let (only_train, only_valid) = class_difference(&train, &valid);
    let stray: Vec<String> = only_train.into_iter().chain(only_valid).collect();
    warn!("Removing classes not shared by both splits: {:?}", stray);
    for split in config.splits() {
        let removed = remove_class_folders(&split.label_source, &stray)?
            + remove_class_folders(&split.image_source, &stray)?;
        info!("Removed {} class folder(s) from {}", removed, split.name);
    }

    let train = extract_split_classes(&config.train)?;
    let valid = extract_split_classes(&config.valid)?;
    ensure_same_classes(&train, &valid)?;
    Ok(train)
}

/// Re-read the class files of both splits and check they still agree.
///
/// Returns the recorded class list, which is what the manifest is built from.
pub fn verify_class_files(config: &PipelineConfig) -> Result<Vec<String>> {
    let train = read_classes_file(&config.train.classes_file)?;
    let valid = read_classes_file(&config.valid.classes_file)?;
    ensure_same_classes(&train, &valid)?;
    Ok(train)
}

/// Turn the VOC annotations of one split into YOLO text files
pub fn convert_split(
    split: &SplitConfig,
    classes: &[String],
    config: &PipelineConfig,
) -> Result<ConversionStats> {
    convert_tree(
        &split.label_source,
        &split.converted_labels_dir,
        classes,
        name_contains(&config.exclude),
    )
}

/// Copy, resize, reconcile and prune one split, then write its path list.
pub fn prepare_split(split: &SplitConfig, config: &PipelineConfig) -> Result<SplitSummary> {
    info!("Preparing split '{}'", split.name);
    let mut summary = SplitSummary {
        name: split.name.clone(),
        ..Default::default()
    };

    let image_stats = copy_flat(
        &split.image_source,
        &split.images_dir,
        name_contains(&config.exclude),
    )?;
    summary.images_copied = image_stats.copied;

    if let Some(size) = config.image_size {
        summary.resized = resize_images(&split.images_dir, (size, size))?.resized;
    }

    let label_stats = copy_flat(
        &split.converted_labels_dir,
        &split.labels_dir,
        name_contains(&config.exclude),
    )?;
    summary.labels_copied = label_stats.copied;

    let images = list_file_names(&split.images_dir)?;
    let labels = list_file_names(&split.labels_dir)?;
    let (images, labels) = reconcile(images, labels);
    summary.image_pairs = images.len();

    summary.label_prune = prune(&split.labels_dir, &labels)?;
    summary.image_prune = prune(&split.images_dir, &images)?;

    write_path_list(&images, &split.path_prefix, &split.path_list)?;
    summary.print_summary();
    Ok(summary)
}

/// Run every stage for both splits and write the manifest.
pub fn run(config: &PipelineConfig) -> Result<PipelineSummary> {
    info!("Extracting class lists...");
    let classes = prepare_classes(config)?;
    info!("Using {} class(es)", classes.len());

    if let Some(prefix) = &config.xml_path_prefix {
        for split in config.splits() {
            rewrite_tree(&split.label_source, prefix)?;
        }
    }

    let mut splits = Vec::new();
    for split in config.splits() {
        let conversion = convert_split(split, &classes, config)?;
        let mut summary = prepare_split(split, config)?;
        summary.conversion = conversion;
        splits.push(summary);
    }

    info!("Creating manifest...");
    let classes = verify_class_files(config)?;
    write_manifest(
        &classes,
        &config.dataset_root,
        &config.train.path_list,
        &config.valid.path_list,
        &config.manifest_path,
    )?;
    info!("Dataset preparation completed successfully.");

    Ok(PipelineSummary {
        classes,
        splits,
        manifest_path: config.manifest_path.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_verify_class_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let config = PipelineConfig::new(
            &root.join("Training"),
            &root.join("Validation"),
            &root.join("out"),
        );
        fs::create_dir_all(&config.train.base_dir).unwrap();
        fs::create_dir_all(&config.valid.base_dir).unwrap();
        fs::write(&config.train.classes_file, "drink\nsnack\n").unwrap();
        fs::write(&config.valid.classes_file, "drink\nsnack\n").unwrap();

        assert_eq!(verify_class_files(&config).unwrap(), vec!["drink", "snack"]);

        fs::write(&config.valid.classes_file, "drink\n").unwrap();
        match verify_class_files(&config) {
            Err(PrepError::ClassMismatch { only_train, .. }) => {
                assert_eq!(only_train, vec!["snack".to_string()]);
            }
            other => panic!("expected class mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_class_files_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let config = PipelineConfig::new(&root.join("a"), &root.join("b"), &root.join("out"));
        assert!(matches!(
            verify_class_files(&config),
            Err(PrepError::MissingInput(_))
        ));
    }
}
