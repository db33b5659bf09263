use clap::Parser;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Prefix written into `<folder>`/`<path>` when rewriting annotation paths
pub const XML_PATH_PREFIX: &str = "../../image/";

/// Command-line arguments for preparing a YOLO dataset from VOC style folders.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Training split folder containing `image/` and `label/`
    #[arg(long = "train_dir", default_value = "./Training")]
    pub train_dir: String,

    /// Validation split folder containing `image/` and `label/`
    #[arg(long = "val_dir", default_value = "./Validation")]
    pub val_dir: String,

    /// Where `images/`, `labels/`, the path lists and `data.yaml` are written
    #[arg(short = 'o', long = "output_dir", default_value = ".")]
    pub output_dir: String,

    /// Side length images are resized to
    #[arg(long = "image_size", default_value_t = 640, value_parser = validate_image_size)]
    pub image_size: u32,

    /// Copy images without resizing them
    #[arg(long = "skip_resize")]
    pub skip_resize: bool,

    /// Skip files whose name contains this text (case-insensitive)
    #[arg(long = "exclude", default_value = "meta")]
    pub exclude: String,

    /// Name of the class list written into each split folder
    #[arg(long = "classes_file", default_value = "classes.txt")]
    pub classes_file: String,

    /// Point `<folder>` and `<path>` of every annotation at the image folder
    #[arg(long = "rewrite_xml_paths")]
    pub rewrite_xml_paths: bool,

    /// Drop classes found in only one split instead of aborting
    #[arg(long = "reconcile_classes")]
    pub reconcile_classes: bool,
}

// Validate that the image size is a positive integer
fn validate_image_size(s: &str) -> Result<u32, String> {
    match u32::from_str(s) {
        Ok(val) if val > 0 => Ok(val),
        _ => Err("SIZE must be a positive integer".to_string()),
    }
}

/// Every source and destination path of one split
#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfig {
    pub name: String,
    pub base_dir: PathBuf,
    pub image_source: PathBuf,
    pub label_source: PathBuf,
    pub converted_labels_dir: PathBuf,
    pub classes_file: PathBuf,
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub path_list: PathBuf,
    pub path_prefix: String,
}

impl SplitConfig {
    pub fn new(name: &str, base_dir: &Path, output_dir: &Path, classes_file: &str) -> Self {
        Self {
            name: name.to_string(),
            base_dir: base_dir.to_path_buf(),
            image_source: base_dir.join("image"),
            label_source: base_dir.join("label"),
            converted_labels_dir: base_dir.join("label_coco"),
            classes_file: base_dir.join(classes_file),
            images_dir: output_dir.join("images").join(name),
            labels_dir: output_dir.join("labels").join(name),
            path_list: output_dir.join(format!("{}.txt", name)),
            path_prefix: format!("./images/{}/", name),
        }
    }
}

/// Settings for one run of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub train: SplitConfig,
    pub valid: SplitConfig,
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub dataset_root: String,
    pub image_size: Option<u32>,
    pub exclude: String,
    pub xml_path_prefix: Option<String>,
    pub reconcile_classes: bool,
}

impl PipelineConfig {
    pub fn new(train_dir: &Path, val_dir: &Path, output_dir: &Path) -> Self {
        Self {
            train: SplitConfig::new("train", train_dir, output_dir, "classes.txt"),
            valid: SplitConfig::new("valid", val_dir, output_dir, "classes.txt"),
            output_dir: output_dir.to_path_buf(),
            manifest_path: output_dir.join("data.yaml"),
            dataset_root: "./".to_string(),
            image_size: Some(640),
            exclude: "meta".to_string(),
            xml_path_prefix: None,
            reconcile_classes: false,
        }
    }

    pub fn from_args(args: &Args) -> Self {
        let output_dir = PathBuf::from(&args.output_dir);
        let train_dir = PathBuf::from(&args.train_dir);
        let val_dir = PathBuf::from(&args.val_dir);
        Self {
            train: SplitConfig::new("train", &train_dir, &output_dir, &args.classes_file),
            valid: SplitConfig::new("valid", &val_dir, &output_dir, &args.classes_file),
            manifest_path: output_dir.join("data.yaml"),
            output_dir,
            dataset_root: "./".to_string(),
            image_size: (!args.skip_resize).then_some(args.image_size),
            exclude: args.exclude.clone(),
            xml_path_prefix: args
                .rewrite_xml_paths
                .then(|| XML_PATH_PREFIX.to_string()),
            reconcile_classes: args.reconcile_classes,
        }
    }

    pub fn splits(&self) -> [&SplitConfig; 2] {
        [&self.train, &self.valid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_image_size() {
        assert_eq!(validate_image_size("640"), Ok(640));
        assert!(validate_image_size("0").is_err());
        assert!(validate_image_size("-1").is_err());
        assert!(validate_image_size("abc").is_err());
    }

    #[test]
    fn test_from_args_defaults() {
        let args = Args::parse_from(["voc2yolo"]);
        let config = PipelineConfig::from_args(&args);

        assert_eq!(config.image_size, Some(640));
        assert_eq!(config.exclude, "meta");
        assert_eq!(config.xml_path_prefix, None);
        assert_eq!(config.train.image_source, Path::new("./Training/image"));
        assert_eq!(config.train.label_source, Path::new("./Training/label"));
        assert_eq!(config.valid.converted_labels_dir, Path::new("./Validation/label_coco"));
        assert_eq!(config.train.images_dir, Path::new("./images/train"));
        assert_eq!(config.valid.labels_dir, Path::new("./labels/valid"));
        assert_eq!(config.valid.path_list, Path::new("./valid.txt"));
        assert_eq!(config.valid.path_prefix, "./images/valid/");
        assert_eq!(config.manifest_path, Path::new("./data.yaml"));
    }

    #[test]
    fn test_from_args_flags() {
        let args = Args::parse_from([
            "voc2yolo",
            "--output_dir",
            "out",
            "--skip_resize",
            "--rewrite_xml_paths",
            "--reconcile_classes",
        ]);
        let config = PipelineConfig::from_args(&args);

        assert_eq!(config.image_size, None);
        assert_eq!(config.xml_path_prefix.as_deref(), Some(XML_PATH_PREFIX));
        assert!(config.reconcile_classes);
        assert_eq!(config.train.labels_dir, Path::new("out/labels/train"));
    }
}
