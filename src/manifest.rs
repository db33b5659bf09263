use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{PrepError, Result};

/// Dataset description read by the training framework
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub path: String,
    pub train: String,
    pub val: String,
    pub nc: usize,
    pub names: BTreeMap<usize, String>,
}

impl Manifest {
    pub fn new(class_names: &[String], dataset_root: &str, train: &Path, val: &Path) -> Self {
        Self {
            path: dataset_root.to_string(),
            train: train.to_string_lossy().into_owned(),
            val: val.to_string_lossy().into_owned(),
            nc: class_names.len(),
            names: class_names.iter().cloned().enumerate().collect(),
        }
    }
}

/// Write one `prefix + filename` line per entry and return the line count
pub fn write_path_list<S: AsRef<str>>(filenames: &[S], prefix: &str, output: &Path) -> Result<usize> {
    let file = File::create(output).map_err(|e| PrepError::io(output, e))?;
    let mut writer = BufWriter::new(file);
    for filename in filenames {
        writeln!(writer, "{}{}", prefix, filename.as_ref()).map_err(|e| PrepError::io(output, e))?;
    }
    writer.flush().map_err(|e| PrepError::io(output, e))?;

    info!(
        "Wrote {} image path(s) to {}",
        filenames.len(),
        output.display()
    );
    Ok(filenames.len())
}

/// Create the manifest YAML file for training
pub fn write_manifest(
    class_names: &[String],
    dataset_root: &str,
    train_list: &Path,
    val_list: &Path,
    output: &Path,
) -> Result<Manifest> {
    let manifest = Manifest::new(class_names, dataset_root, train_list, val_list);
    let yaml_content = serde_yaml::to_string(&manifest)?;
    fs::write(output, yaml_content).map_err(|e| PrepError::io(output, e))?;

    info!(
        "Wrote manifest {} ({} classes)",
        output.display(),
        manifest.nc
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_path_list() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output = temp_dir.path().join("train.txt");

        let count = write_path_list(&["a.jpg", "b.jpg"], "./images/train/", &output).unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "./images/train/a.jpg\n./images/train/b.jpg\n"
        );
    }

    #[test]
    fn test_write_manifest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output = temp_dir.path().join("data.yaml");
        let classes = vec!["apple".to_string(), "zebra".to_string()];

        write_manifest(
            &classes,
            "./",
            Path::new("/data/train.txt"),
            Path::new("/data/valid.txt"),
            &output,
        )
        .unwrap();

        let yaml_content = fs::read_to_string(&output).unwrap();
        assert!(yaml_content.contains("nc: 2"));
        assert!(yaml_content.contains("names:"));
        assert!(yaml_content.contains("0: apple"));
        assert!(yaml_content.contains("1: zebra"));

        let parsed: Manifest = serde_yaml::from_str(&yaml_content).unwrap();
        assert_eq!(parsed.path, "./");
        assert_eq!(parsed.train, "/data/train.txt");
        assert_eq!(parsed.val, "/data/valid.txt");
        assert_eq!(parsed.nc, 2);
        assert_eq!(parsed.names.get(&1).map(String::as_str), Some("zebra"));
    }
}
