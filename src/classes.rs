//! Class lists derived from vendor folder names.
//!
//! Label folders are named `<id>_<class name>`; the class name is everything
//! after the first underscore. Class indices are positions in the sorted list.

use log::{info, warn};
use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{PrepError, Result};

/// Class name encoded in a folder name such as `10060_snack bar`
pub fn class_name_from_folder(folder_name: &str) -> &str {
    match folder_name.split_once('_') {
        Some((_, class_name)) => class_name.trim(),
        None => folder_name.trim(),
    }
}

/// Sorted, de-duplicated class names of the immediate subfolders of `label_root`
pub fn find_classes(label_root: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(label_root).map_err(|e| PrepError::io(label_root, e))?;
    let mut classes = BTreeSet::new();
    let mut folder_count = 0;

    for entry in entries {
        let entry = entry.map_err(|e| PrepError::io(label_root, e))?;
        if !entry.path().is_dir() {
            continue;
        }
        folder_count += 1;
        match entry.file_name().to_str() {
            Some(name) => {
                classes.insert(class_name_from_folder(name).to_string());
            }
            None => warn!("Skipping folder with non UTF-8 name: {:?}", entry.path()),
        }
    }

    info!(
        "Found {} class(es) in {} folder(s) under {}",
        classes.len(),
        folder_count,
        label_root.display()
    );
    Ok(classes.into_iter().collect())
}

/// Write one class name per line
pub fn write_classes_file(classes: &[String], path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| PrepError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for class_name in classes {
        writeln!(writer, "{}", class_name).map_err(|e| PrepError::io(path, e))?;
    }
    writer.flush().map_err(|e| PrepError::io(path, e))?;
    info!("Saved {} class(es) to {}", classes.len(), path.display());
    Ok(())
}

/// Read a class list written by [`write_classes_file`], skipping blank lines
pub fn read_classes_file(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        return Err(PrepError::MissingInput(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
    Ok(content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Classes present in one list but not the other, as (only in `a`, only in `b`)
pub fn class_difference(a: &[String], b: &[String]) -> (Vec<String>, Vec<String>) {
    let set_a: HashSet<&String> = a.iter().collect();
    let set_b: HashSet<&String> = b.iter().collect();
    let only_a = a.iter().filter(|c| !set_b.contains(c)).cloned().collect();
    let only_b = b.iter().filter(|c| !set_a.contains(c)).cloned().collect();
    (only_a, only_b)
}

/// Fail unless both splits use the same classes in the same order
pub fn ensure_same_classes(train: &[String], valid: &[String]) -> Result<()> {
    if train == valid {
        return Ok(());
    }
    let (only_train, only_valid) = class_difference(train, valid);
    Err(PrepError::ClassMismatch {
        only_train,
        only_valid,
    })
}

/// Delete every class folder directly under `root` whose class is in `classes`.
///
/// Returns the number of folders removed. A missing `root` removes nothing.
pub fn remove_class_folders(root: &Path, classes: &[String]) -> Result<usize> {
    if !root.is_dir() {
        return Ok(0);
    }
    let doomed: HashSet<&str> = classes.iter().map(String::as_str).collect();
    let entries = fs::read_dir(root).map_err(|e| PrepError::io(root, e))?;
    let mut removed = 0;

    for entry in entries {
        let entry = entry.map_err(|e| PrepError::io(root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if doomed.contains(class_name_from_folder(&name)) {
            fs::remove_dir_all(&path).map_err(|e| PrepError::io(&path, e))?;
            warn!("Removed class folder {}", path.display());
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_class_name_from_folder() {
        assert_eq!(class_name_from_folder("10060_snack"), "snack");
        assert_eq!(class_name_from_folder("10060_blue_berry 41G "), "blue_berry 41G");
        assert_eq!(class_name_from_folder(" plain "), "plain");
    }

    #[test]
    fn test_find_classes_sorted_and_unique() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("2_zebra")).unwrap();
        fs::create_dir_all(root.join("1_apple")).unwrap();
        fs::create_dir_all(root.join("3_apple")).unwrap();
        fs::write(root.join("4_file.xml"), "").unwrap();

        let classes = find_classes(root).unwrap();
        assert_eq!(classes, names(&["apple", "zebra"]));
    }

    #[test]
    fn test_classes_file_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("classes.txt");
        let classes = names(&["apple", "zebra"]);

        write_classes_file(&classes, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "apple\nzebra\n");
        assert_eq!(read_classes_file(&path).unwrap(), classes);
    }

    #[test]
    fn test_ensure_same_classes() {
        let train = names(&["apple", "pear"]);
        assert!(ensure_same_classes(&train, &train.clone()).is_ok());

        let valid = names(&["apple", "plum"]);
        match ensure_same_classes(&train, &valid) {
            Err(PrepError::ClassMismatch {
                only_train,
                only_valid,
            }) => {
                assert_eq!(only_train, names(&["pear"]));
                assert_eq!(only_valid, names(&["plum"]));
            }
            other => panic!("expected class mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_remove_class_folders() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("1_apple")).unwrap();
        fs::create_dir_all(root.join("2_pear")).unwrap();
        fs::write(root.join("2_pear/x.xml"), "").unwrap();

        let removed = remove_class_folders(root, &names(&["pear"])).unwrap();
        assert_eq!(removed, 1);
        assert!(root.join("1_apple").is_dir());
        assert!(!root.join("2_pear").exists());
    }
}
