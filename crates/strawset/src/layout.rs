// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! On-disk dataset layout.
//!
//! ```text
//! strawberry_dataset/
//! ├── annotations.json
//! ├── depth_metadata.json
//! ├── depth/00000.png
//! ├── images/00000.png
//! ├── labels/00000.txt
//! ├── masks/00000.png
//! └── metadata_temp/00000_meta.json
//! ```

use crate::{Error, metadata::MASTER_METADATA_FILE};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const ANNOTATIONS_FILE: &str = "annotations.json";
pub const SHARD_DIR: &str = "metadata_temp";
pub const SHARD_SUFFIX: &str = "_meta.json";

/// Paths of one dataset root.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    /// Open a dataset root, failing when it does not exist.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(Error::MissingInput(format!(
                "dataset directory not found: {}",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn annotations_path(&self) -> PathBuf {
        self.root.join(ANNOTATIONS_FILE)
    }

    pub fn master_metadata_path(&self) -> PathBuf {
        self.root.join(MASTER_METADATA_FILE)
    }

    pub fn shard_dir(&self) -> PathBuf {
        self.root.join(SHARD_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn masks_dir(&self) -> PathBuf {
        self.root.join("masks")
    }

    pub fn depth_dir(&self) -> PathBuf {
        self.root.join("depth")
    }

    pub fn labels_dir(&self) -> PathBuf {
        self.root.join("labels")
    }

    pub fn image_path(&self, index: u32) -> PathBuf {
        self.images_dir().join(sample_file_name(index))
    }

    pub fn mask_path(&self, index: u32) -> PathBuf {
        self.masks_dir().join(sample_file_name(index))
    }

    pub fn depth_path(&self, index: u32) -> PathBuf {
        self.depth_dir().join(sample_file_name(index))
    }
}

/// `00042.png` for sample 42.
pub fn sample_file_name(index: u32) -> String {
    format!("{:05}.png", index)
}

/// Numeric sample index of a file name such as `00042.png`.
pub fn sample_index(file_name: &str) -> Option<u32> {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse().ok())
}

/// Master key of a shard file name: `00042_meta.json` → `00042.png`.
pub fn shard_image_name(shard_file_name: &str) -> Option<String> {
    shard_file_name
        .strip_suffix(SHARD_SUFFIX)
        .map(|stem| format!("{}.png", stem))
}

/// Shard file name of a master key: `00042.png` → `00042_meta.json`.
pub fn image_shard_name(image_name: &str) -> String {
    let stem = image_name.strip_suffix(".png").unwrap_or(image_name);
    format!("{}{}", stem, SHARD_SUFFIX)
}

/// Files directly inside `dir` whose name ends with `suffix`, sorted by
/// name. A missing directory yields no files.
pub fn list_files(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, Error> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        let matches = entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(suffix));
        if matches {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_name_conversions() {
        assert_eq!(sample_file_name(42), "00042.png");
        assert_eq!(sample_index("00042.png"), Some(42));
        assert_eq!(sample_index("cover.png"), None);
        assert_eq!(shard_image_name("00042_meta.json").as_deref(), Some("00042.png"));
        assert_eq!(shard_image_name("00042.json"), None);
        assert_eq!(image_shard_name("00042.png"), "00042_meta.json");
    }

    #[test]
    fn test_open_missing_root() {
        assert!(matches!(
            DatasetLayout::open("/nonexistent/dataset"),
            Err(Error::MissingInput(_))
        ));
    }

    #[test]
    fn test_list_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["00002_meta.json", "00000_meta.json", "notes.txt"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        fs::create_dir(dir.path().join("nested_meta.json")).unwrap();

        let files = list_files(dir.path(), SHARD_SUFFIX).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["00000_meta.json", "00002_meta.json"]);

        assert!(list_files(&dir.path().join("absent"), ".png").unwrap().is_empty());
    }
}
