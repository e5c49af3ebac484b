// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Annotation file reader.

use super::types::*;
use crate::{Error, codec::ObjectType};
use log::debug;
use std::{
    collections::HashSet,
    fs::File,
    io::BufReader,
    path::Path,
};

/// Options for annotation reading.
#[derive(Debug, Clone, Default)]
pub struct AnnotationReadOptions {
    /// If true, validate referential integrity after reading.
    pub validate: bool,
    /// Keep only these image file names and their annotations (empty = all).
    pub file_names: Vec<String>,
}

/// Reader for `annotations.json`.
///
/// # Example
///
/// ```rust,no_run
/// use strawset::annotations::AnnotationReader;
///
/// let reader = AnnotationReader::new();
/// let dataset = reader.read_json("strawberry_dataset/annotations.json")?;
/// println!("Loaded {} images", dataset.images.len());
/// # Ok::<(), strawset::Error>(())
/// ```
pub struct AnnotationReader {
    options: AnnotationReadOptions,
}

impl AnnotationReader {
    /// Create a new reader with default options.
    pub fn new() -> Self {
        Self {
            options: AnnotationReadOptions::default(),
        }
    }

    /// Create a new reader with custom options.
    pub fn with_options(options: AnnotationReadOptions) -> Self {
        Self { options }
    }

    /// Read the annotation file at `path`.
    pub fn read_json<P: AsRef<Path>>(&self, path: P) -> Result<StrawberryDataset, Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingInput(format!(
                "annotation file not found: {}",
                path.display()
            )));
        }

        let file = File::open(path)?;
        let reader = BufReader::with_capacity(64 * 1024, file);
        let dataset: StrawberryDataset = serde_json::from_reader(reader)?;
        debug!(
            "Read {} images and {} annotations from {}",
            dataset.images.len(),
            dataset.annotations.len(),
            path.display()
        );

        if self.options.validate {
            validate_dataset(&dataset)?;
        }

        Ok(self.apply_filters(dataset))
    }

    /// Apply filters from options to the dataset.
    fn apply_filters(&self, mut dataset: StrawberryDataset) -> StrawberryDataset {
        if !self.options.file_names.is_empty() {
            let names: HashSet<&str> = self.options.file_names.iter().map(String::as_str).collect();
            dataset.images.retain(|i| names.contains(i.file_name.as_str()));
            let keep: HashSet<u64> = dataset.images.iter().map(|i| i.id).collect();
            dataset.annotations.retain(|a| keep.contains(&a.image_id));
        }
        dataset
    }
}

impl Default for AnnotationReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate an annotation file for structural consistency.
///
/// Stops at the first broken reference; content checks against masks live
/// in [`crate::validate`].
pub fn validate_dataset(dataset: &StrawberryDataset) -> Result<(), Error> {
    let image_ids: HashSet<_> = dataset.images.iter().map(|i| i.id).collect();

    for ann in &dataset.annotations {
        if !image_ids.contains(&ann.image_id) {
            return Err(Error::InvalidAnnotations(format!(
                "Annotation {} references non-existent image_id {}",
                ann.id, ann.image_id
            )));
        }

        if ObjectType::from_category_id(ann.category_id).is_none() {
            return Err(Error::InvalidAnnotations(format!(
                "Annotation {} has unknown category_id {}",
                ann.id, ann.category_id
            )));
        }

        if ann.bbox[2] <= 0.0 || ann.bbox[3] <= 0.0 {
            return Err(Error::InvalidAnnotations(format!(
                "Annotation {} has invalid bbox dimensions",
                ann.id
            )));
        }
    }

    Ok(())
}
