// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Load, scan and validate samples from a dataset directory.

use crate::{
    Error,
    annotations::{AnnotationReadOptions, AnnotationReader, DatasetIndex},
    config::CheckConfig,
    layout::{DatasetLayout, sample_file_name, sample_index},
    scan::{MaskScan, load_mask},
    validate::{ValidationReport, validate_sample},
};
use log::{info, warn};
use std::path::Path;

/// Validation outcome of one named sample.
#[derive(Debug, Clone)]
pub struct SampleCheck {
    pub file_name: String,
    pub report: ValidationReport,
}

/// A sample whose inputs could not be loaded.
#[derive(Debug)]
pub struct SampleError {
    pub file_name: String,
    pub error: Error,
}

/// Outcome of checking every sample of a dataset.
///
/// A sample that cannot be read lands in `unreadable` and the remaining
/// samples are still checked.
#[derive(Debug, Default)]
pub struct DatasetCheck {
    pub samples: Vec<SampleCheck>,
    pub unreadable: Vec<SampleError>,
}

impl DatasetCheck {
    /// File names of samples that failed a check or could not be read.
    pub fn failed(&self) -> Vec<&str> {
        let mut failed: Vec<&str> = self
            .samples
            .iter()
            .filter(|c| !c.report.is_valid())
            .map(|c| c.file_name.as_str())
            .chain(self.unreadable.iter().map(|e| e.file_name.as_str()))
            .collect();
        failed.sort_unstable();
        failed
    }

    pub fn total(&self) -> usize {
        self.samples.len() + self.unreadable.len()
    }

    pub fn is_valid(&self) -> bool {
        self.unreadable.is_empty() && self.samples.iter().all(|c| c.report.is_valid())
    }
}

fn check_indexed(
    layout: &DatasetLayout,
    index: &DatasetIndex,
    sample: u32,
    config: &CheckConfig,
) -> Result<SampleCheck, Error> {
    let file_name = sample_file_name(sample);
    let image = index.image_by_name(&file_name).ok_or_else(|| {
        Error::InvalidAnnotations(format!("{} is not listed in annotations.json", file_name))
    })?;

    let mask = load_mask(layout.mask_path(sample))?;
    if image.width != 0 && (image.width, image.height) != mask.dimensions() {
        warn!(
            "{}: annotation size {}x{} differs from mask size {}x{}",
            file_name,
            image.width,
            image.height,
            mask.width(),
            mask.height()
        );
    }

    let scan = MaskScan::scan_parallel(&mask, config.encoding);
    let report = validate_sample(
        image.id,
        &scan,
        index.annotations_for_image(image.id),
        config,
    );
    Ok(SampleCheck { file_name, report })
}

/// Validate sample `sample` (mask `masks/<sample:05>.png`) of the dataset.
pub fn check_sample<P: AsRef<Path>>(
    dataset_root: P,
    sample: u32,
    config: &CheckConfig,
) -> Result<SampleCheck, Error> {
    let layout = DatasetLayout::open(dataset_root)?;
    let reader = AnnotationReader::with_options(AnnotationReadOptions {
        file_names: vec![sample_file_name(sample)],
        ..Default::default()
    });
    let dataset = reader.read_json(layout.annotations_path())?;
    let index = DatasetIndex::from_dataset(&dataset);
    check_indexed(&layout, &index, sample, config)
}

/// Validate every annotated image that has a mask, in index order.
///
/// Only a missing dataset root or a missing or malformed annotation file is
/// an error here.
pub fn check_dataset<P: AsRef<Path>>(
    dataset_root: P,
    config: &CheckConfig,
) -> Result<DatasetCheck, Error> {
    let layout = DatasetLayout::open(dataset_root)?;
    let dataset = AnnotationReader::new().read_json(layout.annotations_path())?;
    let index = DatasetIndex::from_dataset(&dataset);

    let mut samples: Vec<u32> = dataset
        .images
        .iter()
        .filter_map(|img| sample_index(&img.file_name))
        .filter(|i| layout.mask_path(*i).is_file())
        .collect();
    samples.sort_unstable();
    samples.dedup();

    let mut result = DatasetCheck::default();
    for sample in samples {
        match check_indexed(&layout, &index, sample, config) {
            Ok(check) => result.samples.push(check),
            Err(error) => {
                let file_name = sample_file_name(sample);
                warn!("{}: {}", file_name, error);
                result.unreadable.push(SampleError { file_name, error });
            }
        }
    }

    info!(
        "Checked {} samples, {} failed",
        result.total(),
        result.failed().len()
    );
    Ok(result)
}
