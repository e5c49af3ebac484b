// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-image metadata shards and the master metadata file.
//!
//! Generation writes one `metadata_temp/<stem>_meta.json` per image and
//! later merges them into `depth_metadata.json`. [`reconcile`] checks that
//! the two stay in agreement; [`reconstruct`] rebuilds the master from the
//! shards.

use crate::{
    Error,
    annotations::AnnotationReader,
    config::CheckConfig,
    layout::{DatasetLayout, SHARD_SUFFIX, image_shard_name, list_files, shard_image_name},
    metadata::{DepthMetadata, MasterMetadata, read_master},
};
use log::{debug, info};
use std::{
    fmt,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Outcome of a shard/master reconciliation.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub shard_count: usize,
    /// `None` when the master file could not be read.
    pub master_count: Option<usize>,
    /// `None` when the annotation file could not be read.
    pub annotation_image_count: Option<usize>,
    pub errors: Vec<String>,
}

impl ReconcileReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Found {} temp metadata files.", self.shard_count)?;
        if let Some(count) = self.master_count {
            writeln!(f, "Master metadata contains {} entries.", count)?;
        }
        if let Some(count) = self.annotation_image_count {
            writeln!(f, "Annotations file contains {} images.", count)?;
        }
        if self.errors.is_empty() {
            writeln!(f, "✓ VERIFICATION SUCCESSFUL! All checks passed.")?;
        } else {
            writeln!(f, "✗ VERIFICATION FAILED with {} errors:", self.errors.len())?;
            for error in &self.errors {
                writeln!(f, " - {}", error)?;
            }
        }
        Ok(())
    }
}

fn read_shard(path: &Path) -> Result<DepthMetadata, Error> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Cross-check the shards, the master file and the annotation file of the
/// dataset at `dataset_root`.
///
/// Only a missing dataset root is an error; every inconsistency is collected
/// into the report. A missing or unreadable master ends the comparison
/// early since nothing else can be compared against it.
pub fn reconcile<P: AsRef<Path>>(
    dataset_root: P,
    config: &CheckConfig,
) -> Result<ReconcileReport, Error> {
    let layout = DatasetLayout::open(dataset_root)?;
    let shard_dir = layout.shard_dir();
    let shards = list_files(&shard_dir, SHARD_SUFFIX)?;

    let mut report = ReconcileReport {
        shard_count: shards.len(),
        ..Default::default()
    };

    let master = match read_master(layout.master_metadata_path()) {
        Ok(master) => master,
        Err(Error::MissingInput(_)) => {
            report
                .errors
                .push("Master depth_metadata.json not found".to_owned());
            return Ok(report);
        }
        Err(err) => {
            report
                .errors
                .push(format!("Failed to parse master metadata: {}", err));
            return Ok(report);
        }
    };
    report.master_count = Some(master.len());

    match AnnotationReader::new().read_json(layout.annotations_path()) {
        Ok(dataset) => {
            report.annotation_image_count = Some(dataset.images.len());
            if dataset.images.len() != master.len() {
                report.errors.push(format!(
                    "Mismatch: annotations has {} images, but master metadata has {} entries",
                    dataset.images.len(),
                    master.len()
                ));
            }
        }
        Err(Error::MissingInput(_)) => report.errors.push("annotations.json not found".to_owned()),
        Err(err) => report
            .errors
            .push(format!("Failed to parse annotations.json: {}", err)),
    }

    for shard in &shards {
        let shard_name = file_name(shard);
        let Some(image_name) = shard_image_name(&shard_name) else {
            continue;
        };
        let Some(entry) = master.get(&image_name) else {
            report.errors.push(format!(
                "Temp file {} exists but {} is not in master metadata",
                shard_name, image_name
            ));
            continue;
        };

        let shard_meta = match read_shard(shard) {
            Ok(meta) => meta,
            Err(err) => {
                report
                    .errors
                    .push(format!("Failed to parse {}: {}", shard_name, err));
                continue;
            }
        };

        let (temp, master_range) = (shard_meta.depth_range, entry.depth_range);
        if !temp.matches(&master_range, config.depth_tolerance) {
            report.errors.push(format!(
                "Data mismatch for {}: temp range [{}, {}] != master range [{}, {}]",
                image_name,
                temp.min_meters,
                temp.max_meters,
                master_range.min_meters,
                master_range.max_meters
            ));
        }
    }

    for image_name in master.keys() {
        let shard_name = image_shard_name(image_name);
        if !shard_dir.join(&shard_name).is_file() {
            report.errors.push(format!(
                "Entry {} is in master metadata but {} is missing from metadata_temp",
                image_name, shard_name
            ));
        }
    }

    info!(
        "Reconciled {} shards against {} master entries: {} errors",
        report.shard_count,
        master.len(),
        report.errors.len()
    );
    Ok(report)
}

/// Rebuild the master metadata by concatenating every shard in `shard_dir`.
pub fn reconstruct<P: AsRef<Path>>(shard_dir: P) -> Result<MasterMetadata, Error> {
    let shard_dir = shard_dir.as_ref();
    if !shard_dir.is_dir() {
        return Err(Error::MissingInput(format!(
            "shard directory not found: {}",
            shard_dir.display()
        )));
    }

    let mut master = MasterMetadata::new();
    for shard in list_files(shard_dir, SHARD_SUFFIX)? {
        let shard_name = file_name(&shard);
        if let Some(image_name) = shard_image_name(&shard_name) {
            debug!("Merging {}", shard_name);
            master.insert(image_name, read_shard(&shard)?);
        }
    }
    info!("Reconstructed {} master entries", master.len());
    Ok(master)
}

/// Write master metadata as pretty-printed JSON, creating parent directories.
pub fn write_master<P: AsRef<Path>>(path: P, master: &MasterMetadata) -> Result<(), Error> {
    if let Some(parent) = path.as_ref().parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path.as_ref())?;
    let writer = BufWriter::with_capacity(64 * 1024, file);
    serde_json::to_writer_pretty(writer, master)?;
    Ok(())
}
