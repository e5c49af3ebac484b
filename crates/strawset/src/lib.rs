// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! # Strawberry Dataset Consistency Library
//!
//! Tools for checking a synthetic strawberry instance-segmentation dataset:
//! RGB images, color-encoded instance masks, depth maps, a COCO-style
//! `annotations.json` and per-image depth metadata shards.
//!
//! ## Features
//!
//! - **Color codec**: decode mask pixels into `(category, instance id)` keys
//!   under an explicit [`EncodingVersion`]
//! - **Mask scanning**: single-pass, optionally row-parallel statistics per
//!   instance
//! - **Cross-validation**: bijection, pixel threshold, id offset, channel
//!   separation, pairing, geometry and color checks against the annotations
//! - **Shard reconciliation**: compare `metadata_temp/` shards with
//!   `depth_metadata.json` and rebuild the master file
//! - **Utilities**: dataset overview, depth decoding, camera intrinsics and
//!   bbox comparison rendering
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strawset::{CheckConfig, Error, check_sample};
//!
//! fn main() -> Result<(), Error> {
//!     let config = CheckConfig::load("strawberry_dataset")?;
//!     let sample = check_sample("strawberry_dataset", 0, &config)?;
//!     println!("{}", sample.report);
//!     Ok(())
//! }
//! ```

pub mod annotations;
mod check;
pub mod codec;
pub mod config;
pub mod depth;
mod error;
pub mod layout;
pub mod metadata;
pub mod overview;
pub mod scan;
pub mod shards;
pub mod validate;
pub mod visualize;

pub use crate::{
    check::{DatasetCheck, SampleCheck, SampleError, check_dataset, check_sample},
    codec::{Color, DecodeFault, EncodingVersion, ObjectKey, ObjectType},
    config::{CheckConfig, GeometryTolerance},
    depth::{DepthMap, load_depth_png},
    error::Error,
    metadata::{
        CameraIntrinsics, DEFAULT_INTRINSICS, DepthMetadata, MasterMetadata, load_depth_metadata,
    },
    overview::DatasetOverview,
    scan::{MaskScan, load_mask},
    shards::{ReconcileReport, reconcile, reconstruct, write_master},
    validate::{ValidationReport, validate_sample},
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{DatasetImage, InstanceAnnotation, StrawberryDataset};
    use image::RgbImage;
    use std::fs;
    use tempfile::TempDir;

    #[ctor::ctor]
    fn init() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    fn write_sample(dir: &TempDir, annotations: Vec<InstanceAnnotation>) {
        let masks = dir.path().join("masks");
        fs::create_dir_all(&masks).unwrap();

        let mut mask = RgbImage::new(16, 16);
        for y in 2..7 {
            for x in 2..6 {
                mask.put_pixel(x, y, Color::new(1, 0, 0).into());
            }
        }
        mask.save(masks.join("00000.png")).unwrap();

        let dataset = StrawberryDataset {
            images: vec![DatasetImage {
                id: 0,
                file_name: "00000.png".to_owned(),
                width: 16,
                height: 16,
            }],
            annotations,
            ..Default::default()
        };
        fs::write(
            dir.path().join("annotations.json"),
            serde_json::to_string(&dataset).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_check_sample_from_disk() {
        let dir = TempDir::new().unwrap();
        write_sample(
            &dir,
            vec![InstanceAnnotation {
                id: 1,
                image_id: 0,
                instance_id: 1,
                category_id: 0,
                bbox: [2.0, 2.0, 4.0, 5.0],
                area: 20.0,
                parent_id: 0,
                segmentation_color: [1, 0, 0],
            }],
        );

        let sample = check_sample(dir.path(), 0, &CheckConfig::default()).unwrap();
        assert_eq!(sample.file_name, "00000.png");
        assert!(sample.report.is_valid(), "{}", sample.report);

        let all = check_dataset(dir.path(), &CheckConfig::default()).unwrap();
        assert_eq!(all.samples.len(), 1);
        assert!(all.is_valid());
    }

    #[test]
    fn test_check_sample_missing_inputs() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            check_sample(dir.path(), 0, &CheckConfig::default()),
            Err(Error::MissingInput(_))
        ));

        write_sample(&dir, Vec::new());
        assert!(matches!(
            check_sample(dir.path(), 3, &CheckConfig::default()),
            Err(Error::InvalidAnnotations(_))
        ));
    }
}
