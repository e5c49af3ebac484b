// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! # Annotation File Support
//!
//! Reads the dataset's COCO-style `annotations.json` and indexes it per
//! image. Each record describes one retained instance: its category, its
//! per-image `instance_id`, the `parent_id` linking a strawberry to its
//! peduncle, and the exact `segmentation_color` used in the mask.
//!
//! ## Example
//!
//! ```rust,no_run
//! use strawset::annotations::{AnnotationReader, DatasetIndex, find_pairs};
//!
//! let dataset = AnnotationReader::new().read_json("strawberry_dataset/annotations.json")?;
//! let index = DatasetIndex::from_dataset(&dataset);
//! let pairs = find_pairs(index.annotations_for_image(0));
//! println!("{} strawberry-peduncle pairs", pairs.len());
//! # Ok::<(), strawset::Error>(())
//! ```

mod pairs;
mod reader;
mod types;

pub use pairs::find_pairs;
pub use reader::{AnnotationReadOptions, AnnotationReader, validate_dataset};
pub use types::{
    Category, DatasetImage, DatasetIndex, DatasetInfo, InstanceAnnotation, StrawberryDataset,
};
