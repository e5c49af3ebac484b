// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Annotation file data structures for serde serialization/deserialization.
//!
//! The layout is COCO-like with three dataset-specific annotation fields:
//! `instance_id`, `parent_id` and `segmentation_color`.

use crate::codec::{Color, ObjectKey, ObjectType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level annotation file (`annotations.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrawberryDataset {
    /// Dataset metadata (optional).
    #[serde(default)]
    pub info: DatasetInfo,
    /// List of images in the dataset.
    pub images: Vec<DatasetImage>,
    /// List of annotations (one per retained object instance).
    #[serde(default)]
    pub annotations: Vec<InstanceAnnotation>,
    /// List of object categories.
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// Dataset metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetInfo {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub date_created: Option<String>,
}

/// Image metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetImage {
    /// Unique image ID.
    pub id: u64,
    /// Filename within the `images/` folder (e.g. `00001.png`).
    pub file_name: String,
    /// Image width in pixels.
    #[serde(default)]
    pub width: u32,
    /// Image height in pixels.
    #[serde(default)]
    pub height: u32,
}

/// Category definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Category {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub supercategory: Option<String>,
}

/// One retained object instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceAnnotation {
    /// Unique annotation ID.
    #[serde(default)]
    pub id: u64,
    /// ID of the image containing this object.
    pub image_id: u64,
    /// Per-image instance id, also stored in the mask.
    pub instance_id: u32,
    /// 0 = ripe, 1 = unripe, 2 = half ripe, 3 = peduncle.
    pub category_id: u32,
    /// Bounding box: `[x, y, width, height]` in pixels.
    pub bbox: [f64; 4],
    /// Pixel count of the instance's mask region.
    #[serde(default)]
    pub area: f64,
    /// Instance id of the associated peduncle; 0 for peduncles.
    #[serde(default)]
    pub parent_id: u32,
    /// Exact mask color of this instance as `[r, g, b]`.
    #[serde(default)]
    pub segmentation_color: [u8; 3],
}

impl InstanceAnnotation {
    pub fn object_type(&self) -> Option<ObjectType> {
        ObjectType::from_category_id(self.category_id)
    }

    /// Key this record describes, `None` for unknown categories.
    pub fn object_key(&self) -> Option<ObjectKey> {
        self.object_type()
            .map(|object_type| ObjectKey::new(object_type, self.instance_id))
    }

    pub fn is_primary(&self) -> bool {
        self.object_type().is_some_and(ObjectType::is_primary)
    }

    pub fn is_peduncle(&self) -> bool {
        self.object_type() == Some(ObjectType::Peduncle)
    }

    pub fn color(&self) -> Color {
        Color::from(self.segmentation_color)
    }

    /// Stored bbox area (`width * height`).
    pub fn bbox_area(&self) -> f64 {
        self.bbox[2] * self.bbox[3]
    }

    /// Center point of the stored bbox.
    pub fn bbox_center(&self) -> (f64, f64) {
        (
            self.bbox[0] + self.bbox[2] / 2.0,
            self.bbox[1] + self.bbox[3] / 2.0,
        )
    }
}

/// Lookup tables for efficient annotation access.
#[derive(Debug, Clone)]
pub struct DatasetIndex {
    /// `image_id` → `DatasetImage`
    pub images: HashMap<u64, DatasetImage>,
    /// `file_name` → `image_id`
    pub image_ids_by_name: HashMap<String, u64>,
    /// `category_id` → `Category`
    pub categories: HashMap<u32, Category>,
    /// `image_id` → `Vec<InstanceAnnotation>`
    pub annotations_by_image: HashMap<u64, Vec<InstanceAnnotation>>,
}

impl DatasetIndex {
    /// Build lookup index from a `StrawberryDataset`.
    pub fn from_dataset(dataset: &StrawberryDataset) -> Self {
        let images: HashMap<_, _> = dataset
            .images
            .iter()
            .map(|img| (img.id, img.clone()))
            .collect();

        let image_ids_by_name: HashMap<_, _> = dataset
            .images
            .iter()
            .map(|img| (img.file_name.clone(), img.id))
            .collect();

        let categories: HashMap<_, _> = dataset
            .categories
            .iter()
            .map(|cat| (cat.id, cat.clone()))
            .collect();

        let mut annotations_by_image: HashMap<u64, Vec<InstanceAnnotation>> = HashMap::new();
        for ann in &dataset.annotations {
            annotations_by_image
                .entry(ann.image_id)
                .or_default()
                .push(ann.clone());
        }

        Self {
            images,
            image_ids_by_name,
            categories,
            annotations_by_image,
        }
    }

    /// Get the image record for a file name such as `00001.png`.
    pub fn image_by_name(&self, file_name: &str) -> Option<&DatasetImage> {
        self.image_ids_by_name
            .get(file_name)
            .and_then(|id| self.images.get(id))
    }

    pub fn category_name(&self, category_id: u32) -> Option<&str> {
        self.categories.get(&category_id).map(|c| c.name.as_str())
    }

    /// Get annotations for an image.
    pub fn annotations_for_image(&self, image_id: u64) -> &[InstanceAnnotation] {
        self.annotations_by_image
            .get(&image_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_deserialize_with_defaults() {
        let json = r#"{
            "id": 4,
            "image_id": 1,
            "instance_id": 7,
            "category_id": 3,
            "bbox": [10, 20, 5, 8],
            "area": 31,
            "segmentation_color": [0, 7, 3],
            "iscrowd": 0
        }"#;
        let ann: InstanceAnnotation = serde_json::from_str(json).unwrap();

        assert_eq!(ann.parent_id, 0);
        assert!(ann.is_peduncle());
        assert!(!ann.is_primary());
        assert_eq!(ann.object_key(), Some(ObjectKey::new(ObjectType::Peduncle, 7)));
        assert_eq!(ann.color(), Color::new(0, 7, 3));
        assert_eq!(ann.bbox_area(), 40.0);
        assert_eq!(ann.bbox_center(), (12.5, 24.0));
    }

    #[test]
    fn test_unknown_category_has_no_key() {
        let ann = InstanceAnnotation {
            category_id: 9,
            instance_id: 1,
            ..Default::default()
        };
        assert_eq!(ann.object_key(), None);
        assert!(!ann.is_primary());
    }

    #[test]
    fn test_dataset_index() {
        let dataset = StrawberryDataset {
            images: vec![
                DatasetImage {
                    id: 0,
                    file_name: "00000.png".to_string(),
                    width: 1024,
                    height: 1024,
                },
                DatasetImage {
                    id: 1,
                    file_name: "00001.png".to_string(),
                    width: 1024,
                    height: 1024,
                },
            ],
            categories: vec![
                Category {
                    id: 0,
                    name: "strawberry_ripe".to_string(),
                    supercategory: None,
                },
                Category {
                    id: 3,
                    name: "peduncle".to_string(),
                    supercategory: None,
                },
            ],
            annotations: vec![
                InstanceAnnotation {
                    id: 1,
                    image_id: 1,
                    instance_id: 1,
                    category_id: 0,
                    parent_id: 2,
                    ..Default::default()
                },
                InstanceAnnotation {
                    id: 2,
                    image_id: 1,
                    instance_id: 2,
                    category_id: 3,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let index = DatasetIndex::from_dataset(&dataset);
        assert_eq!(index.image_by_name("00001.png").map(|i| i.id), Some(1));
        assert!(index.image_by_name("00002.png").is_none());
        assert_eq!(index.category_name(3), Some("peduncle"));
        assert_eq!(index.annotations_for_image(1).len(), 2);
        assert!(index.annotations_for_image(0).is_empty());
    }
}
