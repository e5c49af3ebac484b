// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Dataset statistics.

use crate::{
    Error,
    annotations::{AnnotationReader, Category, StrawberryDataset, find_pairs},
    layout::{DatasetLayout, list_files, sample_index},
};
use log::warn;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
};

/// File counts and, when present, annotation statistics of a dataset.
#[derive(Debug, Clone, Default)]
pub struct DatasetOverview {
    pub image_files: usize,
    pub label_files: usize,
    pub depth_files: usize,
    pub mask_files: usize,
    pub annotations: Option<AnnotationSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct AnnotationSummary {
    pub image_count: usize,
    pub annotation_count: usize,
    pub categories: Vec<Category>,
    /// `category_id` → record count.
    pub per_category: BTreeMap<u32, usize>,
    pub duplicate_image_ids: Vec<u64>,
    pub duplicate_annotation_ids: Vec<u64>,
    /// Smallest and largest numeric image index.
    pub index_range: Option<(u32, u32)>,
    /// Inclusive runs of indices missing from the range.
    pub index_gaps: Vec<(u32, u32)>,
    /// Index the next generated image should use, `None` once `u32::MAX`
    /// is taken.
    pub next_index: Option<u32>,
    /// Strawberry-peduncle pairs across all images.
    pub total_pairs: usize,
}

impl AnnotationSummary {
    pub fn from_dataset(dataset: &StrawberryDataset) -> Self {
        let mut per_category = BTreeMap::new();
        for ann in &dataset.annotations {
            *per_category.entry(ann.category_id).or_insert(0) += 1;
        }

        let indices: BTreeSet<u32> = dataset
            .images
            .iter()
            .filter_map(|img| sample_index(&img.file_name))
            .collect();
        let index_range = indices.first().copied().zip(indices.last().copied());
        let index_gaps = indices
            .iter()
            .copied()
            .zip(indices.iter().copied().skip(1))
            .filter(|&(a, b)| b - a > 1)
            .map(|(a, b)| (a + 1, b - 1))
            .collect();
        let next_index = match index_range {
            Some((_, max)) => max.checked_add(1),
            None => Some(0),
        };

        let mut by_image: HashMap<u64, Vec<_>> = HashMap::new();
        for ann in &dataset.annotations {
            by_image.entry(ann.image_id).or_default().push(ann.clone());
        }
        let total_pairs = by_image.values().map(|anns| find_pairs(anns).len()).sum();

        Self {
            image_count: dataset.images.len(),
            annotation_count: dataset.annotations.len(),
            categories: dataset.categories.clone(),
            per_category,
            duplicate_image_ids: duplicates(dataset.images.iter().map(|i| i.id)),
            duplicate_annotation_ids: duplicates(dataset.annotations.iter().map(|a| a.id)),
            index_range,
            index_gaps,
            next_index,
            total_pairs,
        }
    }

    pub fn category_name(&self, category_id: u32) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.id == category_id)
            .map(|c| c.name.as_str())
    }
}

fn duplicates(ids: impl Iterator<Item = u64>) -> Vec<u64> {
    let mut seen = BTreeSet::new();
    let mut dups = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            dups.insert(id);
        }
    }
    dups.into_iter().collect()
}

/// Gather statistics for the dataset at `dataset_root`.
///
/// A missing annotation file leaves [`DatasetOverview::annotations`] empty;
/// a malformed one is an error.
pub fn gather<P: AsRef<std::path::Path>>(dataset_root: P) -> Result<DatasetOverview, Error> {
    let layout = DatasetLayout::open(dataset_root)?;

    let annotations = match AnnotationReader::new().read_json(layout.annotations_path()) {
        Ok(dataset) => Some(AnnotationSummary::from_dataset(&dataset)),
        Err(Error::MissingInput(msg)) => {
            warn!("{}", msg);
            None
        }
        Err(err) => return Err(err),
    };

    Ok(DatasetOverview {
        image_files: list_files(&layout.images_dir(), ".png")?.len(),
        label_files: list_files(&layout.labels_dir(), ".txt")?.len(),
        depth_files: list_files(&layout.depth_dir(), ".png")?.len(),
        mask_files: list_files(&layout.masks_dir(), ".png")?.len(),
        annotations,
    })
}

impl fmt::Display for DatasetOverview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "==================================================")?;
        writeln!(f, "DATASET STATISTICS")?;
        writeln!(f, "==================================================")?;
        writeln!(f, "Images:      {}", self.image_files)?;
        writeln!(f, "Labels:      {}", self.label_files)?;
        writeln!(f, "Depth maps:  {}", self.depth_files)?;
        writeln!(f, "Masks:       {}", self.mask_files)?;

        let Some(summary) = &self.annotations else {
            return writeln!(f, "Annotations: (annotations.json not found)");
        };
        writeln!(f, "Annotated images: {}", summary.image_count)?;
        writeln!(f, "Annotations: {}", summary.annotation_count)?;
        writeln!(f, "Categories:")?;
        for (category_id, count) in &summary.per_category {
            let name = summary.category_name(*category_id).unwrap_or("unknown");
            writeln!(f, "  {}: {:<22} {}", category_id, name, count)?;
        }
        writeln!(f, "Strawberry-peduncle pairs: {}", summary.total_pairs)?;
        match summary.index_range {
            Some((min, max)) => writeln!(f, "Index range: {} - {}", min, max)?,
            None => writeln!(f, "Index range: (none)")?,
        }
        if !summary.index_gaps.is_empty() {
            let gaps: Vec<String> = summary
                .index_gaps
                .iter()
                .map(|(start, end)| {
                    if start == end {
                        start.to_string()
                    } else {
                        format!("{}-{}", start, end)
                    }
                })
                .collect();
            writeln!(f, "Index gaps: {}", gaps.join(", "))?;
        }
        match summary.next_index {
            Some(next) => writeln!(f, "Next index: {}", next)?,
            None => writeln!(f, "Next index: (index space exhausted)")?,
        }
        if !summary.duplicate_image_ids.is_empty() {
            writeln!(f, "✗ Duplicate image ids: {:?}", summary.duplicate_image_ids)?;
        }
        if !summary.duplicate_annotation_ids.is_empty() {
            writeln!(
                f,
                "✗ Duplicate annotation ids: {:?}",
                summary.duplicate_annotation_ids
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{DatasetImage, InstanceAnnotation};
    use std::fs;
    use tempfile::TempDir;

    fn image(id: u64, index: u32) -> DatasetImage {
        DatasetImage {
            id,
            file_name: format!("{:05}.png", index),
            ..Default::default()
        }
    }

    fn ann(id: u64, image_id: u64, instance_id: u32, category_id: u32, parent_id: u32) -> InstanceAnnotation {
        InstanceAnnotation {
            id,
            image_id,
            instance_id,
            category_id,
            parent_id,
            ..Default::default()
        }
    }

    #[test]
    fn test_summary() {
        let dataset = StrawberryDataset {
            images: vec![image(0, 0), image(1, 1), image(1, 4)],
            annotations: vec![
                ann(1, 0, 1, 0, 2),
                ann(2, 0, 2, 3, 0),
                ann(3, 1, 1, 1, 2),
                ann(3, 1, 2, 3, 0),
                ann(5, 1, 3, 2, 0),
            ],
            ..Default::default()
        };

        let summary = AnnotationSummary::from_dataset(&dataset);
        assert_eq!(summary.image_count, 3);
        assert_eq!(summary.per_category.get(&3), Some(&2));
        assert_eq!(summary.duplicate_image_ids, vec![1]);
        assert_eq!(summary.duplicate_annotation_ids, vec![3]);
        assert_eq!(summary.index_range, Some((0, 4)));
        assert_eq!(summary.index_gaps, vec![(2, 3)]);
        assert_eq!(summary.next_index, Some(5));
        assert_eq!(summary.total_pairs, 2);
    }

    #[test]
    fn test_empty_summary() {
        let summary = AnnotationSummary::from_dataset(&StrawberryDataset::default());
        assert_eq!(summary.index_range, None);
        assert!(summary.index_gaps.is_empty());
        assert_eq!(summary.next_index, Some(0));
        assert_eq!(summary.total_pairs, 0);
    }

    #[test]
    fn test_sparse_and_maximal_indices() {
        let dataset = StrawberryDataset {
            images: vec![
                image(0, 0),
                image(1, 7),
                image(2, 9),
                DatasetImage {
                    id: 3,
                    file_name: "4294967295.png".to_owned(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let summary = AnnotationSummary::from_dataset(&dataset);
        assert_eq!(summary.index_range, Some((0, u32::MAX)));
        assert_eq!(summary.index_gaps, vec![(1, 6), (8, 8), (10, u32::MAX - 1)]);
        assert_eq!(summary.next_index, None);

        let text = DatasetOverview {
            annotations: Some(summary),
            ..Default::default()
        }
        .to_string();
        assert!(text.contains("Index gaps: 1-6, 8, 10-4294967294"));
        assert!(text.contains("Next index: (index space exhausted)"));
    }

    #[test]
    fn test_gather_counts_files() {
        let dir = TempDir::new().unwrap();
        for (sub, name) in [
            ("images", "00000.png"),
            ("images", "00001.png"),
            ("labels", "00000.txt"),
            ("masks", "00000.png"),
        ] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
            fs::write(dir.path().join(sub).join(name), b"").unwrap();
        }

        let overview = gather(dir.path()).unwrap();
        assert_eq!(overview.image_files, 2);
        assert_eq!(overview.label_files, 1);
        assert_eq!(overview.depth_files, 0);
        assert_eq!(overview.mask_files, 1);
        assert!(overview.annotations.is_none());
        assert!(overview.to_string().contains("not found"));
    }
}
