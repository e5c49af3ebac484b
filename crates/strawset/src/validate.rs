// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Mask/annotation cross-validation.
//!
//! [`validate_sample`] compares one [`MaskScan`] with the annotation records
//! of the same image. Every check runs to completion and is reported on its
//! own; [`ValidationReport::is_valid`] aggregates them into one verdict.

use crate::{
    annotations::InstanceAnnotation,
    codec::{Color, DecodeFault, EncodingVersion, ObjectKey},
    config::{CheckConfig, GeometryTolerance},
    scan::{BijectionReport, MaskScan},
};
use log::debug;
use std::{
    collections::BTreeSet,
    fmt,
};

const LIST_LIMIT: usize = 5;

/// Result of cross-validating one sample.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub image_id: u64,
    pub encoding: EncodingVersion,
    /// Annotation records considered for this image.
    pub annotation_count: usize,
    pub bijection: BijectionReport,
    pub decode_faults: Vec<DecodeFault>,
    pub threshold: ThresholdResult,
    pub id_offset: IdOffsetResult,
    pub channel_separation: ChannelSeparationResult,
    pub pairing: PairingResult,
    pub geometry: GeometryResult,
    pub colors: ColorResult,
}

impl ValidationReport {
    /// Named checks and whether each passed, in report order.
    pub fn checks(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("Bijection", self.bijection.is_valid()),
            ("Decode", self.decode_faults.is_empty()),
            ("Threshold Applied", self.threshold.is_valid()),
            ("ID Offset", self.id_offset.is_valid()),
            ("Channel Separation", self.channel_separation.is_valid()),
            ("Pairing", self.pairing.is_valid()),
            ("Geometry", self.geometry.is_valid()),
            ("Segmentation Color", self.colors.is_valid()),
        ]
    }

    /// Returns true if every check passed.
    pub fn is_valid(&self) -> bool {
        self.checks().iter().all(|(_, passed)| *passed)
    }

    /// Names of the failed checks.
    pub fn failures(&self) -> Vec<&'static str> {
        self.checks()
            .into_iter()
            .filter(|(_, passed)| !passed)
            .map(|(name, _)| name)
            .collect()
    }
}

fn write_limited<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    marker: &str,
    items: &[T],
) -> fmt::Result {
    for item in items.iter().take(LIST_LIMIT) {
        writeln!(f, "║   {} {}", marker, item)?;
    }
    if items.len() > LIST_LIMIT {
        writeln!(f, "║     ... and {} more", items.len() - LIST_LIMIT)?;
    }
    Ok(())
}

const RULE: &str = "╠══════════════════════════════════════════════════════════════╣";

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "╔══════════════════════════════════════════════════════════════╗"
        )?;
        writeln!(
            f,
            "║                COMPREHENSIVE DATASET VERIFICATION            ║"
        )?;
        writeln!(f, "{}", RULE)?;
        writeln!(
            f,
            "║ Image: {}  Encoding: {}  Annotations: {}",
            self.image_id, self.encoding, self.annotation_count
        )?;
        writeln!(f, "{}", RULE)?;
        write!(f, "{}", self.bijection)?;
        writeln!(f, "║   Decode faults: {}", self.decode_faults.len())?;
        write_limited(f, "✗", &self.decode_faults)?;
        writeln!(f, "{}", RULE)?;
        write!(f, "{}", self.threshold)?;
        writeln!(f, "{}", RULE)?;
        write!(f, "{}", self.id_offset)?;
        writeln!(f, "{}", RULE)?;
        write!(f, "{}", self.channel_separation)?;
        writeln!(f, "{}", RULE)?;
        write!(f, "{}", self.pairing)?;
        writeln!(f, "{}", RULE)?;
        write!(f, "{}", self.geometry)?;
        writeln!(f, "{}", RULE)?;
        write!(f, "{}", self.colors)?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "║ Summary:")?;
        for (name, passed) in self.checks() {
            let status = if passed { "✓ PASS" } else { "✗ FAIL" };
            writeln!(f, "║   {}: {}", status, name)?;
        }
        let status = if self.is_valid() {
            "✓ PASSED"
        } else {
            "✗ FAILED"
        };
        writeln!(f, "║ Status: {}", status)?;
        writeln!(
            f,
            "╚══════════════════════════════════════════════════════════════╝"
        )?;
        Ok(())
    }
}

/// An annotation record whose stored area is below the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct UndersizedRecord {
    pub instance_id: u32,
    pub category_id: u32,
    pub area: f64,
}

impl fmt::Display for UndersizedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID {} cat {}: area {} px",
            self.instance_id, self.category_id, self.area
        )
    }
}

/// A mask object together with its pixel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizedKey {
    pub key: ObjectKey,
    pub pixels: u64,
}

impl fmt::Display for SizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:3} px", self.key, self.pixels)
    }
}

/// Threshold consistency between mask pixel counts and annotations.
#[derive(Debug, Clone, Default)]
pub struct ThresholdResult {
    pub min_area: u32,
    /// Distinct objects decoded from the mask.
    pub mask_objects: usize,
    /// Distinct objects present in the annotations.
    pub annotated_objects: usize,
    /// Records with `area` below the threshold.
    pub undersized_records: Vec<UndersizedRecord>,
    /// Objects below the threshold in the mask that are still annotated.
    pub annotated_below_threshold: Vec<SizedKey>,
    /// Objects at or above the threshold that have no record.
    pub missing_annotations: Vec<SizedKey>,
    /// Objects below the threshold correctly left out.
    pub filtered: Vec<SizedKey>,
}

impl ThresholdResult {
    pub fn is_valid(&self) -> bool {
        self.undersized_records.is_empty()
            && self.annotated_below_threshold.is_empty()
            && self.missing_annotations.is_empty()
    }
}

impl fmt::Display for ThresholdResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "║ Pixel Threshold ({} px):", self.min_area)?;
        writeln!(
            f,
            "║   Mask objects: {}  Annotated: {}  Filtered: {}",
            self.mask_objects,
            self.annotated_objects,
            self.filtered.len()
        )?;
        if !self.undersized_records.is_empty() {
            writeln!(
                f,
                "║   Records below threshold: {}",
                self.undersized_records.len()
            )?;
            write_limited(f, "✗", &self.undersized_records)?;
        }
        if !self.annotated_below_threshold.is_empty() {
            writeln!(
                f,
                "║   Annotated despite < {} px: {}",
                self.min_area,
                self.annotated_below_threshold.len()
            )?;
            write_limited(f, "✗", &self.annotated_below_threshold)?;
        }
        if !self.missing_annotations.is_empty() {
            writeln!(
                f,
                "║   Missing from annotations: {}",
                self.missing_annotations.len()
            )?;
            write_limited(f, "✗", &self.missing_annotations)?;
        }
        if !self.filtered.is_empty() {
            writeln!(f, "║   Correctly excluded:")?;
            write_limited(f, "✓", &self.filtered)?;
        }
        Ok(())
    }
}

/// Background-collision check on instance ids.
#[derive(Debug, Clone, Default)]
pub struct IdOffsetResult {
    /// Smallest and largest decoded id.
    pub id_range: Option<(u32, u32)>,
    /// Decoded objects with id 0.
    pub zero_id_objects: Vec<ObjectKey>,
    /// Annotation ids of records with `instance_id == 0`.
    pub zero_id_records: Vec<u64>,
}

impl IdOffsetResult {
    pub fn is_valid(&self) -> bool {
        self.zero_id_objects.is_empty() && self.zero_id_records.is_empty()
    }
}

impl fmt::Display for IdOffsetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "║ ID Offset:")?;
        match self.id_range {
            Some((min, max)) => writeln!(f, "║   ID range: {} - {}", min, max)?,
            None => writeln!(f, "║   ID range: (no objects)")?,
        }
        write_limited(f, "✗ ID=0 in mask:", &self.zero_id_objects)?;
        write_limited(f, "✗ ID=0 in annotation", &self.zero_id_records)?;
        Ok(())
    }
}

/// A color that stores a value in the id channel its key does not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelViolation {
    pub color: Color,
    pub key: ObjectKey,
}

impl fmt::Display for ChannelViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.color, self.key)
    }
}

/// Channel separation between strawberry and peduncle colors.
#[derive(Debug, Clone, Default)]
pub struct ChannelSeparationResult {
    /// False when the encoding does not require separation.
    pub applicable: bool,
    pub primary_colors: usize,
    pub secondary_colors: usize,
    pub violations: Vec<ChannelViolation>,
}

impl ChannelSeparationResult {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ChannelSeparationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "║ Channel Separation:")?;
        if !self.applicable {
            writeln!(f, "║   Skipped (encoding stores both ids)")?;
            return Ok(());
        }
        writeln!(
            f,
            "║   Strawberry colors: {}  Peduncle colors: {}",
            self.primary_colors, self.secondary_colors
        )?;
        write_limited(f, "✗", &self.violations)?;
        Ok(())
    }
}

/// A strawberry record without a peduncle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpairedRecord {
    pub instance_id: u32,
    /// Zero when no peduncle was referenced, otherwise a dangling reference.
    pub parent_id: u32,
}

impl UnpairedRecord {
    pub fn is_dangling(&self) -> bool {
        self.parent_id != 0
    }
}

impl fmt::Display for UnpairedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dangling() {
            write!(
                f,
                "strawberry {} → missing peduncle {}",
                self.instance_id, self.parent_id
            )
        } else {
            write!(f, "strawberry {} has no peduncle", self.instance_id)
        }
    }
}

/// Parent/child consistency between strawberry and peduncle records.
#[derive(Debug, Clone, Default)]
pub struct PairingResult {
    /// `(strawberry instance_id, peduncle instance_id)`
    pub paired: Vec<(u32, u32)>,
    pub unpaired: Vec<UnpairedRecord>,
    /// Peduncles no strawberry references.
    pub unreferenced_peduncles: Vec<u32>,
    /// `(peduncle instance_id, parent_id)` for peduncles with a parent.
    pub peduncle_parents: Vec<(u32, u32)>,
}

impl PairingResult {
    /// Unpaired strawberries whose `parent_id` names no peduncle.
    pub fn dangling(&self) -> Vec<UnpairedRecord> {
        self.unpaired
            .iter()
            .filter(|u| u.is_dangling())
            .copied()
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.dangling().is_empty() && self.peduncle_parents.is_empty()
    }
}

impl fmt::Display for PairingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "║ Object Pairing:")?;
        writeln!(f, "║   Paired (strawberry + peduncle): {}", self.paired.len())?;
        writeln!(f, "║   Strawberry only: {}", self.unpaired.len())?;
        writeln!(
            f,
            "║   Peduncle only: {}",
            self.unreferenced_peduncles.len()
        )?;
        write_limited(f, "⚠", &self.unpaired)?;
        for (ped, parent) in self.peduncle_parents.iter().take(LIST_LIMIT) {
            writeln!(f, "║   ✗ peduncle {} has parent_id {}", ped, parent)?;
        }
        Ok(())
    }
}

/// Stored bbox of one record compared with the bbox derived from the mask.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceGeometry {
    pub key: ObjectKey,
    pub stored_bbox: [f64; 4],
    pub mask_bbox: [f64; 4],
    pub pixels: u64,
    /// `w * h` of the stored bbox.
    pub stored_area: f64,
    /// `w * h` of the mask-derived bbox.
    pub mask_bbox_area: f64,
    /// `mask_bbox_area / stored_area`, zero for an empty stored bbox.
    pub area_ratio: f64,
    /// `pixels / stored_area`, zero for an empty stored bbox.
    pub pixel_ratio: f64,
    pub iou: f64,
}

impl fmt::Display for InstanceGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Pixels={:5}, JSON_Area={:5}, Mask_Area={:5}, Ratio={:.2}, IoU={:.2}",
            self.key,
            self.pixels,
            self.stored_area,
            self.mask_bbox_area,
            self.area_ratio,
            self.iou
        )
    }
}

/// Geometric cross-check of stored bboxes.
#[derive(Debug, Clone, Default)]
pub struct GeometryResult {
    pub tolerance: GeometryTolerance,
    pub instances: Vec<InstanceGeometry>,
    /// Records whose key never occurs in the mask.
    pub missing_from_mask: Vec<ObjectKey>,
}

impl GeometryResult {
    /// Instances whose area ratio falls outside the tolerance.
    pub fn flagged(&self) -> Vec<&InstanceGeometry> {
        self.instances
            .iter()
            .filter(|g| !self.tolerance.accepts(g.area_ratio))
            .collect()
    }

    pub fn avg_iou(&self) -> f64 {
        if self.instances.is_empty() {
            1.0
        } else {
            self.instances.iter().map(|g| g.iou).sum::<f64>() / self.instances.len() as f64
        }
    }

    pub fn is_valid(&self) -> bool {
        self.missing_from_mask.is_empty() && self.flagged().is_empty()
    }
}

impl fmt::Display for GeometryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flagged = self.flagged();
        writeln!(f, "║ Geometry (JSON bbox vs mask bbox):")?;
        writeln!(
            f,
            "║   Compared: {}  Avg IoU: {:.4}  Ratio bounds: [{}, {}]",
            self.instances.len(),
            self.avg_iou(),
            self.tolerance.min_ratio,
            self.tolerance.max_ratio
        )?;
        write_limited(f, "✗", &flagged)?;
        write_limited(f, "✗ in JSON but not in mask:", &self.missing_from_mask)?;
        Ok(())
    }
}

/// A record whose `segmentation_color` does not decode to its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorMismatch {
    pub instance_id: u32,
    pub category_id: u32,
    pub color: Color,
    /// What the color decodes to; `None` for background or invalid colors.
    pub decoded: Option<ObjectKey>,
}

impl fmt::Display for ColorMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decoded {
            Some(key) => write!(
                f,
                "ID {} cat {}: {} decodes to {}",
                self.instance_id, self.category_id, self.color, key
            ),
            None => write!(
                f,
                "ID {} cat {}: {} is not an object color",
                self.instance_id, self.category_id, self.color
            ),
        }
    }
}

/// An annotated color with no pixel in the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsentColor {
    pub color: Color,
    pub key: ObjectKey,
}

impl fmt::Display for AbsentColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.color, self.key)
    }
}

/// Consistency of each record's `segmentation_color` with the mask.
#[derive(Debug, Clone, Default)]
pub struct ColorResult {
    pub checked: usize,
    /// Annotation ids with a category outside `0..=3`.
    pub unknown_category: Vec<u64>,
    pub mismatched: Vec<ColorMismatch>,
    /// Colors that decode correctly but never occur in the mask.
    pub absent: Vec<AbsentColor>,
}

impl ColorResult {
    pub fn is_valid(&self) -> bool {
        self.unknown_category.is_empty() && self.mismatched.is_empty() && self.absent.is_empty()
    }
}

impl fmt::Display for ColorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "║ Segmentation Colors:")?;
        writeln!(f, "║   Checked: {}", self.checked)?;
        write_limited(f, "✗ unknown category in annotation", &self.unknown_category)?;
        write_limited(f, "✗", &self.mismatched)?;
        write_limited(f, "✗ not in mask:", &self.absent)?;
        Ok(())
    }
}

/// Calculate Intersection over Union (IoU) for two `[x, y, w, h]` bboxes.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let inter_x1 = a[0].max(b[0]);
    let inter_y1 = a[1].max(b[1]);
    let inter_x2 = (a[0] + a[2]).min(b[0] + b[2]);
    let inter_y2 = (a[1] + a[3]).min(b[1] + b[3]);

    let inter_w = (inter_x2 - inter_x1).max(0.0);
    let inter_h = (inter_y2 - inter_y1).max(0.0);
    let inter_area = inter_w * inter_h;

    let union_area = a[2] * a[3] + b[2] * b[3] - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}

/// Cross-validate a scanned mask against the annotation records of the same
/// image.
pub fn validate_sample(
    image_id: u64,
    scan: &MaskScan,
    annotations: &[InstanceAnnotation],
    config: &CheckConfig,
) -> ValidationReport {
    let report = ValidationReport {
        image_id,
        encoding: scan.encoding,
        annotation_count: annotations.len(),
        bijection: scan.bijection(),
        decode_faults: scan.faults.clone(),
        threshold: check_threshold(scan, annotations, config.min_area),
        id_offset: check_id_offset(scan, annotations),
        channel_separation: check_channel_separation(scan),
        pairing: check_pairing(annotations),
        geometry: check_geometry(scan, annotations, config.geometry),
        colors: check_colors(scan, annotations),
    };
    debug!(
        "Image {}: {} annotations, failed checks: {:?}",
        image_id,
        annotations.len(),
        report.failures()
    );
    report
}

/// Records with a decodable category, keyed by object.
fn annotated_keys(annotations: &[InstanceAnnotation]) -> BTreeSet<ObjectKey> {
    annotations.iter().filter_map(|a| a.object_key()).collect()
}

pub fn check_threshold(
    scan: &MaskScan,
    annotations: &[InstanceAnnotation],
    min_area: u32,
) -> ThresholdResult {
    let annotated = annotated_keys(annotations);
    let min_area_px = u64::from(min_area);
    let mut result = ThresholdResult {
        min_area,
        mask_objects: scan.objects.len(),
        annotated_objects: annotated.len(),
        ..Default::default()
    };

    result.undersized_records = annotations
        .iter()
        .filter(|a| a.area < f64::from(min_area))
        .map(|a| UndersizedRecord {
            instance_id: a.instance_id,
            category_id: a.category_id,
            area: a.area,
        })
        .collect();

    for (key, stats) in &scan.objects {
        let sized = SizedKey {
            key: *key,
            pixels: stats.pixels,
        };
        match (stats.pixels < min_area_px, annotated.contains(key)) {
            (true, true) => result.annotated_below_threshold.push(sized),
            (true, false) => result.filtered.push(sized),
            (false, false) => result.missing_annotations.push(sized),
            (false, true) => {}
        }
    }
    result.filtered.sort_by_key(|s| s.pixels);

    result
}

pub fn check_id_offset(scan: &MaskScan, annotations: &[InstanceAnnotation]) -> IdOffsetResult {
    IdOffsetResult {
        id_range: scan.id_range(),
        zero_id_objects: scan
            .objects
            .keys()
            .filter(|k| k.instance_id == 0)
            .copied()
            .collect(),
        zero_id_records: annotations
            .iter()
            .filter(|a| a.instance_id == 0)
            .map(|a| a.id)
            .collect(),
    }
}

pub fn check_channel_separation(scan: &MaskScan) -> ChannelSeparationResult {
    let primary_colors = scan
        .colors
        .values()
        .filter(|k| k.object_type.is_primary())
        .count();

    ChannelSeparationResult {
        applicable: scan.encoding.requires_channel_separation(),
        primary_colors,
        secondary_colors: scan.colors.len() - primary_colors,
        violations: scan
            .colors
            .iter()
            .filter(|(color, key)| scan.encoding.violates_channel_separation(**color, **key))
            .map(|(color, key)| ChannelViolation {
                color: *color,
                key: *key,
            })
            .collect(),
    }
}

pub fn check_pairing(annotations: &[InstanceAnnotation]) -> PairingResult {
    let peduncle_ids: BTreeSet<u32> = annotations
        .iter()
        .filter(|a| a.is_peduncle())
        .map(|a| a.instance_id)
        .collect();

    let mut result = PairingResult::default();
    let mut referenced = BTreeSet::new();

    for ann in annotations {
        if ann.is_primary() {
            if ann.parent_id != 0 && peduncle_ids.contains(&ann.parent_id) {
                result.paired.push((ann.instance_id, ann.parent_id));
                referenced.insert(ann.parent_id);
            } else {
                result.unpaired.push(UnpairedRecord {
                    instance_id: ann.instance_id,
                    parent_id: ann.parent_id,
                });
            }
        } else if ann.is_peduncle() && ann.parent_id != 0 {
            result.peduncle_parents.push((ann.instance_id, ann.parent_id));
        }
    }

    result.unreferenced_peduncles = peduncle_ids.difference(&referenced).copied().collect();
    result
}

pub fn check_geometry(
    scan: &MaskScan,
    annotations: &[InstanceAnnotation],
    tolerance: GeometryTolerance,
) -> GeometryResult {
    let mut result = GeometryResult {
        tolerance,
        ..Default::default()
    };

    for ann in annotations {
        let Some(key) = ann.object_key() else {
            continue;
        };
        let Some(stats) = scan.objects.get(&key) else {
            result.missing_from_mask.push(key);
            continue;
        };

        let mask_bbox = stats.bounds.to_bbox();
        let stored_area = ann.bbox_area();
        let mask_bbox_area = stats.bounds.area() as f64;
        let (area_ratio, pixel_ratio) = if stored_area > 0.0 {
            (mask_bbox_area / stored_area, stats.pixels as f64 / stored_area)
        } else {
            (0.0, 0.0)
        };

        result.instances.push(InstanceGeometry {
            key,
            stored_bbox: ann.bbox,
            mask_bbox,
            pixels: stats.pixels,
            stored_area,
            mask_bbox_area,
            area_ratio,
            pixel_ratio,
            iou: bbox_iou(&ann.bbox, &mask_bbox),
        });
    }

    result
}

pub fn check_colors(scan: &MaskScan, annotations: &[InstanceAnnotation]) -> ColorResult {
    let mut result = ColorResult::default();

    for ann in annotations {
        let Some(key) = ann.object_key() else {
            result.unknown_category.push(ann.id);
            continue;
        };
        result.checked += 1;

        let color = ann.color();
        let decoded = scan.encoding.decode(color).ok().flatten();
        if decoded != Some(key) {
            result.mismatched.push(ColorMismatch {
                instance_id: ann.instance_id,
                category_id: ann.category_id,
                color,
                decoded,
            });
        } else if !scan.contains_color(&color) {
            result.absent.push(AbsentColor { color, key });
        }
    }

    result
}
