// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Single-pass mask scanning.
//!
//! [`MaskScan`] visits every pixel of a color-encoded mask once and collects
//! everything the cross-validator needs: which key each color decodes to,
//! per-key pixel counts, bounding rectangles and colors, and every decode
//! fault. Accumulators are ordered maps, so a row-parallel scan merges into
//! exactly the same result as a sequential one.

use crate::{
    Error,
    codec::{Color, DecodeFault, EncodingVersion, ObjectKey},
};
use image::RgbImage;
use log::debug;
use rayon::prelude::*;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::Path,
};

/// Inclusive pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl PixelBounds {
    pub fn point(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    pub fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn union(&mut self, other: &PixelBounds) {
        self.include(other.min_x, other.min_y);
        self.include(other.max_x, other.max_y);
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// As an annotation bbox `[x, y, width, height]`.
    pub fn to_bbox(&self) -> [f64; 4] {
        [
            f64::from(self.min_x),
            f64::from(self.min_y),
            f64::from(self.width()),
            f64::from(self.height()),
        ]
    }
}

/// Everything the scan knows about one decoded object.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyStats {
    pub pixels: u64,
    pub bounds: PixelBounds,
    pub colors: BTreeSet<Color>,
}

impl KeyStats {
    fn new(x: u32, y: u32, color: Color) -> Self {
        Self {
            pixels: 1,
            bounds: PixelBounds::point(x, y),
            colors: BTreeSet::from([color]),
        }
    }

    fn merge(&mut self, other: KeyStats) {
        self.pixels += other.pixels;
        self.bounds.union(&other.bounds);
        self.colors.extend(other.colors);
    }
}

/// Accumulated result of scanning one mask.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskScan {
    pub encoding: EncodingVersion,
    pub width: u32,
    pub height: u32,
    /// Color → key it decodes to.
    pub colors: BTreeMap<Color, ObjectKey>,
    /// Key → pixel statistics.
    pub objects: BTreeMap<ObjectKey, KeyStats>,
    /// Pixels with an invalid category channel, in row-major order.
    pub faults: Vec<DecodeFault>,
    pub background_pixels: u64,
}

impl MaskScan {
    /// Create an empty accumulator for a `width` x `height` mask.
    pub fn new(encoding: EncodingVersion, width: u32, height: u32) -> Self {
        Self {
            encoding,
            width,
            height,
            colors: BTreeMap::new(),
            objects: BTreeMap::new(),
            faults: Vec::new(),
            background_pixels: 0,
        }
    }

    /// Scan every pixel of `mask` in row-major order.
    pub fn scan(mask: &RgbImage, encoding: EncodingVersion) -> Self {
        let mut scan = Self::new(encoding, mask.width(), mask.height());
        for (x, y, pixel) in mask.enumerate_pixels() {
            scan.visit(x, y, Color::from(*pixel));
        }
        scan.finish()
    }

    /// Scan with rows partitioned across the rayon pool.
    ///
    /// Produces the same result as [`MaskScan::scan`].
    pub fn scan_parallel(mask: &RgbImage, encoding: EncodingVersion) -> Self {
        let (width, height) = mask.dimensions();
        let row_len = width as usize * 3;
        if row_len == 0 {
            return Self::new(encoding, width, height);
        }

        mask.as_raw()
            .par_chunks(row_len)
            .enumerate()
            .fold(
                || Self::new(encoding, width, height),
                |mut acc, (y, row)| {
                    for (x, px) in row.chunks_exact(3).enumerate() {
                        acc.visit(x as u32, y as u32, Color::new(px[0], px[1], px[2]));
                    }
                    acc
                },
            )
            .reduce(
                || Self::new(encoding, width, height),
                |mut a, b| {
                    a.merge(b);
                    a
                },
            )
            .finish()
    }

    fn visit(&mut self, x: u32, y: u32, color: Color) {
        match self.encoding.decode(color) {
            Ok(None) => self.background_pixels += 1,
            Ok(Some(key)) => {
                self.colors.entry(color).or_insert(key);
                self.objects
                    .entry(key)
                    .and_modify(|stats| {
                        stats.pixels += 1;
                        stats.bounds.include(x, y);
                        stats.colors.insert(color);
                    })
                    .or_insert_with(|| KeyStats::new(x, y, color));
            }
            Err(fault) => self.faults.push(DecodeFault { x, y, ..fault }),
        }
    }

    fn merge(&mut self, other: MaskScan) {
        for (color, key) in other.colors {
            self.colors.entry(color).or_insert(key);
        }
        for (key, stats) in other.objects {
            match self.objects.get_mut(&key) {
                Some(existing) => existing.merge(stats),
                None => {
                    self.objects.insert(key, stats);
                }
            }
        }
        self.faults.extend(other.faults);
        self.background_pixels += other.background_pixels;
    }

    fn finish(mut self) -> Self {
        self.faults.sort();
        debug!(
            "Scanned {}x{} mask ({}): {} colors, {} objects, {} faults",
            self.width,
            self.height,
            self.encoding,
            self.colors.len(),
            self.objects.len(),
            self.faults.len()
        );
        self
    }

    /// Pixel count of `key`, zero when absent.
    pub fn pixel_count(&self, key: &ObjectKey) -> u64 {
        self.objects.get(key).map(|s| s.pixels).unwrap_or(0)
    }

    pub fn bounds(&self, key: &ObjectKey) -> Option<PixelBounds> {
        self.objects.get(key).map(|s| s.bounds)
    }

    pub fn contains_color(&self, color: &Color) -> bool {
        self.colors.contains_key(color)
    }

    /// Smallest and largest decoded instance id.
    pub fn id_range(&self) -> Option<(u32, u32)> {
        let ids = self.objects.keys().map(|k| k.instance_id);
        let min = ids.clone().min()?;
        let max = ids.max()?;
        Some((min, max))
    }

    /// Check that colors and keys are in one-to-one correspondence.
    pub fn bijection(&self) -> BijectionReport {
        let collisions = self
            .objects
            .iter()
            .filter(|(_, stats)| stats.colors.len() > 1)
            .map(|(key, stats)| (*key, stats.colors.iter().copied().collect()))
            .collect();

        BijectionReport {
            color_count: self.colors.len(),
            key_count: self.objects.len(),
            collisions,
        }
    }
}

/// Load a mask image as 8-bit RGB.
pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<RgbImage, Error> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::MissingInput(format!(
            "mask not found: {}",
            path.display()
        )));
    }
    Ok(image::open(path)?.to_rgb8())
}

/// Outcome of the color/key one-to-one check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BijectionReport {
    /// Distinct non-background colors.
    pub color_count: usize,
    /// Distinct decoded keys.
    pub key_count: usize,
    /// Keys represented by more than one color.
    pub collisions: Vec<(ObjectKey, Vec<Color>)>,
}

impl BijectionReport {
    pub fn is_valid(&self) -> bool {
        self.color_count == self.key_count
    }
}

impl fmt::Display for BijectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "║ Bijection:")?;
        writeln!(
            f,
            "║   Colors: {}  Objects: {}",
            self.color_count, self.key_count
        )?;
        for (key, colors) in &self.collisions {
            let colors: Vec<String> = colors.iter().map(|c| c.to_string()).collect();
            writeln!(f, "║   ✗ {} has {} colors: {}", key, colors.len(), colors.join(", "))?;
        }
        Ok(())
    }
}
