// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Depth PNG decoding.
//!
//! Colour depth images pack a 16-bit millimetre value into two bytes: the
//! first channel is the high byte and the second the low byte. Greyscale
//! depth images store millimetres directly.

use crate::Error;
use image::DynamicImage;
use log::debug;
use std::path::Path;

/// Depth image in metres, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    pub width: u32,
    pub height: u32,
    pub meters: Vec<f32>,
}

impl DepthMap {
    fn from_millimeters(width: u32, height: u32, mm: impl Iterator<Item = u16>) -> Self {
        Self {
            width,
            height,
            meters: mm.map(|v| f32::from(v) / 1000.0).collect(),
        }
    }

    /// Depth at `(x, y)` in metres.
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.meters
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Smallest and largest positive depth; zero marks missing depth.
    pub fn valid_range(&self) -> Option<(f32, f32)> {
        self.meters
            .iter()
            .copied()
            .filter(|d| *d > 0.0)
            .fold(None, |range, d| match range {
                None => Some((d, d)),
                Some((min, max)) => Some((min.min(d), max.max(d))),
            })
    }
}

/// Convert a decoded depth image to metres.
pub fn decode_depth(img: &DynamicImage) -> DepthMap {
    let (width, height) = (img.width(), img.height());
    match img {
        DynamicImage::ImageLuma8(gray) => {
            DepthMap::from_millimeters(width, height, gray.pixels().map(|p| u16::from(p.0[0])))
        }
        DynamicImage::ImageLuma16(gray) => {
            DepthMap::from_millimeters(width, height, gray.pixels().map(|p| p.0[0]))
        }
        DynamicImage::ImageLumaA8(gray) => DepthMap::from_millimeters(
            width,
            height,
            gray.pixels().map(|p| u16::from(p.0[0]) << 8 | u16::from(p.0[1])),
        ),
        other => {
            let rgb = other.to_rgb8();
            DepthMap::from_millimeters(
                width,
                height,
                rgb.pixels().map(|p| u16::from(p.0[0]) << 8 | u16::from(p.0[1])),
            )
        }
    }
}

/// Load a depth PNG and convert it to metres.
pub fn load_depth_png<P: AsRef<Path>>(path: P) -> Result<DepthMap, Error> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::MissingInput(format!(
            "depth image not found: {}",
            path.display()
        )));
    }
    let img = image::open(path)?;
    debug!(
        "Decoding {} depth image {} ({}x{})",
        match img.color().channel_count() {
            1 => "greyscale",
            _ => "packed",
        },
        path.display(),
        img.width(),
        img.height()
    );
    Ok(decode_depth(&img))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

    #[test]
    fn test_packed_rgb_depth() {
        let mut img = RgbImage::new(2, 1);
        // 1234 mm = 0x04D2
        img.put_pixel(0, 0, Rgb([0x04, 0xD2, 0x00]));
        img.put_pixel(1, 0, Rgb([0x00, 0x00, 0xFF]));

        let depth = decode_depth(&DynamicImage::ImageRgb8(img));
        assert!((depth.get(0, 0).unwrap() - 1.234).abs() < 1e-6);
        assert_eq!(depth.get(1, 0), Some(0.0));
        assert_eq!(depth.get(2, 0), None);
        let (min, max) = depth.valid_range().unwrap();
        assert_eq!(min, max);
    }

    #[test]
    fn test_single_channel_depth() {
        let img: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_raw(2, 1, vec![500, 2500]).unwrap();
        let depth = decode_depth(&DynamicImage::ImageLuma16(img));
        assert_eq!(depth.valid_range(), Some((0.5, 2.5)));

        let depth = decode_depth(&DynamicImage::ImageLuma8(GrayImage::new(3, 3)));
        assert_eq!(depth.valid_range(), None);
    }

    #[test]
    fn test_load_png_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("00000.png");
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([0x03, 0xE8, 0]));
        img.save(&path).unwrap();

        let depth = load_depth_png(&path).unwrap();
        assert_eq!(depth.get(0, 0), Some(1.0));
        assert!(matches!(
            load_depth_png(dir.path().join("missing.png")),
            Err(Error::MissingInput(_))
        ));
    }
}
