// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Side-by-side bbox comparison images.
//!
//! Draws on a copy of the RGB sample: a translucent overlay per decoded
//! instance, the stored bboxes in green, the mask-derived bboxes in blue and
//! a white line between the bbox centres of each strawberry-peduncle pair.

use crate::{
    Error,
    annotations::{InstanceAnnotation, find_pairs},
    codec::{EncodingVersion, ObjectKey},
    scan::{MaskScan, PixelBounds},
};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_line_segment_mut},
    rect::Rect,
};
use log::debug;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::{collections::BTreeMap, path::Path};

const OVERLAY_ALPHA: f32 = 0.3;
const STORED_BBOX: Rgb<u8> = Rgb([0, 255, 0]);
const MASK_BBOX: Rgb<u8> = Rgb([0, 0, 255]);
const PAIR_LINE: Rgb<u8> = Rgb([255, 255, 255]);

/// Overlay color of an instance, stable across runs.
pub fn instance_color(instance_id: u32) -> Rgb<u8> {
    let mut rng = StdRng::seed_from_u64(u64::from(instance_id));
    Rgb([
        rng.gen_range(64..=255),
        rng.gen_range(64..=255),
        rng.gen_range(64..=255),
    ])
}

fn blend(base: &mut Rgb<u8>, over: Rgb<u8>, alpha: f32) {
    for (b, o) in base.0.iter_mut().zip(over.0) {
        *b = (f32::from(*b) * (1.0 - alpha) + f32::from(o) * alpha).round() as u8;
    }
}

/// Rectangle of inclusive pixel bounds that lie inside the image.
fn bounds_rect(bounds: &PixelBounds) -> Rect {
    Rect::at(bounds.min_x as i32, bounds.min_y as i32)
        .of_size(bounds.max_x - bounds.min_x + 1, bounds.max_y - bounds.min_y + 1)
}

/// Stored `[x, y, w, h]` bbox as a rectangle on a `width` x `height`
/// canvas, `None` when empty or entirely outside.
///
/// Edges beyond the canvas are moved to one pixel outside it, so clipped
/// sides stay invisible and the outline never spans more than the canvas.
fn stored_rect(bbox: &[f64; 4], width: u32, height: u32) -> Option<Rect> {
    let [x, y, w, h] = *bbox;
    if !(x.is_finite() && y.is_finite() && w >= 1.0 && h >= 1.0) {
        return None;
    }
    let (x0, y0) = (x.floor(), y.floor());
    let (x1, y1) = (x0 + w.round() - 1.0, y0 + h.round() - 1.0);
    let (w, h) = (f64::from(width), f64::from(height));
    if x1 < 0.0 || y1 < 0.0 || x0 >= w || y0 >= h {
        return None;
    }

    let (x0, y0) = (x0.max(-1.0), y0.max(-1.0));
    let (x1, y1) = (x1.min(w), y1.min(h));
    Some(Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0) as u32 + 1, (y1 - y0) as u32 + 1))
}

/// Clip the segment `from`-`to` to the pixel area of a `width` x `height`
/// canvas (Liang-Barsky).
fn clip_segment(
    from: (f64, f64),
    to: (f64, f64),
    width: u32,
    height: u32,
) -> Option<((f32, f32), (f32, f32))> {
    if ![from.0, from.1, to.0, to.1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (x_max, y_max) = (f64::from(width) - 1.0, f64::from(height) - 1.0);
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [
        (-dx, from.0),
        (dx, x_max - from.0),
        (-dy, from.1),
        (dy, y_max - from.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }

    let at = |t: f64| ((from.0 + t * dx) as f32, (from.1 + t * dy) as f32);
    Some((at(t0), at(t1)))
}

/// Render the comparison image for one sample.
pub fn render_comparison(
    image: &RgbImage,
    mask: &RgbImage,
    encoding: EncodingVersion,
    annotations: &[InstanceAnnotation],
) -> Result<RgbImage, Error> {
    if image.dimensions() != mask.dimensions() {
        return Err(Error::InvalidParameters(format!(
            "image is {:?} but mask is {:?}",
            image.dimensions(),
            mask.dimensions()
        )));
    }

    let mut out = image.clone();
    let mut palette: BTreeMap<ObjectKey, Rgb<u8>> = BTreeMap::new();
    for (pixel, mask_pixel) in out.pixels_mut().zip(mask.pixels()) {
        if let Ok(Some(key)) = encoding.decode((*mask_pixel).into()) {
            let color = *palette
                .entry(key)
                .or_insert_with(|| instance_color(key.instance_id));
            blend(pixel, color, OVERLAY_ALPHA);
        }
    }

    let (width, height) = out.dimensions();
    for ann in annotations {
        if let Some(rect) = stored_rect(&ann.bbox, width, height) {
            draw_hollow_rect_mut(&mut out, rect, STORED_BBOX);
        }
    }

    let scan = MaskScan::scan_parallel(mask, encoding);
    for stats in scan.objects.values() {
        draw_hollow_rect_mut(&mut out, bounds_rect(&stats.bounds), MASK_BBOX);
    }

    let pairs = find_pairs(annotations);
    for (straw, ped) in &pairs {
        let (sx, sy) = straw.bbox_center();
        let (px, py) = ped.bbox_center();
        let from = (sx.round(), sy.round());
        let to = (px.round(), py.round());
        if let Some((start, end)) = clip_segment(from, to, width, height) {
            draw_line_segment_mut(&mut out, start, end, PAIR_LINE);
        }
    }

    debug!(
        "Rendered {} overlays, {} stored bboxes, {} pairs",
        palette.len(),
        annotations.len(),
        pairs.len()
    );
    Ok(out)
}

/// Load an RGB sample image.
pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage, Error> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::MissingInput(format!(
            "image not found: {}",
            path.display()
        )));
    }
    Ok(image::open(path)?.to_rgb8())
}

/// Save a rendered image as PNG, creating parent directories.
pub fn save_png<P: AsRef<Path>>(img: &RgbImage, path: P) -> Result<(), Error> {
    if let Some(parent) = path.as_ref().parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    img.save(path.as_ref())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Color;

    #[test]
    fn test_instance_color_is_deterministic() {
        assert_eq!(instance_color(3), instance_color(3));
        assert_ne!(instance_color(3), instance_color(4));
    }

    #[test]
    fn test_render_draws_boxes_and_pair_line() {
        let image = RgbImage::new(40, 40);
        let mut mask = RgbImage::new(40, 40);
        for y in 5..15 {
            for x in 5..15 {
                mask.put_pixel(x, y, Color::new(1, 0, 0).into());
            }
        }
        let annotations = vec![
            InstanceAnnotation {
                instance_id: 1,
                category_id: 0,
                parent_id: 2,
                bbox: [4.0, 4.0, 12.0, 12.0],
                ..Default::default()
            },
            InstanceAnnotation {
                instance_id: 2,
                category_id: 3,
                bbox: [30.0, 30.0, 4.0, 4.0],
                ..Default::default()
            },
        ];

        let out = render_comparison(&image, &mask, EncodingVersion::V1, &annotations).unwrap();
        assert_eq!(*out.get_pixel(4, 4), STORED_BBOX);
        assert_eq!(*out.get_pixel(5, 5), MASK_BBOX);
        assert_eq!(*out.get_pixel(0, 0), Rgb([0, 0, 0]));
        // Interior pixel carries the overlay.
        assert_ne!(*out.get_pixel(10, 10), Rgb([0, 0, 0]));
        // Line from (10, 10) to (32, 32) passes the diagonal.
        assert_eq!(*out.get_pixel(20, 20), PAIR_LINE);
    }

    #[test]
    fn test_render_rejects_mismatched_sizes() {
        let err = render_comparison(
            &RgbImage::new(4, 4),
            &RgbImage::new(5, 4),
            EncodingVersion::V1,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
    }

    #[test]
    fn test_stored_rect_clips_to_canvas() {
        let rect = stored_rect(&[-3.0, 2.0, 6.0, 4.0], 10, 10).unwrap();
        assert_eq!((rect.left(), rect.top()), (-1, 2));
        assert_eq!((rect.right(), rect.bottom()), (2, 5));

        let rect = stored_rect(&[8.0, 8.0, 1e12, 1e12], 10, 10).unwrap();
        assert_eq!((rect.right(), rect.bottom()), (10, 10));

        assert!(stored_rect(&[20.0, 0.0, 4.0, 4.0], 10, 10).is_none());
        assert!(stored_rect(&[-9.0, 0.0, 4.0, 4.0], 10, 10).is_none());
        assert!(stored_rect(&[0.0, 0.0, 0.5, 4.0], 10, 10).is_none());
        assert!(stored_rect(&[f64::NAN, 0.0, 4.0, 4.0], 10, 10).is_none());
    }

    #[test]
    fn test_render_clips_partial_and_huge_boxes() {
        let image = RgbImage::new(20, 20);
        let mask = RgbImage::new(20, 20);
        let annotations = vec![
            InstanceAnnotation {
                instance_id: 1,
                category_id: 0,
                parent_id: 2,
                bbox: [10.0, 10.0, 1e12, 5.0],
                ..Default::default()
            },
            InstanceAnnotation {
                instance_id: 2,
                category_id: 3,
                bbox: [-4.0, 2.0, 8.0, 4.0],
                ..Default::default()
            },
        ];

        let out = render_comparison(&image, &mask, EncodingVersion::V1, &annotations).unwrap();
        // Top edge of the huge box runs to the right border.
        assert_eq!(*out.get_pixel(19, 10), STORED_BBOX);
        // Visible part of the box starting left of the image.
        assert_eq!(*out.get_pixel(0, 2), STORED_BBOX);
        assert_eq!(*out.get_pixel(3, 3), STORED_BBOX);
        // Its left side is off-canvas, not drawn on column 0.
        assert_eq!(*out.get_pixel(0, 3), Rgb([0, 0, 0]));
        // The pair line is clipped to the canvas.
        assert_eq!(*out.get_pixel(10, 4), PAIR_LINE);
    }

    #[test]
    fn test_clip_segment() {
        let (start, end) = clip_segment((-10.0, 5.0), (5e11, 5.0), 20, 20).unwrap();
        assert!(start.0.abs() < 1e-3 && start.1 == 5.0);
        assert!((end.0 - 19.0).abs() < 1e-3 && end.1 == 5.0);

        let (start, end) = clip_segment((2.0, 2.0), (8.0, 8.0), 20, 20).unwrap();
        assert_eq!((start, end), ((2.0, 2.0), (8.0, 8.0)));

        assert!(clip_segment((-5.0, -5.0), (-1.0, 30.0), 20, 20).is_none());
        assert!(clip_segment((0.0, 0.0), (f64::INFINITY, 0.0), 20, 20).is_none());
    }
}
