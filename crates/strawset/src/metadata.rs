// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Depth metadata records and camera model.
//!
//! `depth_metadata.json` maps each image file name to the camera and depth
//! range used to render it. Fields this crate does not model are kept in
//! [`DepthMetadata::extra`] and written back unchanged.

use crate::Error;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

/// File name of the master metadata file in the dataset root.
pub const MASTER_METADATA_FILE: &str = "depth_metadata.json";

/// Pinhole intrinsics in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

/// Intrinsics of the 1024x1024 render camera at 60° horizontal FOV.
pub const DEFAULT_INTRINSICS: CameraIntrinsics = CameraIntrinsics {
    fx: 886.81,
    fy: 886.81,
    cx: 512.0,
    cy: 512.0,
};

impl Default for CameraIntrinsics {
    fn default() -> Self {
        DEFAULT_INTRINSICS
    }
}

impl CameraIntrinsics {
    /// Use the given intrinsics or fall back to [`DEFAULT_INTRINSICS`].
    pub fn resolve(intrinsics: Option<&CameraIntrinsics>) -> CameraIntrinsics {
        match intrinsics {
            Some(intrinsics) => *intrinsics,
            None => {
                debug!("No camera intrinsics available, using defaults");
                DEFAULT_INTRINSICS
            }
        }
    }

    /// 3x3 camera matrix `K`, row-major.
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.fx, 0.0, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }

    /// Back-project pixel `(u, v)` at `depth` metres into camera space.
    pub fn pixel_to_3d(&self, u: f64, v: f64, depth: f64) -> [f64; 3] {
        [
            (u - self.cx) * depth / self.fx,
            (v - self.cy) * depth / self.fy,
            depth,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraExtrinsics {
    #[serde(default)]
    pub position: [f64; 3],
    #[serde(default)]
    pub rotation: [f64; 3],
}

/// Valid depth span of one rendered image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthRange {
    pub min_meters: f64,
    pub max_meters: f64,
}

impl DepthRange {
    /// Whether both bounds agree with `other` within `tolerance`.
    pub fn matches(&self, other: &DepthRange, tolerance: f64) -> bool {
        (self.min_meters - other.min_meters).abs() <= tolerance
            && (self.max_meters - other.max_meters).abs() <= tolerance
    }
}

/// Metadata of one image, as stored in a shard or master entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_intrinsics: Option<CameraIntrinsics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_extrinsics: Option<CameraExtrinsics>,
    pub depth_range: DepthRange,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DepthMetadata {
    pub fn intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::resolve(self.camera_intrinsics.as_ref())
    }
}

/// Image file name → metadata, ordered by name.
pub type MasterMetadata = BTreeMap<String, DepthMetadata>;

/// Read a master metadata file, failing on absent or malformed input.
pub fn read_master<P: AsRef<Path>>(path: P) -> Result<MasterMetadata, Error> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::MissingInput(format!(
            "depth metadata not found: {}",
            path.display()
        )));
    }
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Read `depth_metadata.json` from a dataset root.
///
/// Returns an empty map when the file is absent or malformed so callers fall
/// back to [`DEFAULT_INTRINSICS`].
pub fn load_depth_metadata<P: AsRef<Path>>(dataset_root: P) -> MasterMetadata {
    let path = dataset_root.as_ref().join(MASTER_METADATA_FILE);
    match read_master(&path) {
        Ok(master) => {
            debug!("Loaded {} depth metadata entries", master.len());
            master
        }
        Err(err) => {
            warn!("Depth metadata unavailable ({}), using defaults", err);
            MasterMetadata::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_pixel_to_3d_principal_point() {
        let k = DEFAULT_INTRINSICS;
        assert_eq!(k.pixel_to_3d(512.0, 512.0, 2.0), [0.0, 0.0, 2.0]);

        let p = k.pixel_to_3d(512.0 + 886.81, 512.0, 1.0);
        assert!((p[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_matrix() {
        let k = CameraIntrinsics {
            fx: 100.0,
            fy: 200.0,
            cx: 10.0,
            cy: 20.0,
        };
        assert_eq!(
            k.matrix(),
            [[100.0, 0.0, 10.0], [0.0, 200.0, 20.0], [0.0, 0.0, 1.0]]
        );
    }

    #[test]
    fn test_resolve_fallback() {
        assert_eq!(CameraIntrinsics::resolve(None), DEFAULT_INTRINSICS);
        let k = CameraIntrinsics {
            fx: 1.0,
            ..DEFAULT_INTRINSICS
        };
        assert_eq!(CameraIntrinsics::resolve(Some(&k)).fx, 1.0);
    }

    #[test]
    fn test_extra_fields_round_trip() {
        let json = r#"{
            "camera_intrinsics": {"fx": 1.0, "fy": 2.0, "cx": 3.0, "cy": 4.0},
            "depth_range": {"min_meters": 0.25, "max_meters": 1.5},
            "render_seed": 42
        }"#;
        let meta: DepthMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.extra.get("render_seed"), Some(&serde_json::json!(42)));
        assert!(meta.camera_extrinsics.is_none());

        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["render_seed"], 42);
        assert_eq!(back["depth_range"]["max_meters"], 1.5);
    }

    #[test]
    fn test_depth_range_tolerance() {
        let a = DepthRange {
            min_meters: 0.3,
            max_meters: 1.2,
        };
        let b = DepthRange {
            min_meters: 0.30005,
            max_meters: 1.2,
        };
        assert!(a.matches(&b, 1e-4));
        assert!(!a.matches(&b, 1e-5));
    }

    #[test]
    fn test_load_depth_metadata_falls_back() {
        let dir = TempDir::new().unwrap();
        assert!(load_depth_metadata(dir.path()).is_empty());

        fs::write(dir.path().join(MASTER_METADATA_FILE), "{ not json").unwrap();
        assert!(load_depth_metadata(dir.path()).is_empty());

        fs::write(
            dir.path().join(MASTER_METADATA_FILE),
            r#"{"00000.png": {"depth_range": {"min_meters": 0.1, "max_meters": 0.9}}}"#,
        )
        .unwrap();
        let master = load_depth_metadata(dir.path());
        assert_eq!(master["00000.png"].intrinsics(), DEFAULT_INTRINSICS);
    }
}
