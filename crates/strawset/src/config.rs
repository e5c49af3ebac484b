// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Check configuration.
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults,
//! 2. `strawset.toml` in the dataset root (optional),
//! 3. `STRAWSET_*` environment variables, nested keys separated by `__`
//!    (for example `STRAWSET_GEOMETRY__MIN_RATIO=0.25`).

use crate::{Error, codec::EncodingVersion};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the optional per-dataset configuration file.
pub const CONFIG_FILE_NAME: &str = "strawset.toml";

/// Objects below this many pixels are dropped from the annotation file.
pub const DEFAULT_MIN_AREA: u32 = 15;

/// Allowed absolute difference between shard and master depth values.
pub const DEFAULT_DEPTH_TOLERANCE: f64 = 1e-4;

/// Bounds on the mask-to-annotation bbox ratio outside which an instance is
/// flagged. No bound is authoritative; callers tune these per dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryTolerance {
    pub min_ratio: f64,
    pub max_ratio: f64,
}

impl Default for GeometryTolerance {
    fn default() -> Self {
        Self {
            min_ratio: 0.5,
            max_ratio: 2.0,
        }
    }
}

impl GeometryTolerance {
    pub fn accepts(&self, ratio: f64) -> bool {
        ratio >= self.min_ratio && ratio <= self.max_ratio
    }
}

/// Settings shared by every check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Mask color layout of the dataset release.
    pub encoding: EncodingVersion,
    /// Minimum pixel area for an instance to be annotated.
    pub min_area: u32,
    /// Tolerance for depth range comparisons in metres.
    pub depth_tolerance: f64,
    pub geometry: GeometryTolerance,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            encoding: EncodingVersion::default(),
            min_area: DEFAULT_MIN_AREA,
            depth_tolerance: DEFAULT_DEPTH_TOLERANCE,
            geometry: GeometryTolerance::default(),
        }
    }
}

impl CheckConfig {
    /// Load configuration for the dataset at `dataset_root`.
    ///
    /// A missing `strawset.toml` is not an error; a malformed one is.
    pub fn load<P: AsRef<Path>>(dataset_root: P) -> Result<Self, Error> {
        let path = dataset_root.as_ref().join(CONFIG_FILE_NAME);
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_path()).required(false))
            .add_source(
                config::Environment::with_prefix("STRAWSET")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: CheckConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no check can run with. Call again after overriding
    /// fields of a loaded configuration.
    pub fn validate(&self) -> Result<(), Error> {
        if self.min_area == 0 {
            return Err(Error::InvalidParameters(
                "min_area must be at least 1".to_owned(),
            ));
        }
        if self.geometry.min_ratio > self.geometry.max_ratio {
            return Err(Error::InvalidParameters(format!(
                "geometry.min_ratio {} exceeds geometry.max_ratio {}",
                self.geometry.min_ratio, self.geometry.max_ratio
            )));
        }
        if self.depth_tolerance.is_nan() || self.depth_tolerance < 0.0 {
            return Err(Error::InvalidParameters(format!(
                "depth_tolerance {} must be non-negative",
                self.depth_tolerance
            )));
        }
        Ok(())
    }
}
