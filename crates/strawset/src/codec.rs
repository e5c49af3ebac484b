// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Instance color codec.
//!
//! Every non-background pixel of a mask image encodes an [`ObjectKey`]: the
//! blue channel selects the category and one of the red/green channels holds
//! the 1-based instance id. Pure black is reserved for background.
//!
//! Two dataset releases disagree on how the id channels are populated, so the
//! layout is always named explicitly through [`EncodingVersion`]:
//!
//! | Version | Strawberry pixel        | Peduncle pixel          |
//! |---------|-------------------------|-------------------------|
//! | `v1`    | `R = id, G = 0, B = cat` | `R = 0, G = id, B = 3`  |
//! | `v2`    | `R = id, G = peduncle, B = cat` | `R = strawberry, G = id, B = 3` |
//!
//! Both versions select the id channel by testing `B == 3`, so decoding is
//! shared. They differ in which channel combinations are legal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One mask pixel in RGB channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Color {
    /// Primary (strawberry) id channel.
    pub r: u8,
    /// Secondary (peduncle) id channel.
    pub g: u8,
    /// Category channel.
    pub b: u8,
}

impl Color {
    /// Reserved background color.
    pub const BACKGROUND: Color = Color::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn is_background(&self) -> bool {
        *self == Self::BACKGROUND
    }
}

impl From<[u8; 3]> for Color {
    fn from(rgb: [u8; 3]) -> Self {
        Color::new(rgb[0], rgb[1], rgb[2])
    }
}

impl From<Color> for [u8; 3] {
    fn from(color: Color) -> Self {
        [color.r, color.g, color.b]
    }
}

impl From<image::Rgb<u8>> for Color {
    fn from(pixel: image::Rgb<u8>) -> Self {
        Color::from(pixel.0)
    }
}

impl From<Color> for image::Rgb<u8> {
    fn from(color: Color) -> Self {
        image::Rgb([color.r, color.g, color.b])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RGB=({:3}, {:3}, {:3})", self.r, self.g, self.b)
    }
}

/// Object category as stored in `category_id` and the mask's blue channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    Ripe,
    Unripe,
    HalfRipe,
    Peduncle,
}

impl ObjectType {
    /// All categories in `category_id` order.
    pub const ALL: [ObjectType; 4] = [
        ObjectType::Ripe,
        ObjectType::Unripe,
        ObjectType::HalfRipe,
        ObjectType::Peduncle,
    ];

    /// Map a `category_id` (0 = ripe, 1 = unripe, 2 = half ripe,
    /// 3 = peduncle) to its category.
    pub fn from_category_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(ObjectType::Ripe),
            1 => Some(ObjectType::Unripe),
            2 => Some(ObjectType::HalfRipe),
            3 => Some(ObjectType::Peduncle),
            _ => None,
        }
    }

    pub fn category_id(self) -> u32 {
        match self {
            ObjectType::Ripe => 0,
            ObjectType::Unripe => 1,
            ObjectType::HalfRipe => 2,
            ObjectType::Peduncle => 3,
        }
    }

    /// Strawberries are primary objects, peduncles are secondary.
    pub fn is_primary(self) -> bool {
        !matches!(self, ObjectType::Peduncle)
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectType::Ripe => "ripe",
            ObjectType::Unripe => "unripe",
            ObjectType::HalfRipe => "half_ripe",
            ObjectType::Peduncle => "peduncle",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of one object instance within one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub object_type: ObjectType,
    pub instance_id: u32,
}

impl ObjectKey {
    pub fn new(object_type: ObjectType, instance_id: u32) -> Self {
        Self {
            object_type,
            instance_id,
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<9} ID={:3}", self.object_type.name(), self.instance_id)
    }
}

/// A pixel whose category channel is outside `0..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DecodeFault {
    pub y: u32,
    pub x: u32,
    pub color: Color,
}

impl fmt::Display for DecodeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid category B={} at ({}, {}) {}",
            self.color.b, self.x, self.y, self.color
        )
    }
}

/// Mask color layout of a dataset release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingVersion {
    /// Category in blue, the id in red (strawberry) or green (peduncle),
    /// the unused id channel always zero.
    #[default]
    V1,
    /// Red always carries the strawberry id and green the peduncle id; blue
    /// selects which one identifies the pixel.
    V2,
}

impl TryFrom<&str> for EncodingVersion {
    type Error = crate::Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_lowercase().as_str() {
            "v1" | "1" | "category-in-blue" => Ok(EncodingVersion::V1),
            "v2" | "2" | "id-in-red-green" => Ok(EncodingVersion::V2),
            _ => Err(crate::Error::InvalidParameters(format!(
                "unknown encoding version '{}', expected v1 or v2",
                s
            ))),
        }
    }
}

impl std::str::FromStr for EncodingVersion {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.try_into()
    }
}

impl fmt::Display for EncodingVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingVersion::V1 => f.write_str("v1"),
            EncodingVersion::V2 => f.write_str("v2"),
        }
    }
}

impl EncodingVersion {
    /// Decode one pixel.
    ///
    /// Returns `Ok(None)` for background. The returned fault carries the
    /// color only; the scanner fills in the coordinates.
    pub fn decode(self, color: Color) -> Result<Option<ObjectKey>, DecodeFault> {
        if color.is_background() {
            return Ok(None);
        }

        let key = match color.b {
            0..=2 => ObjectKey::new(
                ObjectType::ALL[color.b as usize],
                u32::from(color.r),
            ),
            3 => ObjectKey::new(ObjectType::Peduncle, u32::from(color.g)),
            _ => return Err(DecodeFault { x: 0, y: 0, color }),
        };
        Ok(Some(key))
    }

    /// Encode a key as the color this version writes for it.
    ///
    /// `linked_id` is the id of the paired object stored in the other id
    /// channel under `v2`; `v1` ignores it.
    pub fn encode(self, key: ObjectKey, linked_id: u8) -> Result<Color, crate::Error> {
        let id = u8::try_from(key.instance_id).map_err(|_| {
            crate::Error::InvalidParameters(format!(
                "instance id {} does not fit in a mask channel",
                key.instance_id
            ))
        })?;
        if id == 0 {
            return Err(crate::Error::InvalidParameters(
                "instance id 0 collides with background".to_owned(),
            ));
        }

        let category = key.object_type.category_id() as u8;
        let color = match (self, key.object_type.is_primary()) {
            (EncodingVersion::V1, true) => Color::new(id, 0, category),
            (EncodingVersion::V1, false) => Color::new(0, id, category),
            (EncodingVersion::V2, true) => Color::new(id, linked_id, category),
            (EncodingVersion::V2, false) => Color::new(linked_id, id, category),
        };
        Ok(color)
    }

    /// Whether the unused id channel must be zero.
    pub fn requires_channel_separation(self) -> bool {
        matches!(self, EncodingVersion::V1)
    }

    /// Whether `color` stores a value in the id channel `key` does not own.
    ///
    /// Always false for versions without channel separation.
    pub fn violates_channel_separation(self, color: Color, key: ObjectKey) -> bool {
        if !self.requires_channel_separation() {
            return false;
        }
        if key.object_type.is_primary() {
            color.g != 0
        } else {
            color.r != 0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_never_an_object() {
        for encoding in [EncodingVersion::V1, EncodingVersion::V2] {
            assert_eq!(encoding.decode(Color::BACKGROUND), Ok(None));
        }
    }

    #[test]
    fn test_decode_strawberry_categories() {
        let enc = EncodingVersion::V1;
        assert_eq!(
            enc.decode(Color::new(5, 0, 0)).unwrap(),
            Some(ObjectKey::new(ObjectType::Ripe, 5))
        );
        assert_eq!(
            enc.decode(Color::new(7, 0, 1)).unwrap(),
            Some(ObjectKey::new(ObjectType::Unripe, 7))
        );
        assert_eq!(
            enc.decode(Color::new(9, 0, 2)).unwrap(),
            Some(ObjectKey::new(ObjectType::HalfRipe, 9))
        );
    }

    #[test]
    fn test_decode_peduncle_uses_green() {
        let key = EncodingVersion::V2.decode(Color::new(4, 12, 3)).unwrap();
        assert_eq!(key, Some(ObjectKey::new(ObjectType::Peduncle, 12)));
    }

    #[test]
    fn test_decode_zero_id_is_not_background() {
        // Category 1 with an empty id channel is an object with id 0.
        let key = EncodingVersion::V1.decode(Color::new(0, 0, 1)).unwrap();
        assert_eq!(key, Some(ObjectKey::new(ObjectType::Unripe, 0)));
    }

    #[test]
    fn test_decode_invalid_category() {
        let fault = EncodingVersion::V1.decode(Color::new(3, 0, 4)).unwrap_err();
        assert_eq!(fault.color.b, 4);
    }

    #[test]
    fn test_encode_v1() {
        let enc = EncodingVersion::V1;
        let straw = ObjectKey::new(ObjectType::HalfRipe, 8);
        let ped = ObjectKey::new(ObjectType::Peduncle, 8);
        assert_eq!(enc.encode(straw, 3).unwrap(), Color::new(8, 0, 2));
        assert_eq!(enc.encode(ped, 3).unwrap(), Color::new(0, 8, 3));
        assert_eq!(enc.decode(enc.encode(ped, 0).unwrap()).unwrap(), Some(ped));
    }

    #[test]
    fn test_encode_v2_keeps_linked_id() {
        let enc = EncodingVersion::V2;
        let straw = ObjectKey::new(ObjectType::Ripe, 2);
        assert_eq!(enc.encode(straw, 6).unwrap(), Color::new(2, 6, 0));
        assert_eq!(enc.decode(Color::new(2, 6, 0)).unwrap(), Some(straw));
    }

    #[test]
    fn test_encode_rejects_unrepresentable_ids() {
        let enc = EncodingVersion::V1;
        assert!(enc.encode(ObjectKey::new(ObjectType::Ripe, 0), 0).is_err());
        assert!(enc.encode(ObjectKey::new(ObjectType::Ripe, 256), 0).is_err());
    }

    #[test]
    fn test_channel_separation() {
        let straw = ObjectKey::new(ObjectType::Ripe, 2);
        let ped = ObjectKey::new(ObjectType::Peduncle, 6);
        let v1 = EncodingVersion::V1;
        assert!(v1.violates_channel_separation(Color::new(2, 6, 0), straw));
        assert!(!v1.violates_channel_separation(Color::new(2, 0, 0), straw));
        assert!(v1.violates_channel_separation(Color::new(2, 6, 3), ped));
        assert!(!EncodingVersion::V2.violates_channel_separation(Color::new(2, 6, 0), straw));
    }

    #[test]
    fn test_encoding_version_parse() {
        assert_eq!("v1".parse::<EncodingVersion>().unwrap(), EncodingVersion::V1);
        assert_eq!("V2".parse::<EncodingVersion>().unwrap(), EncodingVersion::V2);
        assert!("v3".parse::<EncodingVersion>().is_err());
    }

    #[test]
    fn test_category_ids() {
        for object_type in ObjectType::ALL {
            assert_eq!(
                ObjectType::from_category_id(object_type.category_id()),
                Some(object_type)
            );
        }
        assert_eq!(ObjectType::from_category_id(4), None);
    }
}
