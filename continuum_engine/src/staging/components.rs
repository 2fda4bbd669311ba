/// Scene components read by the stager

use glam::Vec3;
use crate::error::{Error, Result};

/// Entity position (no hierarchy)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vec3,
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position }
    }
}

/// Shape of a bounding volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BoundingVolumeStyle {
    /// `extent` is the radius
    Sphere = 0,
}

impl TryFrom<u8> for BoundingVolumeStyle {
    type Error = Error;

    fn try_from(style: u8) -> Result<Self> {
        match style {
            0 => Ok(BoundingVolumeStyle::Sphere),
            _ => Err(Error::InvalidShape { style }),
        }
    }
}

/// Bounding volume component, as authored
///
/// The style is kept as its raw tag so that data written by newer or
/// corrupt producers still reaches the staging code, which rejects it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingVolume {
    /// Shape-dependent size (radius for spheres)
    pub extent: f32,
    /// Raw `BoundingVolumeStyle` tag
    pub style: u8,
}

impl BoundingVolume {
    pub fn sphere(radius: f32) -> Self {
        Self {
            extent: radius,
            style: BoundingVolumeStyle::Sphere as u8,
        }
    }

    /// Decoded style
    ///
    /// # Errors
    ///
    /// `InvalidShape` if the tag is unknown
    pub fn style(&self) -> Result<BoundingVolumeStyle> {
        BoundingVolumeStyle::try_from(self.style)
    }
}
