/// Canonical axis-aligned bounds and their comparison

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use crate::error::Result;
use crate::staging::{BoundingVolume, BoundingVolumeStyle};

/// Axis-Aligned Bounding Box in the entity's local space
///
/// Laid out as the GPU expects AABB geometry: six consecutive `f32`
/// (`min.xyz`, then `max.xyz`), 24 bytes, no padding.
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Aabb {
    /// Minimum corner (x, y, z)
    pub min: Vec3,
    /// Maximum corner (x, y, z)
    pub max: Vec3,
}

/// Byte size of one `Aabb` in a bounds buffer
pub const AABB_STRIDE: u64 = std::mem::size_of::<Aabb>() as u64;

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box centered on the origin with half-size `half_extent` on every axis
    pub fn cube(half_extent: f32) -> Self {
        Self {
            min: Vec3::splat(-half_extent),
            max: Vec3::splat(half_extent),
        }
    }

    /// True if every one of the six scalars differs by strictly less than `eps`
    pub fn approx_eq(&self, other: &Aabb, eps: f32) -> bool {
        approx_eq(self.min.x, other.min.x, eps)
            && approx_eq(self.max.x, other.max.x, eps)
            && approx_eq(self.min.y, other.min.y, eps)
            && approx_eq(self.max.y, other.max.y, eps)
            && approx_eq(self.min.z, other.min.z, eps)
            && approx_eq(self.max.z, other.max.z, eps)
    }

    /// Bytes as written into a bounds buffer
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// `|a - b| < eps`
#[inline]
pub fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() < eps
}

/// Local-space AABB enclosing a bounding volume
///
/// # Errors
///
/// `InvalidShape` if the volume's style tag is unknown
pub fn to_canonical_bounds(volume: &BoundingVolume) -> Result<Aabb> {
    match volume.style()? {
        BoundingVolumeStyle::Sphere => Ok(Aabb::cube(volume.extent)),
    }
}

#[cfg(test)]
#[path = "bounds_tests.rs"]
mod tests;
