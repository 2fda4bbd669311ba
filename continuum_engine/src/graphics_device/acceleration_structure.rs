/// Acceleration structure trait and build descriptors

use std::sync::Arc;
use bitflags::bitflags;
use crate::graphics_device::Buffer;

bitflags! {
    /// Build flags for a primitive (bottom-level) acceleration structure
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccelerationStructureUsage: u32 {
        /// The structure will be refitted in place after its first build
        const REFIT = 1 << 0;
        /// Favor build speed over trace speed
        const PREFER_FAST_BUILD = 1 << 1;
    }
}

/// Axis-aligned bounding-box geometry stored in a buffer
///
/// Each box is `stride` bytes, starting with six `f32`
/// (`min.x, min.y, min.z, max.x, max.y, max.z`).
#[derive(Clone)]
pub struct BoundingBoxGeometryDesc {
    /// Buffer holding the boxes (usage `BoundingBoxes`)
    pub buffer: Arc<dyn Buffer>,
    /// Number of boxes
    pub count: u32,
    /// Distance in bytes between two boxes
    pub stride: u64,
    /// Offset in bytes of the first box
    pub offset: u64,
    /// Skip any-hit invocation for this geometry
    pub opaque: bool,
}

impl BoundingBoxGeometryDesc {
    /// Bytes of `buffer` covered by this geometry
    pub fn byte_len(&self) -> u64 {
        self.offset + self.stride * self.count as u64
    }
}

/// Descriptor of a primitive acceleration structure
#[derive(Clone, Default)]
pub struct PrimitiveAccelerationStructureDesc {
    pub geometries: Vec<BoundingBoxGeometryDesc>,
    pub usage: AccelerationStructureUsage,
}

impl PrimitiveAccelerationStructureDesc {
    /// Total number of primitives across all geometries
    pub fn primitive_count(&self) -> u64 {
        self.geometries.iter().map(|g| g.count as u64).sum()
    }
}

/// Worst-case memory requirements for a primitive acceleration structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccelerationStructureSizes {
    /// Size of the structure itself
    pub structure_size: u64,
    /// Scratch needed by a full build
    pub build_scratch_size: u64,
    /// Scratch needed by a refit
    pub refit_scratch_size: u64,
}

impl AccelerationStructureSizes {
    /// Scratch size valid for both a build and a refit
    pub fn scratch_size(&self) -> u64 {
        self.build_scratch_size.max(self.refit_scratch_size)
    }
}

/// Acceleration structure resource trait
///
/// Handles are reference-counted; the GPU object is released when the last
/// `Arc` is dropped (command lists keep one until their submission is done).
pub trait AccelerationStructure: Send + Sync {
    /// Size in bytes of the backing storage
    fn size(&self) -> u64;
}
