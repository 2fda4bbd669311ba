/// Render packets - per-entity GPU artifacts kept in sync with a bounding volume
///
/// A packet owns its GPU objects exclusively. It records commands into the
/// encoder of the `GpuContext` it is handed and never submits.

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    AccelerationStructure, AccelerationStructureUsage, BoundingBoxGeometryDesc, Buffer,
    BufferDesc, BufferUsage, GpuContext, PrimitiveAccelerationStructureDesc,
};
use crate::staging::{to_canonical_bounds, Aabb, BoundingVolume, BoundingVolumeStyle, AABB_STRIDE};

/// Absolute per-scalar tolerance under which a bounds change is ignored
pub const DEFAULT_REFIT_TOLERANCE: f32 = 1e-4;

/// Polymorphic per-entity GPU artifact
pub trait RenderPacket: Send + Sync {
    /// Whether `volume` differs from the last built bounds beyond tolerance
    ///
    /// # Errors
    ///
    /// `InvalidShape` if the volume's style is unknown
    fn needs_refit(&self, volume: &BoundingVolume) -> Result<bool>;

    /// Record an unconditional refit against `volume`
    fn refit(&mut self, context: &mut GpuContext, volume: &BoundingVolume) -> Result<()>;

    /// Refit only when `needs_refit`. Returns true if a refit was recorded.
    fn smart_refit(&mut self, context: &mut GpuContext, volume: &BoundingVolume) -> Result<bool> {
        if self.needs_refit(volume)? {
            self.refit(context, volume)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Bounds of the last build or refit
    fn bounds(&self) -> Aabb;

    /// Current acceleration structure
    fn handle(&self) -> &Arc<dyn AccelerationStructure>;

    /// Number of refits recorded since construction
    fn refit_count(&self) -> u64;
}

/// Build the packet matching the volume's style
///
/// # Errors
///
/// `InvalidShape` for unknown styles, or any GPU allocation error
pub fn create_render_packet(
    context: &mut GpuContext,
    volume: &BoundingVolume,
    tolerance: f32,
) -> Result<Box<dyn RenderPacket>> {
    match volume.style()? {
        BoundingVolumeStyle::Sphere => {
            Ok(Box::new(AabbPacket::with_tolerance(context, volume, tolerance)?))
        }
    }
}

// ============================================================================
// AabbPacket
// ============================================================================

/// One AABB primitive in its own primitive acceleration structure
pub struct AabbPacket {
    aabb: Aabb,
    bounds_buffer: Arc<dyn Buffer>,
    scratch_buffer: Arc<dyn Buffer>,
    structure: Arc<dyn AccelerationStructure>,
    tolerance: f32,
    refit_count: u64,
}

impl AabbPacket {
    /// Allocate GPU objects for `volume` and record the initial build
    pub fn new(context: &mut GpuContext, volume: &BoundingVolume) -> Result<Self> {
        Self::with_tolerance(context, volume, DEFAULT_REFIT_TOLERANCE)
    }

    /// Same as `new` with a custom refit tolerance
    pub fn with_tolerance(
        context: &mut GpuContext,
        volume: &BoundingVolume,
        tolerance: f32,
    ) -> Result<Self> {
        let aabb = to_canonical_bounds(volume)?;

        let bounds_buffer = context.device.create_buffer(BufferDesc {
            size: AABB_STRIDE,
            usage: BufferUsage::BoundingBoxes,
        })?;
        bounds_buffer.update(0, aabb.as_bytes())?;

        let desc = Self::describe(&bounds_buffer);
        let sizes = context.device.acceleration_structure_sizes(&desc)?;

        // Sized for refits as well: refits reuse this buffer
        let scratch_buffer = context.device.create_buffer(BufferDesc {
            size: sizes.scratch_size(),
            usage: BufferUsage::Scratch,
        })?;

        let structure = context.device.create_acceleration_structure(sizes.structure_size)?;
        context
            .encoder
            .build_acceleration_structure(&structure, &desc, &scratch_buffer)?;

        crate::engine_trace!(
            "continuum::RenderPacket",
            "Built AABB structure ({} bytes, scratch {} bytes) for {:?}",
            sizes.structure_size,
            sizes.scratch_size(),
            aabb
        );

        Ok(Self {
            aabb,
            bounds_buffer,
            scratch_buffer,
            structure,
            tolerance,
            refit_count: 0,
        })
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn bounds_buffer(&self) -> &Arc<dyn Buffer> {
        &self.bounds_buffer
    }

    pub fn scratch_buffer(&self) -> &Arc<dyn Buffer> {
        &self.scratch_buffer
    }

    /// One opaque box read from the start of `buffer`
    fn describe(buffer: &Arc<dyn Buffer>) -> PrimitiveAccelerationStructureDesc {
        PrimitiveAccelerationStructureDesc {
            geometries: vec![BoundingBoxGeometryDesc {
                buffer: Arc::clone(buffer),
                count: 1,
                stride: AABB_STRIDE,
                offset: 0,
                opaque: true,
            }],
            usage: AccelerationStructureUsage::REFIT,
        }
    }
}

impl RenderPacket for AabbPacket {
    fn needs_refit(&self, volume: &BoundingVolume) -> Result<bool> {
        let aabb = to_canonical_bounds(volume)?;
        Ok(!self.aabb.approx_eq(&aabb, self.tolerance))
    }

    fn refit(&mut self, context: &mut GpuContext, volume: &BoundingVolume) -> Result<()> {
        let aabb = to_canonical_bounds(volume)?;
        self.bounds_buffer.update(0, aabb.as_bytes())?;

        let desc = Self::describe(&self.bounds_buffer);
        let refitted = context.encoder.refit_acceleration_structure(
            &self.structure,
            &desc,
            &self.scratch_buffer,
        )?;

        // The previous handle is released here unless the backend returned it
        self.structure = refitted;
        self.aabb = aabb;
        self.refit_count += 1;

        crate::engine_trace!(
            "continuum::RenderPacket",
            "Refitted AABB structure to {:?}",
            aabb
        );
        Ok(())
    }

    fn bounds(&self) -> Aabb {
        self.aabb
    }

    fn handle(&self) -> &Arc<dyn AccelerationStructure> {
        &self.structure
    }

    fn refit_count(&self) -> u64 {
        self.refit_count
    }
}

#[cfg(test)]
#[path = "render_packet_tests.rs"]
mod tests;
