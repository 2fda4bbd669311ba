/// CommandList trait - for recording acceleration structure commands

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{AccelerationStructure, Buffer, PrimitiveAccelerationStructureDesc};

/// Command list for recording GPU commands (the frame's encoder)
///
/// Commands are recorded and later submitted via `GraphicsDevice::submit()`.
/// Recording never submits.
pub trait CommandList: Send + Sync {
    /// Begin recording commands
    ///
    /// Backends wait for the previous submission of this list before
    /// resetting it, so resources it referenced may be reused afterwards.
    fn begin(&mut self) -> Result<()>;

    /// End recording commands
    fn end(&mut self) -> Result<()>;

    /// Record a full build of `structure` from `desc`
    ///
    /// # Arguments
    ///
    /// * `structure` - Destination, created with a size from `acceleration_structure_sizes`
    /// * `desc` - Geometry to build from
    /// * `scratch` - Scratch buffer of at least `build_scratch_size` bytes
    fn build_acceleration_structure(
        &mut self,
        structure: &Arc<dyn AccelerationStructure>,
        desc: &PrimitiveAccelerationStructureDesc,
        scratch: &Arc<dyn Buffer>,
    ) -> Result<()>;

    /// Record a refit of `source` against updated geometry
    ///
    /// `source` must have been built with `AccelerationStructureUsage::REFIT`
    /// and the same geometry layout. Returns the handle holding the refitted
    /// structure, which may or may not be `source` itself.
    fn refit_acceleration_structure(
        &mut self,
        source: &Arc<dyn AccelerationStructure>,
        desc: &PrimitiveAccelerationStructureDesc,
        scratch: &Arc<dyn Buffer>,
    ) -> Result<Arc<dyn AccelerationStructure>>;
}
