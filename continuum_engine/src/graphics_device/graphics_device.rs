/// GraphicsDevice trait - GPU resource factory and submission interface

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    AccelerationStructure, AccelerationStructureSizes, Buffer, BufferDesc, CommandList,
    PrimitiveAccelerationStructureDesc,
};

// ============================================================================
// Configuration
// ============================================================================

/// Which validation messages are forwarded to the engine logger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Graphics device configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Validation message filter
    pub debug_severity: DebugSeverity,
    /// Count validation messages (see `ValidationStats`)
    pub enable_validation_stats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Continuum Application".to_string(),
            app_version: (1, 0, 0),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            enable_validation_stats: false,
        }
    }
}

/// Counters of validation messages received so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

/// Device statistics (cumulative since creation)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Buffers created
    pub buffers_created: u64,
    /// Acceleration structures created
    pub acceleration_structures_created: u64,
    /// Full builds recorded
    pub builds: u64,
    /// Refits recorded
    pub refits: u64,
}

// ============================================================================
// GraphicsDevice trait
// ============================================================================

/// Main graphics device trait
///
/// Central factory interface for the GPU objects used by render packets.
/// Implemented by backend-specific devices (e.g., the Vulkan device).
pub trait GraphicsDevice: Send + Sync {
    /// Create a buffer
    ///
    /// # Errors
    ///
    /// `ResourceAllocation` or `OutOfMemory` when the allocation fails
    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Query worst-case sizes for building `desc`
    fn acceleration_structure_sizes(
        &self,
        desc: &PrimitiveAccelerationStructureDesc,
    ) -> Result<AccelerationStructureSizes>;

    /// Create an (unbuilt) primitive acceleration structure of `size` bytes
    fn create_acceleration_structure(&self, size: u64) -> Result<Arc<dyn AccelerationStructure>>;

    /// Create a command list
    fn create_command_list(&self) -> Result<Box<dyn CommandList>>;

    /// Submit recorded command lists
    fn submit(&self, commands: &[&dyn CommandList]) -> Result<()>;

    /// Wait for all GPU operations to complete
    fn wait_idle(&self) -> Result<()>;

    /// Get device statistics
    fn stats(&self) -> DeviceStats;
}

// ============================================================================
// GpuContext
// ============================================================================

/// Device and active encoder, borrowed for the duration of one call
///
/// Owned by the frame driver; packets receive `&mut GpuContext` and cannot
/// keep it past the call.
pub struct GpuContext<'a> {
    pub device: &'a dyn GraphicsDevice,
    pub encoder: &'a mut dyn CommandList,
}

impl<'a> GpuContext<'a> {
    pub fn new(device: &'a dyn GraphicsDevice, encoder: &'a mut dyn CommandList) -> Self {
        Self { device, encoder }
    }
}
