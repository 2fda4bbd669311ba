/// AccelerationStructure - Vulkan implementation of the AccelerationStructure trait
///
/// Also holds the conversions from engine build descriptors to
/// VK_KHR_acceleration_structure structures.

use continuum_engine::continuum::{Error, Result};
use continuum_engine::continuum::render::{
    AccelerationStructure as RendererAccelerationStructure,
    AccelerationStructureSizes, AccelerationStructureUsage,
    Buffer as RendererBuffer, BufferUsage, PrimitiveAccelerationStructureDesc,
};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::VulkanContext;

/// Vulkan primitive (bottom-level) acceleration structure
///
/// Owns the structure handle and its backing buffer.
pub struct AccelerationStructure {
    ctx: Arc<VulkanContext>,
    pub(crate) handle: vk::AccelerationStructureKHR,
    pub(crate) buffer: vk::Buffer,
    pub(crate) allocation: Option<Allocation>,
    pub(crate) size: u64,
}

impl AccelerationStructure {
    pub fn new(
        ctx: Arc<VulkanContext>,
        handle: vk::AccelerationStructureKHR,
        buffer: vk::Buffer,
        allocation: Allocation,
        size: u64,
    ) -> Self {
        ctx.counters.acceleration_structures_created.fetch_add(1, Ordering::Relaxed);
        Self {
            ctx,
            handle,
            buffer,
            allocation: Some(allocation),
            size,
        }
    }

    /// Device address of the structure (for instance buffers)
    pub fn device_address(&self) -> vk::DeviceAddress {
        let info = vk::AccelerationStructureDeviceAddressInfoKHR::default()
            .acceleration_structure(self.handle);
        unsafe {
            self.ctx
                .acceleration_structure
                .get_acceleration_structure_device_address(&info)
        }
    }
}

impl RendererAccelerationStructure for AccelerationStructure {
    fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for AccelerationStructure {
    fn drop(&mut self) {
        unsafe {
            self.ctx
                .acceleration_structure
                .destroy_acceleration_structure(self.handle, None);

            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

// ============================================================================
// Build inputs
// ============================================================================

/// Vulkan geometry and range arrays for one primitive structure
pub(crate) struct GeometryInputs {
    pub geometries: Vec<vk::AccelerationStructureGeometryKHR<'static>>,
    pub ranges: Vec<vk::AccelerationStructureBuildRangeInfoKHR>,
    pub max_primitive_counts: Vec<u32>,
}

/// Translate `desc` into Vulkan AABB geometries
///
/// Every geometry buffer must be a Vulkan buffer of usage `BoundingBoxes`.
pub(crate) fn geometry_inputs(desc: &PrimitiveAccelerationStructureDesc) -> Result<GeometryInputs> {
    if desc.geometries.is_empty() {
        return Err(Error::InvalidResource(
            "Acceleration structure needs at least one geometry".to_string(),
        ));
    }

    let mut inputs = GeometryInputs {
        geometries: Vec::with_capacity(desc.geometries.len()),
        ranges: Vec::with_capacity(desc.geometries.len()),
        max_primitive_counts: Vec::with_capacity(desc.geometries.len()),
    };

    for geometry in &desc.geometries {
        if geometry.byte_len() > geometry.buffer.size() {
            return Err(Error::InvalidResource(format!(
                "Geometry spans {} bytes but its buffer holds {}",
                geometry.byte_len(),
                geometry.buffer.size()
            )));
        }

        let range_offset = primitive_offset(geometry.offset)?;

        // Downcast to the Vulkan buffer to read its device address
        let vk_buffer = unsafe {
            &*(geometry.buffer.as_ref() as *const dyn RendererBuffer as *const Buffer)
        };
        if vk_buffer.usage != BufferUsage::BoundingBoxes {
            return Err(Error::InvalidResource(format!(
                "Geometry buffer has usage {:?}, expected BoundingBoxes",
                vk_buffer.usage
            )));
        }

        let aabbs = vk::AccelerationStructureGeometryAabbsDataKHR::default()
            .data(vk::DeviceOrHostAddressConstKHR {
                device_address: vk_buffer.device_address,
            })
            .stride(geometry.stride);

        let flags = if geometry.opaque {
            vk::GeometryFlagsKHR::OPAQUE
        } else {
            vk::GeometryFlagsKHR::empty()
        };

        inputs.geometries.push(
            vk::AccelerationStructureGeometryKHR::default()
                .geometry_type(vk::GeometryTypeKHR::AABBS)
                .geometry(vk::AccelerationStructureGeometryDataKHR { aabbs })
                .flags(flags),
        );
        inputs.ranges.push(
            vk::AccelerationStructureBuildRangeInfoKHR::default()
                .primitive_count(geometry.count)
                .primitive_offset(range_offset),
        );
        inputs.max_primitive_counts.push(geometry.count);
    }

    Ok(inputs)
}

/// Byte offset of the first box, as Vulkan's 32-bit primitive offset
pub(crate) fn primitive_offset(offset: u64) -> Result<u32> {
    u32::try_from(offset).map_err(|_| {
        Error::InvalidResource(format!(
            "Geometry offset {} exceeds the 32-bit primitive offset range",
            offset
        ))
    })
}

/// Worst-case sizes reported by the driver for `inputs`
pub(crate) fn query_build_sizes(
    ctx: &VulkanContext,
    usage: AccelerationStructureUsage,
    inputs: &GeometryInputs,
) -> AccelerationStructureSizes {
    let info = vk::AccelerationStructureBuildGeometryInfoKHR::default()
        .ty(vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL)
        .flags(build_flags_to_vk(usage))
        .mode(vk::BuildAccelerationStructureModeKHR::BUILD)
        .geometries(&inputs.geometries);

    let mut sizes = vk::AccelerationStructureBuildSizesInfoKHR::default();
    unsafe {
        ctx.acceleration_structure.get_acceleration_structure_build_sizes(
            vk::AccelerationStructureBuildTypeKHR::DEVICE,
            &info,
            &inputs.max_primitive_counts,
            &mut sizes,
        );
    }

    AccelerationStructureSizes {
        structure_size: sizes.acceleration_structure_size,
        build_scratch_size: sizes.build_scratch_size,
        refit_scratch_size: sizes.update_scratch_size,
    }
}

// ============================================================================
// Conversions
// ============================================================================

/// Build flags for a structure created with `usage`
pub(crate) fn build_flags_to_vk(
    usage: AccelerationStructureUsage,
) -> vk::BuildAccelerationStructureFlagsKHR {
    let mut flags = if usage.contains(AccelerationStructureUsage::PREFER_FAST_BUILD) {
        vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_BUILD
    } else {
        vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE
    };
    if usage.contains(AccelerationStructureUsage::REFIT) {
        flags |= vk::BuildAccelerationStructureFlagsKHR::ALLOW_UPDATE;
    }
    flags
}

/// Vulkan usage flags for an engine buffer usage
pub(crate) fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let base = vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
    match usage {
        BufferUsage::BoundingBoxes => {
            base | vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR
        }
        BufferUsage::Scratch => base | vk::BufferUsageFlags::STORAGE_BUFFER,
    }
}

/// Memory location for an engine buffer usage
pub(crate) fn buffer_location(usage: BufferUsage) -> gpu_allocator::MemoryLocation {
    if usage.is_host_visible() {
        gpu_allocator::MemoryLocation::CpuToGpu
    } else {
        gpu_allocator::MemoryLocation::GpuOnly
    }
}

/// Round `value` up to a multiple of `alignment` (a power of two)
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
#[path = "vulkan_conversion_tests.rs"]
mod tests;
