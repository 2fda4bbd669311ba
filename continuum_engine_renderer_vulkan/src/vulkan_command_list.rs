/// CommandList - Vulkan implementation of the CommandList trait

use continuum_engine::continuum::{Result, Error};
use continuum_engine::continuum::render::{
    CommandList as RendererCommandList,
    AccelerationStructure as RendererAccelerationStructure,
    AccelerationStructureUsage,
    Buffer as RendererBuffer,
    BufferUsage,
    PrimitiveAccelerationStructureDesc,
};
use continuum_engine::{engine_err, engine_error};
use ash::vk;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::vulkan_acceleration_structure::{
    align_up, build_flags_to_vk, geometry_inputs, query_build_sizes, AccelerationStructure,
};
use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::VulkanContext;

/// Vulkan command list implementation
///
/// Records acceleration structure builds for later submission. Each list owns
/// its pool, command buffer and fence; `begin()` waits for the list's previous
/// submission before reusing it.
pub struct CommandList {
    ctx: Arc<VulkanContext>,
    /// Command pool for allocating command buffers
    command_pool: vk::CommandPool,
    /// Command buffer for recording
    command_buffer: vk::CommandBuffer,
    /// Signaled when the last submission of this list completes
    fence: vk::Fence,
    /// Whether the command list is currently recording
    is_recording: bool,
    /// Submitted and not yet waited for
    submitted: AtomicBool,
    /// Objects referenced by recorded commands, released once the GPU is done
    retained_structures: Vec<Arc<dyn RendererAccelerationStructure>>,
    retained_buffers: Vec<Arc<dyn RendererBuffer>>,
}

impl CommandList {
    /// Create a new command list on the context's queue family
    pub fn new(ctx: Arc<VulkanContext>) -> Result<Self> {
        unsafe {
            let command_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = ctx.device.create_command_pool(&command_pool_create_info, None)
                .map_err(|e| engine_err!("continuum::vulkan", "Failed to create command pool: {:?}", e))?;

            let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffers = match ctx.device.allocate_command_buffers(&command_buffer_allocate_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(engine_err!("continuum::vulkan", "Failed to allocate command buffer: {:?}", e));
                }
            };

            let fence = match ctx.device.create_fence(&vk::FenceCreateInfo::default(), None) {
                Ok(fence) => fence,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(engine_err!("continuum::vulkan", "Failed to create command list fence: {:?}", e));
                }
            };

            Ok(Self {
                ctx,
                command_pool,
                command_buffer: command_buffers[0],
                fence,
                is_recording: false,
                submitted: AtomicBool::new(false),
                retained_structures: Vec::new(),
                retained_buffers: Vec::new(),
            })
        }
    }

    /// Get the underlying Vulkan command buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    pub(crate) fn fence(&self) -> vk::Fence {
        self.fence
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Called by the device once the list is queued with `fence()`
    pub(crate) fn mark_submitted(&self) {
        self.submitted.store(true, Ordering::Release);
    }

    /// Wait for the previous submission, if any, and reset the fence
    ///
    /// A list that was ended without being submitted (aborted frame) has
    /// nothing to wait for.
    fn wait_for_previous_submit(&self) -> Result<()> {
        if !self.submitted.load(Ordering::Acquire) {
            return Ok(());
        }
        unsafe {
            self.ctx.device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(|e| engine_err!("continuum::vulkan", "Failed to wait for command list fence: {:?}", e))?;
            self.ctx.device
                .reset_fences(&[self.fence])
                .map_err(|e| engine_err!("continuum::vulkan", "Failed to reset command list fence: {:?}", e))?;
        }
        self.submitted.store(false, Ordering::Release);
        Ok(())
    }

    fn record_build(
        &mut self,
        mode: vk::BuildAccelerationStructureModeKHR,
        structure: &Arc<dyn RendererAccelerationStructure>,
        desc: &PrimitiveAccelerationStructureDesc,
        scratch: &Arc<dyn RendererBuffer>,
    ) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError("Command list not recording".to_string()));
        }

        let inputs = geometry_inputs(desc)?;

        // Downcast to Vulkan types
        let vk_structure = unsafe {
            &*(structure.as_ref() as *const dyn RendererAccelerationStructure as *const AccelerationStructure)
        };
        let vk_scratch = unsafe {
            &*(scratch.as_ref() as *const dyn RendererBuffer as *const Buffer)
        };

        if vk_scratch.usage != BufferUsage::Scratch {
            return Err(Error::InvalidResource(format!(
                "Scratch buffer has usage {:?}",
                vk_scratch.usage
            )));
        }
        let sizes = query_build_sizes(&self.ctx, desc.usage, &inputs);
        let required = if mode == vk::BuildAccelerationStructureModeKHR::UPDATE {
            sizes.refit_scratch_size
        } else {
            sizes.build_scratch_size
        };
        if vk_scratch.size < required {
            return Err(Error::InvalidResource(format!(
                "Scratch buffer too small: {} bytes, {} required",
                vk_scratch.size, required
            )));
        }
        if vk_structure.size < sizes.structure_size {
            return Err(Error::InvalidResource(format!(
                "Acceleration structure too small: {} bytes, {} required",
                vk_structure.size, sizes.structure_size
            )));
        }

        let scratch_address = align_up(vk_scratch.device_address, self.ctx.scratch_alignment);

        let mut build_info = vk::AccelerationStructureBuildGeometryInfoKHR::default()
            .ty(vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL)
            .flags(build_flags_to_vk(desc.usage))
            .mode(mode)
            .geometries(&inputs.geometries)
            .dst_acceleration_structure(vk_structure.handle)
            .scratch_data(vk::DeviceOrHostAddressKHR {
                device_address: scratch_address,
            });
        if mode == vk::BuildAccelerationStructureModeKHR::UPDATE {
            // Refit in place
            build_info = build_info.src_acceleration_structure(vk_structure.handle);
        }

        unsafe {
            self.ctx.acceleration_structure.cmd_build_acceleration_structures(
                self.command_buffer,
                &[build_info],
                &[inputs.ranges.as_slice()],
            );

            // Next build may reuse scratch or read this structure
            let barrier = vk::MemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::ACCELERATION_STRUCTURE_WRITE_KHR)
                .dst_access_mask(
                    vk::AccessFlags::ACCELERATION_STRUCTURE_READ_KHR
                        | vk::AccessFlags::ACCELERATION_STRUCTURE_WRITE_KHR,
                );
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::ACCELERATION_STRUCTURE_BUILD_KHR,
                vk::PipelineStageFlags::ACCELERATION_STRUCTURE_BUILD_KHR,
                vk::DependencyFlags::empty(),
                &[barrier],
                &[],
                &[],
            );
        }

        self.retained_structures.push(Arc::clone(structure));
        self.retained_buffers.push(Arc::clone(scratch));
        self.retained_buffers
            .extend(desc.geometries.iter().map(|g| Arc::clone(&g.buffer)));

        Ok(())
    }
}

impl RendererCommandList for CommandList {
    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            return Err(Error::BackendError("Command list already recording".to_string()));
        }

        self.wait_for_previous_submit()?;
        self.retained_structures.clear();
        self.retained_buffers.clear();

        unsafe {
            self.ctx.device
                .reset_command_buffer(
                    self.command_buffer,
                    vk::CommandBufferResetFlags::empty(),
                )
                .map_err(|e| Error::BackendError(format!("Failed to reset command buffer: {:?}", e)))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.ctx.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| Error::BackendError(format!("Failed to begin command buffer: {:?}", e)))?;
        }

        self.is_recording = true;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError("Command list not recording".to_string()));
        }

        unsafe {
            self.ctx.device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| Error::BackendError(format!("Failed to end command buffer: {:?}", e)))?;
        }

        self.is_recording = false;
        Ok(())
    }

    fn build_acceleration_structure(
        &mut self,
        structure: &Arc<dyn RendererAccelerationStructure>,
        desc: &PrimitiveAccelerationStructureDesc,
        scratch: &Arc<dyn RendererBuffer>,
    ) -> Result<()> {
        self.record_build(vk::BuildAccelerationStructureModeKHR::BUILD, structure, desc, scratch)?;
        self.ctx.counters.builds.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn refit_acceleration_structure(
        &mut self,
        source: &Arc<dyn RendererAccelerationStructure>,
        desc: &PrimitiveAccelerationStructureDesc,
        scratch: &Arc<dyn RendererBuffer>,
    ) -> Result<Arc<dyn RendererAccelerationStructure>> {
        if !desc.usage.contains(AccelerationStructureUsage::REFIT) {
            return Err(Error::InvalidResource(
                "Acceleration structure was not built with AccelerationStructureUsage::REFIT".to_string(),
            ));
        }
        self.record_build(vk::BuildAccelerationStructureModeKHR::UPDATE, source, desc, scratch)?;
        self.ctx.counters.refits.fetch_add(1, Ordering::Relaxed);

        // Updated in place: the handle is unchanged
        Ok(Arc::clone(source))
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        if let Err(e) = self.wait_for_previous_submit() {
            engine_error!("continuum::vulkan", "Dropping command list still in flight: {}", e);
            unsafe {
                self.ctx.device.device_wait_idle().ok();
            }
        }
        self.retained_structures.clear();
        self.retained_buffers.clear();

        unsafe {
            self.ctx.device.destroy_fence(self.fence, None);
            // Command buffer is freed with its pool
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
