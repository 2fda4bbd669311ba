/// Buffer - Vulkan implementation of the Buffer trait

use continuum_engine::continuum::{
    Result,
    Error,
    render::{Buffer as RendererBuffer, BufferUsage},
};
use continuum_engine::engine_error;
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::vulkan_context::VulkanContext;

/// Vulkan buffer implementation
pub struct Buffer {
    /// Shared GPU context (device, allocator, queue)
    ctx: Arc<VulkanContext>,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation
    pub(crate) allocation: Option<Allocation>,
    /// Size requested at creation (the Vulkan buffer may be larger)
    pub(crate) size: u64,
    pub(crate) usage: BufferUsage,
    /// Address of the first byte, for acceleration structure builds
    pub(crate) device_address: vk::DeviceAddress,
}

impl Buffer {
    /// Wrap an allocated, bound buffer
    pub fn new(
        ctx: Arc<VulkanContext>,
        buffer: vk::Buffer,
        allocation: Allocation,
        size: u64,
        usage: BufferUsage,
    ) -> Self {
        let device_address = ctx.buffer_address(buffer);
        ctx.counters.buffers_created.fetch_add(1, Ordering::Relaxed);
        Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
            device_address,
        }
    }
}

impl RendererBuffer for Buffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if !self.usage.is_host_visible() {
            return Err(Error::InvalidResource(format!(
                "Buffer with usage {:?} is not host-visible",
                self.usage
            )));
        }
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            return Err(Error::InvalidResource(format!(
                "Buffer update out of bounds: {} bytes at offset {} (size {})",
                data.len(),
                offset,
                self.size
            )));
        }

        unsafe {
            if let Some(allocation) = &self.allocation {
                // Map memory and copy data
                let mapped_ptr = allocation
                    .mapped_ptr()
                    .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
                    .as_ptr() as *mut u8;

                std::ptr::copy_nonoverlapping(
                    data.as_ptr(),
                    mapped_ptr.add(offset as usize),
                    data.len(),
                );

                Ok(())
            } else {
                engine_error!("continuum::vulkan", "Buffer update failed: no GPU allocation");
                Err(Error::BackendError("Buffer has no allocation".to_string()))
            }
        }
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            // Free GPU memory
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
