/// VulkanContext - Shared GPU state for all Vulkan objects
///
/// Contains everything needed for GPU operations:
/// - Device and acceleration structure loader for Vulkan API calls
/// - Allocator for memory management
/// - Queue for command submission
/// - Counters behind `GraphicsDevice::stats()`

use ash::vk;
use continuum_engine::continuum::render::DeviceStats;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Cumulative device counters
#[derive(Default)]
pub(crate) struct DeviceCounters {
    pub buffers_created: AtomicU64,
    pub acceleration_structures_created: AtomicU64,
    pub builds: AtomicU64,
    pub refits: AtomicU64,
}

impl DeviceCounters {
    pub fn snapshot(&self) -> DeviceStats {
        DeviceStats {
            buffers_created: self.buffers_created.load(Ordering::Relaxed),
            acceleration_structures_created: self.acceleration_structures_created.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
            refits: self.refits.load(Ordering::Relaxed),
        }
    }
}

/// Shared GPU context for all Vulkan resources.
///
/// Shared (via `Arc`) by the device, command lists, buffers and acceleration
/// structures. The logical device and instance are destroyed when the last
/// owner goes away, so resources may outlive the `VulkanGraphicsDevice`.
pub struct VulkanContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// VK_KHR_acceleration_structure entry points
    pub acceleration_structure: ash::khr::acceleration_structure::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop to ensure it's dropped BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Compute-capable queue for acceleration structure builds
    pub queue: vk::Queue,

    /// Queue family index of `queue`
    pub queue_family: u32,

    /// minAccelerationStructureScratchOffsetAlignment
    pub scratch_alignment: u64,

    pub(crate) counters: DeviceCounters,

    /// Debug utils loader (for validation layers)
    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,

    /// Debug messenger handle
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,

    instance: ash::Instance,

    /// Keeps the Vulkan library loaded
    _entry: ash::Entry,
}

impl VulkanContext {
    /// Create a new GPU context
    ///
    /// # Arguments
    ///
    /// * `entry` - Loaded Vulkan library
    /// * `instance` - Vulkan instance
    /// * `device` - Vulkan logical device (with VK_KHR_acceleration_structure enabled)
    /// * `allocator` - GPU memory allocator
    /// * `queue` - Queue for command submission
    /// * `queue_family` - Queue family index
    /// * `scratch_alignment` - Required alignment of scratch device addresses
    /// * `debug_utils_loader` - Debug utils loader (if validation enabled)
    /// * `debug_messenger` - Debug messenger handle (if validation enabled)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        device: ash::Device,
        allocator: Allocator,
        queue: vk::Queue,
        queue_family: u32,
        scratch_alignment: u64,
        debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
        debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    ) -> Self {
        let acceleration_structure = ash::khr::acceleration_structure::Device::new(&instance, &device);
        Self {
            device,
            acceleration_structure,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            queue,
            queue_family,
            scratch_alignment: scratch_alignment.max(1),
            counters: DeviceCounters::default(),
            debug_utils_loader,
            debug_messenger,
            instance,
            _entry: entry,
        }
    }

    /// Device address of `buffer` (created with SHADER_DEVICE_ADDRESS)
    pub fn buffer_address(&self, buffer: vk::Buffer) -> vk::DeviceAddress {
        let info = vk::BufferDeviceAddressInfo::default().buffer(buffer);
        unsafe { self.device.get_buffer_device_address(&info) }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // 1. Drop allocator: free VkDeviceMemory pages BEFORE destroying device
            ManuallyDrop::drop(&mut self.allocator);

            // 2. Cleanup debug config to prevent callbacks during destruction
            #[cfg(feature = "vulkan-validation")]
            crate::debug::cleanup_debug_config();

            // 3. Destroy debug messenger BEFORE device and instance
            if let (Some(debug_utils), Some(messenger)) =
                (&self.debug_utils_loader, self.debug_messenger.take())
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            // 4. Destroy device and instance
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
