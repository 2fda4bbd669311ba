/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait

use continuum_engine::continuum::{GraphicsDevice, Result, Error};
use continuum_engine::continuum::render::{
    AccelerationStructure as RendererAccelerationStructure,
    AccelerationStructureSizes,
    Buffer as RendererBuffer,
    BufferDesc,
    BufferUsage,
    CommandList as RendererCommandList,
    Config,
    DeviceStats,
    PrimitiveAccelerationStructureDesc,
    ValidationStats,
};
use ash::vk;
use std::ffi::{CStr, CString};
use std::sync::Arc;
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use continuum_engine::{engine_debug, engine_info, engine_warn, engine_error, engine_err};

use crate::vulkan_acceleration_structure::{
    buffer_location, buffer_usage_to_vk, geometry_inputs, query_build_sizes, AccelerationStructure,
};
use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::CommandList;
use crate::vulkan_context::VulkanContext;

/// Device extensions required for acceleration structure builds
const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 2] = [
    ash::khr::acceleration_structure::NAME,
    ash::khr::deferred_host_operations::NAME,
];

/// Vulkan device implementation
///
/// Headless: no surface or swapchain. Creates buffers and acceleration
/// structures and submits command lists to a single compute-capable queue.
pub struct VulkanGraphicsDevice {
    /// Physical device
    physical_device: vk::PhysicalDevice,
    /// Device name reported by the driver
    device_name: String,
    /// Shared GPU context for all resources
    /// Owns device, instance, and debug messenger destruction
    gpu_context: Arc<VulkanContext>,
}

impl VulkanGraphicsDevice {
    /// Create a new Vulkan device
    ///
    /// Picks the first physical device exposing VK_KHR_acceleration_structure
    /// and a compute queue.
    ///
    /// # Arguments
    ///
    /// * `config` - Device configuration
    pub fn new(config: Config) -> Result<Self> {
        unsafe {
            // Create Vulkan Entry
            let entry = ash::Entry::load()
                .map_err(|e| {
                    engine_error!("continuum::vulkan", "Failed to load Vulkan library: {:?}", e);
                    Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
                })?;

            // Application Info
            let app_name = CString::new(config.app_name.as_str())
                .unwrap_or_else(|_| CString::from(c"Continuum Application"));
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Continuum")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let validation = Self::validation_enabled(&config);

            let mut extension_names = Vec::new();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }

            let layer_names = if validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| {
                    engine_error!("continuum::vulkan", "Failed to create Vulkan instance: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
                })?;

            let (debug_utils_loader, debug_messenger) = if validation {
                Self::create_debug_messenger(&entry, &instance, &config)?
            } else {
                (None, None)
            };

            // Pick Physical Device
            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(|e| {
                    engine_error!("continuum::vulkan", "Failed to enumerate physical devices: {:?}", e);
                    Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
                })?;

            let (physical_device, queue_family) = physical_devices
                .into_iter()
                .find_map(|pd| {
                    if !Self::supports_required_extensions(&instance, pd) {
                        return None;
                    }
                    Self::find_compute_queue_family(&instance, pd).map(|family| (pd, family))
                })
                .ok_or_else(|| {
                    engine_error!("continuum::vulkan", "No GPU with VK_KHR_acceleration_structure found");
                    Error::InitializationFailed(
                        "No GPU with VK_KHR_acceleration_structure found".to_string(),
                    )
                })?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "Unknown".to_string());

            let mut as_properties = vk::PhysicalDeviceAccelerationStructurePropertiesKHR::default();
            let mut properties2 = vk::PhysicalDeviceProperties2::default().push_next(&mut as_properties);
            instance.get_physical_device_properties2(physical_device, &mut properties2);
            let scratch_alignment = as_properties.min_acceleration_structure_scratch_offset_alignment as u64;

            // Create Logical Device
            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family)
                .queue_priorities(&queue_priorities)];

            let device_extension_names: Vec<*const std::ffi::c_char> = REQUIRED_DEVICE_EXTENSIONS
                .iter()
                .map(|name| name.as_ptr())
                .collect();

            let mut vulkan12_features = vk::PhysicalDeviceVulkan12Features::default()
                .buffer_device_address(true);
            let mut as_features = vk::PhysicalDeviceAccelerationStructureFeaturesKHR::default()
                .acceleration_structure(true);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .push_next(&mut vulkan12_features)
                .push_next(&mut as_features);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!("continuum::vulkan", "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let queue = device.get_device_queue(queue_family, 0);

            // Create GPU allocator (device addresses feed the builds)
            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: true,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!("continuum::vulkan", "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let gpu_context = Arc::new(VulkanContext::new(
                entry,
                instance,
                device,
                allocator,
                queue,
                queue_family,
                scratch_alignment,
                debug_utils_loader,
                debug_messenger,
            ));

            engine_info!(
                "continuum::vulkan",
                "Vulkan device created on {} (queue family {}, scratch alignment {})",
                device_name,
                queue_family,
                gpu_context.scratch_alignment
            );

            Ok(Self {
                physical_device,
                device_name,
                gpu_context,
            })
        }
    }

    /// Name of the selected GPU
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Validation messages counted so far
    ///
    /// Always zero unless built with the `vulkan-validation` feature and
    /// created with `enable_validation_stats`.
    pub fn validation_stats(&self) -> ValidationStats {
        #[cfg(feature = "vulkan-validation")]
        {
            crate::debug::get_validation_stats()
        }
        #[cfg(not(feature = "vulkan-validation"))]
        {
            ValidationStats::default()
        }
    }

    fn validation_enabled(config: &Config) -> bool {
        if config.enable_validation && !cfg!(feature = "vulkan-validation") {
            engine_warn!(
                "continuum::vulkan",
                "Validation requested but the crate was built without the vulkan-validation feature"
            );
        }
        config.enable_validation && cfg!(feature = "vulkan-validation")
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &Config,
    ) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

        crate::debug::init_debug_config(crate::debug::Config {
            severity: config.debug_severity,
            enable_stats: config.enable_validation_stats,
        });

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(crate::debug::severity_flags(config.debug_severity))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
            )
            .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

        let messenger = debug_utils
            .create_debug_utils_messenger(&debug_info, None)
            .map_err(|e| {
                engine_error!("continuum::vulkan", "Failed to create debug messenger: {:?}", e);
                Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
            })?;

        Ok((Some(debug_utils), Some(messenger)))
    }

    #[cfg(not(feature = "vulkan-validation"))]
    unsafe fn create_debug_messenger(
        _entry: &ash::Entry,
        _instance: &ash::Instance,
        _config: &Config,
    ) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
        Ok((None, None))
    }

    unsafe fn supports_required_extensions(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> bool {
        let available = match instance.enumerate_device_extension_properties(physical_device) {
            Ok(available) => available,
            Err(_) => return false,
        };
        REQUIRED_DEVICE_EXTENSIONS.iter().all(|required| {
            available
                .iter()
                .any(|ext| ext.extension_name_as_c_str().map_or(false, |name| name == *required))
        })
    }

    unsafe fn find_compute_queue_family(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Option<u32> {
        instance
            .get_physical_device_queue_family_properties(physical_device)
            .iter()
            .position(|qf| qf.queue_flags.contains(vk::QueueFlags::COMPUTE))
            .map(|i| i as u32)
    }

    /// Create a buffer + allocation + binding of `size` bytes
    fn allocate_buffer(
        &self,
        name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: gpu_allocator::MemoryLocation,
    ) -> Result<(vk::Buffer, gpu_allocator::vulkan::Allocation)> {
        let device = &self.gpu_context.device;
        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = device.create_buffer(&buffer_create_info, None)
                .map_err(|e| {
                    engine_error!("continuum::vulkan", "Failed to create {} of size {} bytes: {:?}", name, size, e);
                    Error::ResourceAllocation(format!("Failed to create {}: {:?}", name, e))
                })?;

            let requirements = device.get_buffer_memory_requirements(buffer);

            let allocation = {
                let mut allocator = match self.gpu_context.allocator.lock() {
                    Ok(allocator) => allocator,
                    Err(_) => {
                        device.destroy_buffer(buffer, None);
                        return Err(engine_err!("continuum::vulkan", "GPU allocator lock poisoned"));
                    }
                };
                allocator.allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
            };
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(_e) => {
                    device.destroy_buffer(buffer, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("continuum::vulkan", "Out of GPU memory for {} (required: {:.2} MB)", name, size_mb);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                if let Ok(mut allocator) = self.gpu_context.allocator.lock() {
                    allocator.free(allocation).ok();
                }
                device.destroy_buffer(buffer, None);
                return Err(engine_err!("continuum::vulkan", "Failed to bind {} memory: {:?}", name, e));
            }

            Ok((buffer, allocation))
        }
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn RendererBuffer>> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("Buffer size must be non-zero".to_string()));
        }

        // Scratch addresses are aligned up at record time
        let vk_size = match desc.usage {
            BufferUsage::Scratch => desc.size + self.gpu_context.scratch_alignment,
            BufferUsage::BoundingBoxes => desc.size,
        };

        let (buffer, allocation) = self.allocate_buffer(
            "buffer",
            vk_size,
            buffer_usage_to_vk(desc.usage),
            buffer_location(desc.usage),
        )?;

        Ok(Arc::new(Buffer::new(
            Arc::clone(&self.gpu_context),
            buffer,
            allocation,
            desc.size,
            desc.usage,
        )))
    }

    fn acceleration_structure_sizes(
        &self,
        desc: &PrimitiveAccelerationStructureDesc,
    ) -> Result<AccelerationStructureSizes> {
        let inputs = geometry_inputs(desc)?;
        Ok(query_build_sizes(&self.gpu_context, desc.usage, &inputs))
    }

    fn create_acceleration_structure(&self, size: u64) -> Result<Arc<dyn RendererAccelerationStructure>> {
        let (buffer, allocation) = self.allocate_buffer(
            "acceleration structure",
            size,
            vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            gpu_allocator::MemoryLocation::GpuOnly,
        )?;

        let create_info = vk::AccelerationStructureCreateInfoKHR::default()
            .buffer(buffer)
            .offset(0)
            .size(size)
            .ty(vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL);

        let handle = unsafe {
            self.gpu_context
                .acceleration_structure
                .create_acceleration_structure(&create_info, None)
        };
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                if let Ok(mut allocator) = self.gpu_context.allocator.lock() {
                    allocator.free(allocation).ok();
                }
                unsafe { self.gpu_context.device.destroy_buffer(buffer, None) };
                engine_error!("continuum::vulkan", "Failed to create acceleration structure of {} bytes: {:?}", size, e);
                return Err(Error::ResourceAllocation(format!(
                    "Failed to create acceleration structure: {:?}",
                    e
                )));
            }
        };

        engine_debug!("continuum::vulkan", "Acceleration structure created ({} bytes)", size);

        Ok(Arc::new(AccelerationStructure::new(
            Arc::clone(&self.gpu_context),
            handle,
            buffer,
            allocation,
            size,
        )))
    }

    fn create_command_list(&self) -> Result<Box<dyn RendererCommandList>> {
        Ok(Box::new(CommandList::new(Arc::clone(&self.gpu_context))?))
    }

    fn submit(&self, commands: &[&dyn RendererCommandList]) -> Result<()> {
        for cmd in commands {
            // Downcast to the Vulkan command list
            let vk_cmd = unsafe { &*(*cmd as *const dyn RendererCommandList as *const CommandList) };
            if vk_cmd.is_recording() {
                return Err(Error::BackendError("Cannot submit a command list that is still recording".to_string()));
            }

            let command_buffers = [vk_cmd.command_buffer()];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

            unsafe {
                self.gpu_context.device
                    .queue_submit(self.gpu_context.queue, &[submit_info], vk_cmd.fence())
                    .map_err(|e| engine_err!("continuum::vulkan", "submit: failed to submit queue: {:?}", e))?;
            }
            vk_cmd.mark_submitted();
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.gpu_context.device
                .queue_wait_idle(self.gpu_context.queue)
                .map_err(|e| engine_err!("continuum::vulkan", "Failed to wait idle: {:?}", e))
        }
    }

    fn stats(&self) -> DeviceStats {
        self.gpu_context.counters.snapshot()
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        // The context destroys the device once every resource is gone
        unsafe {
            self.gpu_context.device.device_wait_idle().ok();
        }
        #[cfg(feature = "vulkan-validation")]
        if self.gpu_context.debug_messenger.is_some() {
            crate::debug::print_validation_stats_report();
        }
    }
}
