/*!
# Continuum Engine - Vulkan Backend

Vulkan implementation of the Continuum engine device traits.

This crate provides a headless Vulkan backend that implements the
continuum_engine traits using the Ash library for Vulkan bindings and
gpu-allocator for memory management. Acceleration structures are built with
VK_KHR_acceleration_structure.
*/

// Vulkan implementation modules
mod vulkan;
mod vulkan_context;
mod vulkan_buffer;
mod vulkan_acceleration_structure;
mod vulkan_command_list;
#[cfg(feature = "vulkan-validation")]
mod debug;

// Main continuum namespace module
pub mod continuum {
    pub use crate::vulkan::VulkanGraphicsDevice;
    pub use crate::vulkan_command_list::CommandList as VulkanCommandList;

    // Validation reporting (vulkan-validation feature only)
    #[cfg(feature = "vulkan-validation")]
    pub use crate::debug::{get_validation_stats, print_validation_stats_report};
}
