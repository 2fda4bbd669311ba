//! Unit tests for Vulkan conversion functions
//!
//! Tests pure conversion functions without requiring GPU.
//! Validates the mapping between engine build descriptors and Vulkan flags.

use super::*;

// ============================================================================
// BUILD FLAGS
// ============================================================================

#[test]
fn test_build_flags_default_prefers_fast_trace() {
    let flags = build_flags_to_vk(AccelerationStructureUsage::empty());
    assert_eq!(flags, vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE);
}

#[test]
fn test_build_flags_refit_allows_update() {
    let flags = build_flags_to_vk(AccelerationStructureUsage::REFIT);
    assert!(flags.contains(vk::BuildAccelerationStructureFlagsKHR::ALLOW_UPDATE));
    assert!(flags.contains(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE));
}

#[test]
fn test_build_flags_fast_build_replaces_fast_trace() {
    let flags = build_flags_to_vk(
        AccelerationStructureUsage::REFIT | AccelerationStructureUsage::PREFER_FAST_BUILD,
    );
    assert!(flags.contains(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_BUILD));
    assert!(!flags.contains(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE));
    assert!(flags.contains(vk::BuildAccelerationStructureFlagsKHR::ALLOW_UPDATE));
}

// ============================================================================
// BUFFER USAGE
// ============================================================================

#[test]
fn test_bounding_boxes_buffer_is_build_input() {
    let flags = buffer_usage_to_vk(BufferUsage::BoundingBoxes);
    assert!(flags.contains(vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR));
    assert!(flags.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS));
    assert_eq!(buffer_location(BufferUsage::BoundingBoxes), gpu_allocator::MemoryLocation::CpuToGpu);
}

#[test]
fn test_scratch_buffer_is_device_local_storage() {
    let flags = buffer_usage_to_vk(BufferUsage::Scratch);
    assert!(flags.contains(vk::BufferUsageFlags::STORAGE_BUFFER));
    assert!(flags.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS));
    assert_eq!(buffer_location(BufferUsage::Scratch), gpu_allocator::MemoryLocation::GpuOnly);
}

// ============================================================================
// ALIGNMENT
// ============================================================================

#[test]
fn test_align_up() {
    assert_eq!(align_up(0, 128), 0);
    assert_eq!(align_up(1, 128), 128);
    assert_eq!(align_up(128, 128), 128);
    assert_eq!(align_up(129, 128), 256);
    assert_eq!(align_up(77, 1), 77);
}

// ============================================================================
// BUILD RANGES
// ============================================================================

#[test]
fn test_primitive_offset_in_range() {
    assert_eq!(primitive_offset(0).unwrap(), 0);
    assert_eq!(primitive_offset(24).unwrap(), 24);
    assert_eq!(primitive_offset(u32::MAX as u64).unwrap(), u32::MAX);
}

#[test]
fn test_primitive_offset_too_large_is_rejected() {
    let result = primitive_offset(u32::MAX as u64 + 24);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}
