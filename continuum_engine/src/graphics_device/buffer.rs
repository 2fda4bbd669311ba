/// Buffer trait and buffer descriptor

use crate::error::Result;

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Bounding-box geometry input read by acceleration structure builds.
    /// Host-visible so the CPU can rewrite the boxes between frames.
    BoundingBoxes,
    /// Scratch memory for acceleration structure builds and refits (device-local)
    Scratch,
}

impl BufferUsage {
    /// Whether buffers of this usage can be written from the CPU
    pub fn is_host_visible(&self) -> bool {
        matches!(self, BufferUsage::BoundingBoxes)
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types (e.g., the Vulkan buffer).
/// The buffer is automatically destroyed when dropped.
pub trait Buffer: Send + Sync {
    /// Update buffer data
    ///
    /// # Arguments
    ///
    /// * `offset` - Offset into the buffer in bytes
    /// * `data` - Data to write
    ///
    /// # Errors
    ///
    /// Fails with `InvalidResource` when the buffer is not host-visible or
    /// when `offset + data.len()` exceeds the buffer size.
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Size in bytes, as requested at creation
    fn size(&self) -> u64;

    /// Usage the buffer was created with
    fn usage(&self) -> BufferUsage;
}
