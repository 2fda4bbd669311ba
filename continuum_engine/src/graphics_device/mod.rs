/// Graphics device module - GPU abstraction used by render packets

pub mod graphics_device;
pub mod buffer;
pub mod acceleration_structure;
pub mod command_list;

pub use graphics_device::*;
pub use buffer::*;
pub use acceleration_structure::*;
pub use command_list::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
