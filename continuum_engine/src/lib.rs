/*!
# Continuum Engine

Core traits and types for the Continuum entity-driven renderer.

This crate keeps GPU acceleration structures in step with the entities of a
scene. Backends (Vulkan, ...) implement the device traits; the staging layer
only talks to the traits, so it runs unchanged against the mock device in tests.

## Architecture

- **GraphicsDevice**: Factory trait for buffers, acceleration structures and command lists
- **CommandList**: Records acceleration structure builds and refits
- **Registry**: Entities, components and destruction observers
- **RenderPacket**: GPU state of one entity (bounds buffer + acceleration structure)
- **Stager**: One render packet per bounding-volume entity, rebuilt or refitted every frame
- **FrameDriver**: begin, stage, end, submit

Backend implementations provide concrete types that implement the device traits.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod graphics_device;
pub mod registry;
pub mod staging;
pub mod frame;

// Main continuum namespace module
pub mod continuum {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Graphics device factory trait
    pub use crate::graphics_device::GraphicsDevice;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Render sub-module with all GPU abstraction types
    pub mod render {
        pub use crate::graphics_device::*;
    }

    // Entity registry sub-module
    pub mod registry {
        pub use crate::registry::*;
    }

    // Staging sub-module
    pub mod staging {
        pub use crate::staging::*;
    }

    // Frame sub-module
    pub mod frame {
        pub use crate::frame::*;
    }
}

// Re-export math library at crate root
pub use glam;
