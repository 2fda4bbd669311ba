//! Error types for the Continuum engine
//!
//! This module defines the error types used throughout the engine,
//! including device initialization, GPU resource allocation and staging.

use std::fmt;

/// Result type for Continuum engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Continuum engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// A GPU object (buffer, acceleration structure, command list) could not be created
    ResourceAllocation(String),

    /// Bounding volume style tag not recognized
    InvalidShape {
        /// Raw style tag carried by the component
        style: u8,
    },

    /// Invalid resource (wrong usage, too small, unknown entity, etc.)
    InvalidResource(String),

    /// Initialization failed (engine, graphics device, subsystems)
    InitializationFailed(String),
}

impl Error {
    /// Whether this error must terminate the frame loop.
    ///
    /// A shape error means the scene data itself is corrupt, so no later
    /// frame can succeed either.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidShape { .. } | Error::InitializationFailed(_) | Error::OutOfMemory
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::ResourceAllocation(msg) => write!(f, "Resource allocation failed: {}", msg),
            Error::InvalidShape { style } => write!(f, "Invalid bounding volume style: {}", style),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
