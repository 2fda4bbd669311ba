/// Staging module - bounding volumes, render packets and the stager

pub mod components;
pub mod bounds;
pub mod render_packet;
pub mod stager;

pub use components::*;
pub use bounds::*;
pub use render_packet::*;
pub use stager::*;
