/// Frame module - per-frame staging and submission

pub mod frame_driver;

pub use frame_driver::*;
