/// Registry module - entities, typed components and destruction signals

pub mod registry;

pub use registry::{Component, Connection, DestroyCallback, Entity, ObserverOwner, Registry};
