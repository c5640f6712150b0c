#![warn(missing_docs)]
//! Core hitbox primitives shared across the workspace.

pub mod hitbox;
pub mod registry;

pub use glam::Vec3;
pub use hitbox::{Hitbox, HitboxId};
pub use registry::{HitboxRegistry, RegistryError};
