//! Hitbox identifiers and per-hitbox state.
//!
//! A hitbox is an oriented box described by three independently settable
//! vectors. Conventions shared with the query engine:
//!
//! - `location` is the box center in world space.
//! - `size` is the *full* extent along each local axis; the half-extent is
//!   `|size| / 2`, so a negative component behaves like its absolute value.
//! - `rotation` holds intrinsic Euler angles in radians about X, then Y,
//!   then Z (`glam::EulerRot::XYZ`, so `R = Rx * Ry * Rz`).

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-assigned hitbox identifier.
///
/// Unique among the hitboxes currently alive in one registry. Any `i32` is
/// valid, including negative values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HitboxId(pub i32);

impl fmt::Display for HitboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<i32> for HitboxId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// State of a single hitbox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hitbox {
    /// Center of the box.
    pub location: Vec3,
    /// Full extents along the local X/Y/Z axes.
    pub size: Vec3,
    /// Euler angles (radians, XYZ order).
    pub rotation: Vec3,
}

impl Default for Hitbox {
    /// Freshly created hitboxes sit at the origin, zero-sized and unrotated.
    fn default() -> Self {
        Self {
            location: Vec3::ZERO,
            size: Vec3::ZERO,
            rotation: Vec3::ZERO,
        }
    }
}

impl Hitbox {
    /// Half-extents used for containment and slab tests.
    pub fn half_extents(&self) -> Vec3 {
        self.size.abs() * 0.5
    }

    /// Orientation as a quaternion.
    pub fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }

    /// Transform a world-space point into this box's local frame.
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.orientation().inverse() * (point - self.location)
    }

    /// Rotate a world-space direction into this box's local frame.
    pub fn direction_to_local(&self, direction: Vec3) -> Vec3 {
        self.orientation().inverse() * direction
    }
}
