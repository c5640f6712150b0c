#![warn(missing_docs)]
//! Geometry for hitbox queries (boxes, point containment, ray slabs).

pub mod query;

pub use query::{QueryEngine, RayHit};

use glam::Vec3;
use hbup_core::Hitbox;

/// Axis-aligned bounding box in a hitbox's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner (x, y, z).
    pub min: Vec3,
    /// Maximum corner (x, y, z).
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB ensuring min <= max per axis.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        debug_assert!(min.cmple(max).all());
        Self { min, max }
    }

    /// Box centered on the origin with the given half-extents.
    pub fn from_half_extents(half: Vec3) -> Self {
        Self::new(-half, half)
    }

    /// Inclusive containment test.
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Slab test for a ray starting at `origin` heading along `direction`.
    ///
    /// Returns the entry parameter `t >= 0` (in units of `direction`) or
    /// `None` when the ray misses or the box lies behind the origin. An
    /// origin inside the box enters at `t = 0`. Zero direction components
    /// require the origin to lie within that axis' slab.
    pub fn ray_entry(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let mut t_near = 0.0_f32;
        let mut t_far = f32::INFINITY;

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if d == 0.0 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let t1 = (lo - o) * inv;
            let t2 = (hi - o) * inv;
            t_near = t_near.max(t1.min(t2));
            t_far = t_far.min(t1.max(t2));
            if t_near > t_far {
                return None;
            }
        }

        Some(t_near)
    }
}

/// A hitbox resolved into the pieces the query tests need.
#[derive(Debug, Clone, Copy)]
pub struct OrientedBox<'a> {
    hitbox: &'a Hitbox,
    local: Aabb,
}

impl<'a> OrientedBox<'a> {
    /// Borrow a hitbox as an oriented box.
    ///
    /// Returns `None` when any component of the hitbox is non-finite; such
    /// boxes never produce hits.
    pub fn new(hitbox: &'a Hitbox) -> Option<Self> {
        let finite = hitbox.location.is_finite()
            && hitbox.size.is_finite()
            && hitbox.rotation.is_finite();
        finite.then(|| Self {
            hitbox,
            local: Aabb::from_half_extents(hitbox.half_extents()),
        })
    }

    /// Whether a world-space point lies inside the box (boundary inclusive).
    pub fn contains_point(&self, point: Vec3) -> bool {
        if !point.is_finite() {
            return false;
        }
        self.local.contains_point(self.hitbox.to_local(point))
    }

    /// Entry distance of a world-space ray, in units of `direction`.
    pub fn ray_entry(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        if !origin.is_finite() || !direction.is_finite() {
            return None;
        }
        let local_origin = self.hitbox.to_local(origin);
        let local_direction = self.hitbox.direction_to_local(direction);
        self.local.ray_entry(local_origin, local_direction)
    }
}
