//! Point and ray casts against a hitbox registry.
//!
//! Both queries walk the registry in ascending ID order and stop at the
//! first hitbox that matches. They never mutate the registry.

use crate::OrientedBox;
use glam::Vec3;
use hbup_core::{HitboxId, HitboxRegistry};
use tracing::trace;

/// First hitbox struck by a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Hitbox that answered the cast.
    pub id: HitboxId,
    /// Entry parameter along the ray, in units of the cast vector.
    pub distance: f32,
}

/// Read-only view over a registry for geometric queries.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a> {
    registry: &'a HitboxRegistry,
}

impl<'a> QueryEngine<'a> {
    /// Wrap a registry for querying.
    pub fn new(registry: &'a HitboxRegistry) -> Self {
        Self { registry }
    }

    /// Lowest-ID hitbox containing `point`.
    pub fn first_point_hit(&self, point: Vec3) -> Option<HitboxId> {
        let hit = self.registry.iter().find_map(|(id, hitbox)| {
            OrientedBox::new(hitbox)
                .filter(|obb| obb.contains_point(point))
                .map(|_| id)
        });
        trace!(?point, ?hit, "point cast");
        hit
    }

    /// Lowest-ID hitbox intersected by the ray from `origin` along `vector`.
    pub fn first_ray_hit(&self, origin: Vec3, vector: Vec3) -> Option<RayHit> {
        let hit = self.registry.iter().find_map(|(id, hitbox)| {
            OrientedBox::new(hitbox)
                .and_then(|obb| obb.ray_entry(origin, vector))
                .map(|distance| RayHit { id, distance })
        });
        trace!(?origin, ?vector, ?hit, "ray cast");
        hit
    }

    /// Whether any hitbox contains `point`.
    pub fn cast_point(&self, point: Vec3) -> bool {
        self.first_point_hit(point).is_some()
    }

    /// Whether the ray strikes any hitbox.
    pub fn cast_ray(&self, origin: Vec3, vector: Vec3) -> bool {
        self.first_ray_hit(origin, vector).is_some()
    }
}
