//! Per-session hitbox registry.
//!
//! Maps client-assigned IDs to hitbox state. Every operation either applies
//! completely or leaves the registry untouched. Iteration is ordered by
//! ascending ID so queries resolve overlapping hits deterministically.

use crate::hitbox::{Hitbox, HitboxId};
use glam::Vec3;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::trace;

/// Failure of a registry operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No hitbox with this ID exists.
    #[error("hitbox {0} not found")]
    NotFound(HitboxId),
    /// A hitbox with this ID already exists.
    #[error("hitbox id {0} already taken")]
    AlreadyTaken(HitboxId),
}

/// Hitboxes owned by one session.
#[derive(Debug, Default, Clone)]
pub struct HitboxRegistry {
    hitboxes: BTreeMap<HitboxId, Hitbox>,
}

impl HitboxRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a default hitbox under `id`.
    pub fn create(&mut self, id: HitboxId) -> Result<(), RegistryError> {
        if self.hitboxes.contains_key(&id) {
            return Err(RegistryError::AlreadyTaken(id));
        }
        self.hitboxes.insert(id, Hitbox::default());
        trace!(%id, "hitbox created");
        Ok(())
    }

    /// Replace the full extents of an existing hitbox.
    pub fn set_size(&mut self, id: HitboxId, size: Vec3) -> Result<(), RegistryError> {
        self.get_mut(id)?.size = size;
        Ok(())
    }

    /// Replace the center of an existing hitbox.
    pub fn set_location(&mut self, id: HitboxId, location: Vec3) -> Result<(), RegistryError> {
        self.get_mut(id)?.location = location;
        Ok(())
    }

    /// Replace the Euler rotation of an existing hitbox.
    pub fn set_rotation(&mut self, id: HitboxId, rotation: Vec3) -> Result<(), RegistryError> {
        self.get_mut(id)?.rotation = rotation;
        Ok(())
    }

    /// Remove a hitbox, freeing its ID for reuse.
    pub fn destroy(&mut self, id: HitboxId) -> Result<Hitbox, RegistryError> {
        let removed = self.hitboxes.remove(&id).ok_or(RegistryError::NotFound(id))?;
        trace!(%id, "hitbox destroyed");
        Ok(removed)
    }

    /// Look up a hitbox.
    pub fn get(&self, id: HitboxId) -> Option<&Hitbox> {
        self.hitboxes.get(&id)
    }

    /// Whether `id` is currently in use.
    pub fn contains(&self, id: HitboxId) -> bool {
        self.hitboxes.contains_key(&id)
    }

    /// Iterate hitboxes in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = (HitboxId, &Hitbox)> + '_ {
        self.hitboxes.iter().map(|(id, hitbox)| (*id, hitbox))
    }

    /// Number of live hitboxes.
    pub fn len(&self) -> usize {
        self.hitboxes.len()
    }

    /// True when no hitboxes exist.
    pub fn is_empty(&self) -> bool {
        self.hitboxes.is_empty()
    }

    fn get_mut(&mut self, id: HitboxId) -> Result<&mut Hitbox, RegistryError> {
        self.hitboxes.get_mut(&id).ok_or(RegistryError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_can_be_reused_after_destroy() {
        let mut registry = HitboxRegistry::new();
        let id = HitboxId(42);
        registry.create(id).unwrap();
        registry.destroy(id).unwrap();
        registry.create(id).unwrap();
        assert_eq!(registry.get(id), Some(&Hitbox::default()));
    }

    #[test]
    fn duplicate_create_keeps_existing_state() {
        let mut registry = HitboxRegistry::new();
        let id = HitboxId(1);
        registry.create(id).unwrap();
        registry.set_size(id, Vec3::splat(3.0)).unwrap();

        assert_eq!(registry.create(id), Err(RegistryError::AlreadyTaken(id)));
        assert_eq!(registry.get(id).unwrap().size, Vec3::splat(3.0));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn mutations_on_missing_id_fail_without_side_effects() {
        let mut registry = HitboxRegistry::new();
        registry.create(HitboxId(1)).unwrap();
        let before = registry.get(HitboxId(1)).copied();
        let missing = HitboxId(2);

        assert_eq!(
            registry.set_size(missing, Vec3::ONE),
            Err(RegistryError::NotFound(missing))
        );
        assert_eq!(
            registry.set_location(missing, Vec3::ONE),
            Err(RegistryError::NotFound(missing))
        );
        assert_eq!(
            registry.set_rotation(missing, Vec3::ONE),
            Err(RegistryError::NotFound(missing))
        );
        assert_eq!(registry.destroy(missing), Err(RegistryError::NotFound(missing)));

        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(missing));
        assert_eq!(registry.get(HitboxId(1)).copied(), before);
    }

    #[test]
    fn setters_replace_whole_vectors() {
        let mut registry = HitboxRegistry::new();
        let id = HitboxId(-5);
        registry.create(id).unwrap();
        registry.set_location(id, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        registry.set_location(id, Vec3::new(0.0, -1.0, 0.5)).unwrap();
        registry.set_rotation(id, Vec3::new(0.1, 0.2, 0.3)).unwrap();

        let hitbox = registry.get(id).unwrap();
        assert_eq!(hitbox.location, Vec3::new(0.0, -1.0, 0.5));
        assert_eq!(hitbox.rotation, Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(hitbox.size, Vec3::ZERO);
    }

    #[test]
    fn iteration_is_ascending_by_id() {
        let mut registry = HitboxRegistry::new();
        for id in [5, -3, 12, 0] {
            registry.create(HitboxId(id)).unwrap();
        }
        let ids: Vec<i32> = registry.iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, vec![-3, 0, 5, 12]);
    }
}
