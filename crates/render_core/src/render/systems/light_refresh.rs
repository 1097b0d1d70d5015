//! Light index synchronization
//!
//! Keeps the [`LightIndex`] in step with the world. A light entity is
//! re-registered whenever its resolved world placement or parameters change,
//! which covers parents moving underneath it as well as direct transform
//! edits. Disabled lights, lights in disabled scenes and lights of despawned
//! entities are removed from the index.

use std::collections::{HashMap, HashSet};

use crate::ecs::components::{LightComponent, LightId};
use crate::ecs::{Entity, World};
use crate::foundation::math::{constants, utils, Vec3, Vec4};
use crate::spatial::{LightIndex, LightRecord};

#[derive(Debug, Clone, Copy)]
struct TrackedLight {
    entity: Entity,
    record: LightRecord,
}

/// Tracks which lights are registered and with what placement
#[derive(Debug, Default)]
pub struct LightRefresh {
    tracked: HashMap<LightId, TrackedLight>,
    refused: HashSet<LightId>,
    max_depth: usize,
}

impl LightRefresh {
    /// Create a tracker composing parent chains up to `max_depth`
    pub fn new(max_depth: usize) -> Self {
        Self {
            tracked: HashMap::new(),
            refused: HashSet::new(),
            max_depth,
        }
    }

    /// Number of lights currently registered through this tracker
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    /// Whether no light is registered
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Lights the index turned away because it was full
    ///
    /// They are retried on every sync and leave this set once indexed.
    pub fn refused_len(&self) -> usize {
        self.refused.len()
    }

    fn resolve(&self, world: &World, entity: Entity, light: &LightComponent) -> LightRecord {
        let matrix = world.world_matrix(entity, self.max_depth);
        let position = matrix.as_ref().map_or_else(Vec3::zeros, utils::translation_of);
        let direction = matrix
            .map(|m| (m * Vec4::new(0.0, 0.0, -1.0, 0.0)).xyz())
            .filter(|d| d.norm_squared() > constants::EPSILON_SQ)
            .map_or(-Vec3::z(), |d| d.normalize());
        LightRecord::from_component(light, position, direction)
    }

    /// Bring one entity's light up to date; returns whether the index changed
    pub fn sync_entity(&mut self, world: &World, lights: &mut LightIndex, entity: Entity) -> bool {
        let Some(light) = world.get::<LightComponent>(entity) else {
            return false;
        };
        let id = light.id;

        if !light.enabled || !world.is_active(entity) {
            self.refused.remove(&id);
            if self.tracked.remove(&id).is_some() {
                lights.remove(id);
                log::debug!("Light {:?} of entity {} unregistered", id, entity);
                return true;
            }
            return false;
        }

        let record = self.resolve(world, entity, light);
        if self.tracked.get(&id).is_some_and(|tracked| tracked.record == record) {
            return false;
        }
        if !lights.update(id, light.light_type, record) {
            if self.refused.insert(id) {
                log::warn!("Light index is full; light {:?} of entity {} not indexed", id, entity);
            } else {
                log::trace!("Light {:?} of entity {} still not indexed", id, entity);
            }
            return false;
        }
        self.refused.remove(&id);
        log::trace!("Light {:?} of entity {} at {:?}", id, entity, record.position);
        self.tracked.insert(id, TrackedLight { entity, record });
        true
    }

    /// Stop tracking a light and remove it from the index
    pub fn forget(&mut self, lights: &mut LightIndex, id: LightId) -> bool {
        self.refused.remove(&id);
        self.tracked.remove(&id).is_some() && lights.remove(id)
    }

    /// Re-sync every light in the world; returns how many index entries changed
    ///
    /// Lights of despawned entities are dropped first so their slots are
    /// free for lights the index turned away earlier.
    pub fn refresh(&mut self, world: &World, lights: &mut LightIndex) -> usize {
        let stale: Vec<LightId> = self
            .tracked
            .iter()
            .filter(|(id, tracked)| {
                world
                    .get::<LightComponent>(tracked.entity)
                    .map_or(true, |light| light.id != **id)
            })
            .map(|(id, _)| *id)
            .collect();
        let mut changed = stale.len();
        for id in stale {
            self.forget(lights, id);
        }

        let entities: Vec<(Entity, LightId)> = world
            .query::<LightComponent>()
            .map(|(entity, light)| (entity, light.id))
            .collect();
        if !self.refused.is_empty() {
            self.refused
                .retain(|id| entities.iter().any(|(_, live)| live == id));
        }
        changed += entities
            .into_iter()
            .filter(|(entity, _)| self.sync_entity(world, lights, *entity))
            .count();

        if changed > 0 {
            log::debug!("Light refresh changed {} index entries", changed);
        }
        changed
    }
}
