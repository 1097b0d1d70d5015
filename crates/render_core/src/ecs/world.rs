//! ECS World implementation

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use super::components::{SceneId, SceneMembership, TransformComponent};
use super::storage::ErasedStorage;
use super::{Component, ComponentStorage, Entity};
use crate::foundation::math::Mat4;

/// ECS World containing all entities and components
#[derive(Default)]
pub struct World {
    generations: Vec<u32>,
    alive: Vec<bool>,
    enabled: Vec<bool>,
    free_slots: Vec<u32>,
    live_count: usize,
    storages: HashMap<TypeId, Box<dyn ErasedStorage>>,
    disabled_scenes: HashSet<SceneId>,
    chain_warned: AtomicBool,
}

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, enabled entity
    pub fn spawn(&mut self) -> Entity {
        self.live_count += 1;
        if let Some(index) = self.free_slots.pop() {
            let slot = index as usize;
            self.alive[slot] = true;
            self.enabled[slot] = true;
            return Entity::new(index, self.generations[slot]);
        }

        let index = self.generations.len() as u32;
        self.generations.push(0);
        self.alive.push(true);
        self.enabled.push(true);
        Entity::new(index, 0)
    }

    /// Destroy an entity and drop all of its components
    ///
    /// Returns `false` for a stale or already-despawned handle.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = entity.index() as usize;
        for storage in self.storages.values_mut() {
            storage.clear_slot(entity.index());
        }
        self.alive[slot] = false;
        self.enabled[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free_slots.push(entity.index());
        self.live_count -= 1;
        true
    }

    /// Whether the handle refers to a live entity
    pub fn is_alive(&self, entity: Entity) -> bool {
        let slot = entity.index() as usize;
        self.alive.get(slot).copied().unwrap_or(false) && self.generations[slot] == entity.generation()
    }

    /// Number of live entities
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// All live entities in slot order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(slot, _)| Entity::new(slot as u32, self.generations[slot]))
    }

    /// Add or replace a component; ignored for dead handles
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let storage = self
            .storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(ComponentStorage::<T>::new()));
        match storage.as_any_mut().downcast_mut::<ComponentStorage<T>>() {
            Some(storage) => {
                storage.insert(entity.index(), component);
                true
            }
            None => false,
        }
    }

    /// Remove a component from an entity
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.storage_mut::<T>()?.remove(entity.index())
    }

    /// Get a component from an entity
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.storage::<T>()?.get(entity.index())
    }

    /// Get a mutable component from an entity
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.storage_mut::<T>()?.get_mut(entity.index())
    }

    /// Whether the entity has a component of type `T`
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Every live entity carrying `T`, in slot order
    pub fn query<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        let generations = &self.generations;
        self.storage::<T>().into_iter().flat_map(move |storage| {
            storage
                .iter()
                .map(move |(index, component)| (Entity::new(index, generations[index as usize]), component))
        })
    }

    fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any().downcast_ref::<ComponentStorage<T>>())
    }

    fn storage_mut<T: Component>(&mut self) -> Option<&mut ComponentStorage<T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any_mut().downcast_mut::<ComponentStorage<T>>())
    }

    /// Enable or disable a single entity without touching its components
    pub fn set_enabled(&mut self, entity: Entity, enabled: bool) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.enabled[entity.index() as usize] = enabled;
        true
    }

    /// Whether the entity itself is enabled
    pub fn is_enabled(&self, entity: Entity) -> bool {
        self.is_alive(entity) && self.enabled[entity.index() as usize]
    }

    /// Enable or disable every entity tagged with a scene
    pub fn set_scene_enabled(&mut self, scene: SceneId, enabled: bool) {
        if enabled {
            self.disabled_scenes.remove(&scene);
        } else {
            self.disabled_scenes.insert(scene);
        }
    }

    /// Whether a scene is enabled
    pub fn is_scene_enabled(&self, scene: SceneId) -> bool {
        !self.disabled_scenes.contains(&scene)
    }

    /// Alive, enabled, and not in a disabled scene
    pub fn is_active(&self, entity: Entity) -> bool {
        if !self.is_enabled(entity) {
            return false;
        }
        self.get::<SceneMembership>(entity)
            .map_or(true, |membership| self.is_scene_enabled(membership.scene))
    }

    /// Compose the entity's transform with its parent chain
    ///
    /// Parents are weak: a despawned parent ends the chain. Composition stops
    /// after `max_depth` parents or when the chain leads back to `entity`, so
    /// any cycle ends within the bound. Only the first truncation is logged
    /// as a warning.
    pub fn world_matrix(&self, entity: Entity, max_depth: usize) -> Option<Mat4> {
        let mut current = self.get::<TransformComponent>(entity)?;
        let mut matrix = current.to_matrix();
        let mut steps = 0;

        while let Some(parent) = current.parent {
            if steps >= max_depth || parent == entity {
                self.warn_truncated_chain(entity, max_depth, parent);
                break;
            }
            let Some(parent_transform) = self.get::<TransformComponent>(parent) else {
                break;
            };
            matrix = parent_transform.to_matrix() * matrix;
            steps += 1;
            current = parent_transform;
        }

        Some(matrix)
    }

    fn warn_truncated_chain(&self, entity: Entity, max_depth: usize, parent: Entity) {
        if self.chain_warned.swap(true, Ordering::Relaxed) {
            log::trace!("Parent chain of entity {} truncated at {}", entity, parent);
        } else {
            log::warn!(
                "Parent chain of entity {} is cyclic or deeper than {}; truncating at {}",
                entity,
                max_depth,
                parent
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{NameComponent, TransformComponent};
    use crate::foundation::math::{utils, Vec3};
    use approx::assert_relative_eq;

    #[test]
    fn test_spawn_and_despawn_recycles_slot() {
        let mut world = World::new();
        let first = world.spawn();
        world.insert(first, NameComponent::new("first"));
        assert!(world.despawn(first));

        let second = world.spawn();
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert!(!world.is_alive(first));
        assert!(world.get::<NameComponent>(first).is_none());
        assert!(world.get::<NameComponent>(second).is_none());
        assert_eq!(world.live_count(), 1);
    }

    #[test]
    fn test_stale_handle_cannot_insert() {
        let mut world = World::new();
        let entity = world.spawn();
        world.despawn(entity);

        assert!(!world.insert(entity, NameComponent::new("ghost")));
        assert!(!world.despawn(entity));
    }

    #[test]
    fn test_query_visits_live_components() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        let c = world.spawn();
        world.insert(a, NameComponent::new("a"));
        world.insert(c, NameComponent::new("c"));
        world.despawn(a);

        let names: Vec<_> = world.query::<NameComponent>().map(|(e, n)| (e, n.0.clone())).collect();
        assert_eq!(names, vec![(c, "c".to_string())]);
        assert!(world.is_alive(b));
    }

    #[test]
    fn test_scene_and_entity_enable_flags() {
        let mut world = World::new();
        let scene = SceneId(3);
        let entity = world.spawn();
        world.insert(entity, SceneMembership { scene });
        assert!(world.is_active(entity));

        world.set_scene_enabled(scene, false);
        assert!(!world.is_active(entity));
        assert!(world.is_enabled(entity));

        world.set_scene_enabled(scene, true);
        world.set_enabled(entity, false);
        assert!(!world.is_active(entity));
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let mut world = World::new();
        let parent = world.spawn();
        let child = world.spawn();
        world.insert(parent, TransformComponent::from_position(Vec3::new(10.0, 0.0, 0.0)));
        world.insert(
            child,
            TransformComponent::from_position(Vec3::new(0.0, 2.0, 0.0)).with_parent(parent),
        );

        let matrix = world.world_matrix(child, 32).unwrap_or_else(Mat4::identity);
        assert_relative_eq!(utils::translation_of(&matrix), Vec3::new(10.0, 2.0, 0.0));
    }

    #[test]
    fn test_world_matrix_survives_cycle() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        world.insert(a, TransformComponent::from_position(Vec3::new(1.0, 0.0, 0.0)).with_parent(b));
        world.insert(b, TransformComponent::from_position(Vec3::new(0.0, 1.0, 0.0)).with_parent(a));

        let matrix = world.world_matrix(a, 32).unwrap_or_else(Mat4::identity);
        assert_relative_eq!(utils::translation_of(&matrix), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_world_matrix_depth_bound() {
        let mut world = World::new();
        let mut chain: Vec<Entity> = Vec::new();
        for _ in 0..10 {
            let entity = world.spawn();
            let mut transform = TransformComponent::from_position(Vec3::new(1.0, 0.0, 0.0));
            transform.parent = chain.last().copied();
            world.insert(entity, transform);
            chain.push(entity);
        }

        let last = chain[chain.len() - 1];
        let matrix = world.world_matrix(last, 3).unwrap_or_else(Mat4::identity);
        assert_relative_eq!(utils::translation_of(&matrix).x, 4.0);
    }

    #[test]
    fn test_world_matrix_bounds_cycle_above_entity() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        let child = world.spawn();
        world.insert(a, TransformComponent::from_position(Vec3::new(1.0, 0.0, 0.0)).with_parent(b));
        world.insert(b, TransformComponent::from_position(Vec3::new(0.0, 1.0, 0.0)).with_parent(a));
        world.insert(child, TransformComponent::identity().with_parent(a));

        // a, b, a, b: the loop never returns to `child`, the bound ends it
        let matrix = world.world_matrix(child, 4).unwrap_or_else(Mat4::identity);
        assert_relative_eq!(utils::translation_of(&matrix), Vec3::new(2.0, 2.0, 0.0));
        assert!(world.chain_warned.load(Ordering::Relaxed));
    }

    #[test]
    fn test_world_matrix_of_root_is_local() {
        let mut world = World::new();
        let root = world.spawn();
        world.insert(root, TransformComponent::from_position(Vec3::new(0.0, 0.0, -3.0)));

        let matrix = world.world_matrix(root, 0).unwrap_or_else(Mat4::identity);
        assert_relative_eq!(utils::translation_of(&matrix), Vec3::new(0.0, 0.0, -3.0));
        assert!(!world.chain_warned.load(Ordering::Relaxed));
    }
}
