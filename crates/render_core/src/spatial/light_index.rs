//! Light index
//!
//! Holds at most one directional "sun" light plus any number of positional
//! (point and spot) lights, up to the capacity fixed at construction. The
//! positional lights live in an [`Octree`] as cubes of half-extent `range`
//! around their position.
//!
//! [`LightIndex::get_nearby`] always answers with exactly `max_lights`
//! records: the sun in slot 0, then the closest positional lights by squared
//! distance (registration order breaks ties), then zeroed padding.

use std::collections::HashMap;

use super::bounds::AABB;
use super::octree::{Octree, OctreeConfig, OctreeEntry};
use crate::config::LightIndexConfig;
use crate::ecs::components::{LightComponent, LightId, LightType};
use crate::foundation::math::Vec3;

/// Floats per light record in the shader light block
pub const LIGHT_RECORD_FLOATS: usize = 16;

/// Shader-facing light description
///
/// A zeroed record (`kind == 0`) marks an empty slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightRecord {
    /// World position (unused for the sun)
    pub position: Vec3,
    /// Reach of point and spot lights
    pub range: f32,
    /// Linear RGB color
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// World direction the light travels (sun and spot)
    pub direction: Vec3,
    /// Light type tag, see [`LightType::shader_tag`]
    pub kind: f32,
    /// Spot inner cone cosine
    pub inner_cutoff: f32,
    /// Spot outer cone cosine
    pub outer_cutoff: f32,
}

impl LightRecord {
    /// Build a record from a light component and its resolved placement
    pub fn from_component(light: &LightComponent, position: Vec3, direction: Vec3) -> Self {
        Self {
            position,
            range: light.range,
            color: light.color,
            intensity: light.intensity,
            direction,
            kind: light.light_type.shader_tag(),
            inner_cutoff: light.inner_cutoff,
            outer_cutoff: light.outer_cutoff,
        }
    }

    /// Whether this is an empty padding slot
    pub fn is_empty(&self) -> bool {
        self.kind == 0.0
    }

    /// Append the record's std140-friendly float layout
    pub fn write_floats(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&[
            self.position.x, self.position.y, self.position.z, self.range,
            self.color.x, self.color.y, self.color.z, self.intensity,
            self.direction.x, self.direction.y, self.direction.z, self.kind,
            self.inner_cutoff, self.outer_cutoff, 0.0, 0.0,
        ]);
    }
}

#[derive(Debug, Clone, Copy)]
struct IndexedLight {
    record: LightRecord,
    sequence: u64,
}

/// Spatial index answering "which lights affect this point"
#[derive(Debug, Clone)]
pub struct LightIndex {
    sun: Option<(LightId, LightRecord)>,
    lights: HashMap<LightId, IndexedLight>,
    tree: Octree<LightId>,
    next_sequence: u64,
    max_lights: usize,
}

impl LightIndex {
    /// Create an index answering with `max_lights` slots per query
    pub fn new(config: &LightIndexConfig, max_lights: usize) -> Self {
        let bounds = AABB::new(Vec3::from(config.world_min), Vec3::from(config.world_max));
        let octree_config = OctreeConfig {
            max_entries_per_node: config.max_entries_per_node,
            max_depth: config.max_depth,
            capacity: config.capacity,
            ..Default::default()
        };
        log::debug!(
            "Created light index: {} slots, capacity {}, bounds {:?}..{:?}",
            max_lights,
            config.capacity,
            config.world_min,
            config.world_max
        );
        Self {
            sun: None,
            lights: HashMap::new(),
            tree: Octree::new(bounds, octree_config),
            next_sequence: 0,
            max_lights: max_lights.max(1),
        }
    }

    /// Slots returned by every query
    pub fn max_lights(&self) -> usize {
        self.max_lights
    }

    /// The current sun record
    pub fn sun(&self) -> Option<&LightRecord> {
        self.sun.as_ref().map(|(_, record)| record)
    }

    /// Number of indexed positional lights
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Whether no positional light is indexed
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Whether a light is registered (as sun or positional)
    pub fn contains(&self, id: LightId) -> bool {
        self.lights.contains_key(&id) || self.sun.is_some_and(|(sun_id, _)| sun_id == id)
    }

    /// Register a light at its resolved placement
    ///
    /// A directional light replaces the sun unconditionally. A positional
    /// light already present is moved (removed, then reinserted). Returns
    /// `false` when the positional capacity is exhausted.
    pub fn insert(&mut self, id: LightId, light_type: LightType, record: LightRecord) -> bool {
        if light_type == LightType::Directional {
            if let Some((previous, _)) = self.sun {
                if previous != id {
                    log::debug!("Directional light {:?} replaces sun {:?}", id, previous);
                }
            }
            // A light that changed type must not linger in the tree
            self.remove_positional(id);
            self.sun = Some((id, record));
            return true;
        }

        if self.sun.is_some_and(|(sun_id, _)| sun_id == id) {
            self.sun = None;
        }

        // Keep the original registration order across moves
        let sequence = match self.remove_positional(id) {
            Some(previous) => previous.sequence,
            None => {
                let sequence = self.next_sequence;
                self.next_sequence += 1;
                sequence
            }
        };

        let bounds = AABB::cube(record.position, record.range.max(0.0));
        if !self.tree.insert(id, bounds, sequence) {
            return false;
        }
        self.lights.insert(id, IndexedLight { record, sequence });
        true
    }

    /// Move or re-parameterize a registered light
    ///
    /// The stale tree entry is removed before the new one is inserted; the
    /// light keeps its registration order.
    pub fn update(&mut self, id: LightId, light_type: LightType, record: LightRecord) -> bool {
        self.insert(id, light_type, record)
    }

    /// Unregister a light
    pub fn remove(&mut self, id: LightId) -> bool {
        if self.sun.is_some_and(|(sun_id, _)| sun_id == id) {
            self.sun = None;
            return true;
        }
        self.remove_positional(id).is_some()
    }

    fn remove_positional(&mut self, id: LightId) -> Option<IndexedLight> {
        self.tree.remove(&id);
        self.lights.remove(&id)
    }

    /// Lights affecting the box of half-extent `radius` around `position`
    ///
    /// Always returns `max_lights` records; unused slots are zeroed.
    pub fn get_nearby(&self, position: Vec3, radius: f32) -> Vec<LightRecord> {
        let mut result = vec![LightRecord::default(); self.max_lights];
        if let Some((_, sun)) = &self.sun {
            result[0] = *sun;
        }

        let mut candidates: Vec<OctreeEntry<LightId>> = Vec::new();
        self.tree
            .query_aabb(&AABB::cube(position, radius.max(0.0)), &mut candidates);

        let mut ranked: Vec<(f32, u64, LightRecord)> = candidates
            .iter()
            .filter_map(|entry| self.lights.get(&entry.key))
            .map(|light| {
                let distance_sq = (light.record.position - position).norm_squared();
                (distance_sq, light.sequence, light.record)
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for (slot, (_, _, record)) in result.iter_mut().skip(1).zip(ranked) {
            *slot = record;
        }
        result
    }

    /// Drop every light
    pub fn clear(&mut self) {
        self.sun = None;
        self.lights.clear();
        self.tree.clear();
    }
}
