//! Forward pass draw orchestration
//!
//! Visible drawables are grouped into batches by `(mesh, material)`. Each
//! batch keeps its own command list, and its own instance buffer when the
//! material is instanced. Both are created the first time the batch is seen
//! and reused on every later frame.
//!
//! The transform, material and light uniform buffers are single-slot and
//! shared by every batch. Every write to them is recorded inline, directly
//! before the draw that consumes it.
//!
//! Frame layout:
//!
//! ```text
//! frame_clear ─► batch 0 ─► batch 1 ─► ... ─► frame_resolve (copy color) ─► wait
//! ```

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use super::camera_view::CameraView;
use crate::config::RenderConfig;
use crate::ecs::components::{DrawableComponent, RenderFlags};
use crate::ecs::{Entity, World};
use crate::foundation::math::{utils, Mat4, Vec3};
use crate::render::api::{BufferDescription, BufferHandle, BufferUsage, CommandList, GraphicsDevice, ResourceHandle};
use crate::render::resources::materials::{Material, MaterialGpu, MaterialRegistry, SharedUniforms};
use crate::render::resources::uniforms::{LightBlock, TransformBlock, INSTANCE_FLOATS};
use crate::render::resources::{GpuMesh, MeshRegistry, RenderTargets};
use crate::render::RenderResult;
use crate::spatial::LightIndex;

/// Identity of a batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchKey {
    /// Mesh registry key
    pub mesh: String,
    /// Material name
    pub material: String,
}

impl BatchKey {
    /// Create a key
    pub fn new(mesh: impl Into<String>, material: impl Into<String>) -> Self {
        Self {
            mesh: mesh.into(),
            material: material.into(),
        }
    }
}

/// GPU submission state cached per batch
#[derive(Debug)]
pub struct BatchState {
    commands: CommandList,
    instance_buffer: Option<BufferHandle>,
}

impl BatchState {
    fn new(key: &BatchKey) -> Self {
        Self {
            commands: CommandList::new(format!("batch:{}:{}", key.mesh, key.material)),
            instance_buffer: None,
        }
    }

    /// The batch's cached command list
    pub fn commands(&self) -> &CommandList {
        &self.commands
    }

    /// Instance buffer, present once the batch has drawn instanced
    pub fn instance_buffer(&self) -> Option<BufferHandle> {
        self.instance_buffer
    }
}

/// Counters from one forward pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Batches submitted
    pub batches: usize,
    /// Draw calls issued
    pub draws: usize,
    /// Entities drawn
    pub instances: usize,
    /// Batches skipped because their mesh or material did not resolve
    pub skipped_batches: usize,
    /// Instances beyond the instance buffer capacity
    pub dropped_instances: usize,
}

/// Frame-wide inputs to the forward pass
pub struct ForwardInputs<'a> {
    /// Entity store
    pub world: &'a World,
    /// GPU meshes
    pub meshes: &'a MeshRegistry,
    /// Materials and shared uniforms
    pub materials: &'a MaterialRegistry,
    /// Light index
    pub lights: &'a LightIndex,
    /// Render targets
    pub targets: &'a RenderTargets,
    /// Active camera
    pub camera: &'a CameraView,
    /// Sun view-projection from the shadow fitter
    pub light_view_projection: &'a Mat4,
}

#[derive(Debug, Default)]
struct Scratch {
    block: TransformBlock,
    floats: Vec<f32>,
    instances: Vec<f32>,
    positions: Vec<Vec3>,
}

/// Mean of a set of positions, origin when empty
pub fn centroid(positions: &[Vec3]) -> Vec3 {
    if positions.is_empty() {
        return Vec3::zeros();
    }
    positions.iter().sum::<Vec3>() / positions.len() as f32
}

/// Batches visible drawables and records the forward pass
#[derive(Debug)]
pub struct DrawOrchestrator {
    states: HashMap<BatchKey, BatchState>,
    warned: HashSet<BatchKey>,
    overflow_warned: HashSet<BatchKey>,
    clear_commands: CommandList,
    resolve_commands: CommandList,
    scratch: Scratch,
    instance_capacity: usize,
    light_query_radius: f32,
    clear_color: [f32; 4],
    max_depth: usize,
}

impl DrawOrchestrator {
    /// Create an orchestrator from the render configuration
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            states: HashMap::new(),
            warned: HashSet::new(),
            overflow_warned: HashSet::new(),
            clear_commands: CommandList::new("frame_clear"),
            resolve_commands: CommandList::new("frame_resolve"),
            scratch: Scratch::default(),
            instance_capacity: config.instance_capacity,
            light_query_radius: config.light_query_radius,
            clear_color: config.clear_color,
            max_depth: config.max_hierarchy_depth,
        }
    }

    /// Cached state of a batch
    pub fn batch_state(&self, key: &BatchKey) -> Option<&BatchState> {
        self.states.get(key)
    }

    /// Number of batches with cached state
    pub fn cached_batches(&self) -> usize {
        self.states.len()
    }

    fn visible_drawables<'w>(world: &'w World) -> Vec<(&'w str, &'w str, Entity)> {
        let mut visible: Vec<_> = world
            .query::<DrawableComponent>()
            .filter(|(entity, _)| {
                world.is_active(*entity) && world.get::<RenderFlags>(*entity).is_some_and(|flags| flags.visible)
            })
            .map(|(entity, drawable)| (drawable.mesh.as_str(), drawable.material.as_str(), entity))
            .collect();
        visible.sort_unstable();
        visible
    }

    fn warn_unresolved(&mut self, key: &BatchKey, what: &str) {
        if self.warned.insert(key.clone()) {
            log::warn!("Skipping batch {}/{}: {} not resolved", key.mesh, key.material, what);
        } else {
            log::trace!("Skipping batch {}/{}: {} not resolved", key.mesh, key.material, what);
        }
    }

    /// Record and submit the whole forward pass
    pub fn render(&mut self, device: &mut dyn GraphicsDevice, inputs: &ForwardInputs<'_>) -> RenderResult<DrawStats> {
        let mut stats = DrawStats::default();

        self.clear_commands.begin();
        self.clear_commands.set_framebuffer(inputs.targets.framebuffer);
        self.clear_commands.clear_color(self.clear_color);
        self.clear_commands.clear_depth(1.0);
        self.clear_commands.end();
        device.submit_commands(&self.clear_commands)?;

        let visible = Self::visible_drawables(inputs.world);
        for group in visible.chunk_by(|a, b| a.0 == b.0 && a.1 == b.1) {
            let (mesh_key, material_key, _) = group[0];
            let key = BatchKey::new(mesh_key, material_key);

            let Some(material) = inputs.materials.get_by_name(material_key) else {
                self.warn_unresolved(&key, "material");
                stats.skipped_batches += 1;
                continue;
            };
            let Some(gpu) = material.gpu().copied() else {
                self.warn_unresolved(&key, "built material");
                stats.skipped_batches += 1;
                continue;
            };
            let Some(mesh) = inputs.meshes.get(mesh_key).copied() else {
                self.warn_unresolved(&key, "mesh");
                stats.skipped_batches += 1;
                continue;
            };

            let entities: Vec<Entity> = group.iter().map(|(_, _, entity)| *entity).collect();
            let instanced = material.is_instanced();
            if instanced && entities.len() > self.instance_capacity && self.overflow_warned.insert(key.clone()) {
                log::warn!(
                    "Batch {}/{} has {} instances; drawing the first {}",
                    key.mesh,
                    key.material,
                    entities.len(),
                    self.instance_capacity
                );
            }

            let state = match self.states.entry(key) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    log::debug!("New batch {}/{}", entry.key().mesh, entry.key().material);
                    let state = BatchState::new(entry.key());
                    entry.insert(state)
                }
            };
            if instanced && state.instance_buffer.is_none() {
                state.instance_buffer = Some(device.create_buffer(&BufferDescription {
                    size: self.instance_capacity * INSTANCE_FLOATS * std::mem::size_of::<f32>(),
                    usage: BufferUsage::Instance,
                    label: format!("{}_instances", state.commands.label()),
                })?);
            }

            let recorder = BatchRecorder {
                inputs,
                shared: inputs.materials.shared(),
                material,
                gpu,
                mesh,
                instance_capacity: self.instance_capacity,
                light_query_radius: self.light_query_radius,
                max_depth: self.max_depth,
            };
            let (draws, drawn) = recorder.record(state, &mut self.scratch, &entities);
            device.submit_commands(&state.commands)?;

            stats.batches += 1;
            stats.draws += draws;
            stats.instances += drawn;
            if instanced {
                stats.dropped_instances += entities.len().saturating_sub(self.instance_capacity);
            }
        }

        self.resolve_commands.begin();
        self.resolve_commands
            .copy_texture(inputs.targets.color, inputs.targets.color_copy);
        self.resolve_commands.end();
        device.submit_commands(&self.resolve_commands)?;
        device.wait_for_idle()?;

        log::debug!(
            "Forward pass: {} batches, {} draws, {} instances, {} skipped",
            stats.batches,
            stats.draws,
            stats.instances,
            stats.skipped_batches
        );
        Ok(stats)
    }

    /// Instance buffers of every cached batch, for shutdown
    pub fn drain_resources(&mut self) -> Vec<ResourceHandle> {
        self.states
            .drain()
            .filter_map(|(_, state)| state.instance_buffer.map(ResourceHandle::Buffer))
            .collect()
    }
}

struct BatchRecorder<'a> {
    inputs: &'a ForwardInputs<'a>,
    shared: &'a SharedUniforms,
    material: &'a Material,
    gpu: MaterialGpu,
    mesh: GpuMesh,
    instance_capacity: usize,
    light_query_radius: f32,
    max_depth: usize,
}

impl BatchRecorder<'_> {
    /// Record one batch; returns `(draw calls, entities drawn)`
    fn record(&self, state: &mut BatchState, scratch: &mut Scratch, entities: &[Entity]) -> (usize, usize) {
        let camera = self.inputs.camera;
        scratch.block = TransformBlock {
            view: camera.view,
            projection: camera.projection,
            view_projection: camera.view_projection,
            light_view_projection: *self.inputs.light_view_projection,
            ..TransformBlock::default()
        };

        let commands = &mut state.commands;
        commands.begin();
        commands.set_framebuffer(self.inputs.targets.framebuffer);
        commands.set_pipeline(self.gpu.pipeline);
        commands.set_resource_set(0, self.shared.set);
        commands.set_resource_set(1, self.gpu.resource_set);
        commands.set_vertex_buffer(0, self.mesh.vertex_buffer);
        commands.set_index_buffer(self.mesh.index_buffer);

        self.material.properties().pack_into(&mut scratch.floats);
        commands.update_buffer(self.shared.material, 0, &scratch.floats);

        let counts = match state.instance_buffer {
            Some(instance_buffer) if self.material.is_instanced() => {
                self.record_instanced(commands, scratch, instance_buffer, entities)
            }
            _ => self.record_individual(commands, scratch, entities),
        };
        commands.end();
        counts
    }

    fn upload_lights(&self, commands: &mut CommandList, scratch: &mut Scratch, position: Vec3) {
        let records = self.inputs.lights.get_nearby(position, self.light_query_radius);
        LightBlock::write_floats(&records, &mut scratch.floats);
        commands.update_buffer(self.shared.light, 0, &scratch.floats);
    }

    fn record_instanced(
        &self,
        commands: &mut CommandList,
        scratch: &mut Scratch,
        instance_buffer: BufferHandle,
        entities: &[Entity],
    ) -> (usize, usize) {
        scratch.instances.clear();
        scratch.positions.clear();
        for entity in entities.iter().take(self.instance_capacity) {
            let Some(world) = self.inputs.world.world_matrix(*entity, self.max_depth) else {
                continue;
            };
            scratch.instances.extend_from_slice(world.as_slice());
            scratch.positions.push(utils::translation_of(&world));
        }
        let count = scratch.positions.len();
        if count == 0 {
            return (0, 0);
        }

        commands.update_buffer(instance_buffer, 0, &scratch.instances);
        commands.set_vertex_buffer(1, instance_buffer);

        let center = centroid(&scratch.positions);
        self.upload_lights(commands, scratch, center);

        scratch.block.world = Mat4::identity();
        scratch.block.normal = Mat4::identity();
        scratch.block.write_floats(&mut scratch.floats);
        commands.update_buffer(self.shared.transform, 0, &scratch.floats);

        commands.draw_indexed(self.mesh.index_count, count as u32);
        (1, count)
    }

    fn record_individual(&self, commands: &mut CommandList, scratch: &mut Scratch, entities: &[Entity]) -> (usize, usize) {
        let mut draws = 0;
        for entity in entities {
            let Some(world) = self.inputs.world.world_matrix(*entity, self.max_depth) else {
                continue;
            };
            let normal = utils::normal_matrix(&world).unwrap_or_else(|| {
                log::trace!("Entity {} has a singular world matrix; identity normal matrix", entity);
                Mat4::identity()
            });

            self.upload_lights(commands, scratch, utils::translation_of(&world));

            scratch.block.world = world;
            scratch.block.normal = normal;
            scratch.block.write_floats(&mut scratch.floats);
            commands.update_buffer(self.shared.transform, 0, &scratch.floats);

            commands.draw_indexed(self.mesh.index_count, 1);
            draws += 1;
        }
        (draws, draws)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_centroid() {
        let points = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 4.0, 0.0), Vec3::new(4.0, 2.0, 6.0)];
        assert_relative_eq!(centroid(&points), Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(centroid(&[]), Vec3::zeros());
    }

    #[test]
    fn test_batch_keys_order_by_mesh_then_material() {
        let mut keys = vec![
            BatchKey::new("sphere", "lit"),
            BatchKey::new("cube", "unlit"),
            BatchKey::new("cube", "lit"),
        ];
        keys.sort();
        assert_eq!(keys[0], BatchKey::new("cube", "lit"));
        assert_eq!(keys[2], BatchKey::new("sphere", "lit"));
    }

    #[test]
    fn test_visible_drawables_grouped_and_filtered() {
        let mut world = World::new();
        let spawn = |world: &mut World, mesh: &str, visible: bool| {
            let entity = world.spawn();
            world.insert(entity, DrawableComponent::new(mesh, "lit"));
            world.insert(entity, RenderFlags { visible, casts_shadow: false });
            entity
        };
        let a = spawn(&mut world, "sphere", true);
        let b = spawn(&mut world, "cube", true);
        spawn(&mut world, "cube", false);
        let c = spawn(&mut world, "sphere", true);
        let d = spawn(&mut world, "cube", true);
        world.set_enabled(d, false);

        let visible = DrawOrchestrator::visible_drawables(&world);
        let entities: Vec<Entity> = visible.iter().map(|(_, _, entity)| *entity).collect();
        assert_eq!(entities, vec![b, a, c]);
    }
}
