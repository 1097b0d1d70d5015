//! Host-facing renderer facade
//!
//! [`RenderCore`] owns the device, the world and every registry, and runs the
//! frame scheduler once per [`RenderCore::tick`]. Hosts create entities and
//! resources through it so that mesh reference counts and the light index
//! stay in step with the world.

use std::any::Any;

use crate::config::RenderConfig;
use crate::ecs::components::{
    CameraComponent, DrawableComponent, LightComponent, NameComponent, RenderFlags, SceneId, SceneMembership,
    TransformComponent,
};
use crate::ecs::{Component, Entity, World};
use crate::foundation::math::{Transform, Vec3};
use crate::render::api::{sort_for_shutdown, GraphicsDevice, ResourceHandle, TextureHandle};
use crate::render::resources::materials::{MaterialId, MaterialRegistry, PropertyValue, ShaderDescriptor};
use crate::render::resources::{GpuMesh, MeshData, MeshRegistry, ModelDescription, RenderTargets};
use crate::render::systems::{FrameContext, FrameScheduler, FrameStats};
use crate::render::{RenderError, RenderResult};
use crate::spatial::LightIndex;

/// Mesh key an entity holds a reference on
struct MeshLease(String);

impl Component for MeshLease {}

/// The rendering core
pub struct RenderCore {
    device: Box<dyn GraphicsDevice>,
    config: RenderConfig,
    world: World,
    meshes: MeshRegistry,
    materials: MaterialRegistry,
    lights: LightIndex,
    targets: RenderTargets,
    scheduler: FrameScheduler,
    shut_down: bool,
}

impl RenderCore {
    /// Create the core: render targets, shared uniforms and the shadow material
    pub fn new(mut device: Box<dyn GraphicsDevice>, config: RenderConfig) -> RenderResult<Self> {
        config.validate()?;
        log::info!(
            "Initializing render core ({}x{}, {} lights, shadow map {})",
            config.extent.0,
            config.extent.1,
            config.max_lights,
            config.shadow.resolution
        );

        let targets = RenderTargets::new(device.as_mut(), config.extent, config.shadow.resolution)?;
        let mut materials = MaterialRegistry::new(device.as_mut(), targets.framebuffer, config.max_lights)?;
        materials.create_material(
            device.as_mut(),
            ShaderDescriptor::SHADOW_DEPTH,
            &ShaderDescriptor::shadow_depth(),
            Some(targets.shadow_framebuffer),
        )?;
        materials.set_shadow_map(device.as_mut(), targets.shadow_depth)?;

        Ok(Self {
            lights: LightIndex::new(&config.light_index, config.max_lights),
            scheduler: FrameScheduler::new(&config),
            device,
            config,
            world: World::new(),
            meshes: MeshRegistry::new(),
            materials,
            targets,
            shut_down: false,
        })
    }

    /// Configuration the core was created with
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Entity store
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable entity store
    ///
    /// Light changes made here are picked up by the next tick's light refresh.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Graphics device
    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    /// Graphics device as its concrete type
    pub fn device_as<T: Any>(&self) -> Option<&T> {
        self.device.as_any().downcast_ref::<T>()
    }

    /// Mutable graphics device as its concrete type
    pub fn device_as_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.device.as_any_mut().downcast_mut::<T>()
    }

    /// Materials
    pub fn materials(&self) -> &MaterialRegistry {
        &self.materials
    }

    /// GPU meshes
    pub fn meshes(&self) -> &MeshRegistry {
        &self.meshes
    }

    /// Light index
    pub fn lights(&self) -> &LightIndex {
        &self.lights
    }

    /// Render targets
    pub fn targets(&self) -> &RenderTargets {
        &self.targets
    }

    /// Frame scheduler
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Mutable frame scheduler (stage flags, active camera)
    pub fn scheduler_mut(&mut self) -> &mut FrameScheduler {
        &mut self.scheduler
    }

    /// Whether [`RenderCore::shutdown`] has run
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn ensure_running(&self) -> RenderResult<()> {
        if self.shut_down {
            return Err(RenderError::ResourceDisposed {
                kind: "render core",
                name: "device".to_string(),
            });
        }
        Ok(())
    }

    // Resources

    /// Create a material drawing into the main framebuffer, or return the
    /// existing one of that name
    pub fn create_material(&mut self, name: &str, descriptor: &ShaderDescriptor) -> RenderResult<MaterialId> {
        self.ensure_running()?;
        self.materials.create_material(self.device.as_mut(), name, descriptor, None)
    }

    /// Change a material property
    pub fn set_material_property(&mut self, material: &str, property: &str, value: PropertyValue) -> RenderResult<()> {
        self.ensure_running()?;
        self.materials.set_property(material, property, value)
    }

    /// Bind a texture to a material's texture resource
    pub fn bind_texture(&mut self, material: &str, resource: &str, texture: TextureHandle) -> RenderResult<()> {
        self.ensure_running()?;
        self.materials
            .bind_texture(self.device.as_mut(), material, resource, texture)
    }

    /// Upload decoded geometry under a key
    pub fn upload_mesh(&mut self, key: &str, data: &MeshData) -> RenderResult<GpuMesh> {
        self.ensure_running()?;
        self.meshes.upload(self.device.as_mut(), key, data)
    }

    /// Register buffers the host created on this core's device
    ///
    /// Returns the mesh previously registered under the key, which the
    /// caller now owns.
    pub fn register_mesh(&mut self, key: &str, mesh: GpuMesh) -> RenderResult<Option<GpuMesh>> {
        self.ensure_running()?;
        Ok(self.meshes.register(key, mesh))
    }

    // Entities

    /// Spawn a drawable at the origin
    ///
    /// The mesh and material are resolved by name every frame, so either may
    /// be registered after the entity exists.
    pub fn spawn(&mut self, name: &str, mesh: &str, material: &str, casts_shadow: bool) -> Entity {
        self.spawn_drawable(name, mesh, material, casts_shadow, TransformComponent::identity())
    }

    fn spawn_drawable(
        &mut self,
        name: &str,
        mesh: &str,
        material: &str,
        casts_shadow: bool,
        transform: TransformComponent,
    ) -> Entity {
        let entity = self.world.spawn();
        self.world.insert(entity, NameComponent::new(name));
        self.world.insert(entity, transform);
        self.world.insert(entity, DrawableComponent::new(mesh, material));
        self.world.insert(entity, RenderFlags::new(casts_shadow));
        if self.meshes.acquire(mesh) {
            self.world.insert(entity, MeshLease(mesh.to_string()));
        }
        log::trace!("Spawned drawable {} '{}' ({} / {})", entity, name, mesh, material);
        entity
    }

    /// Spawn one entity per model node, parented like the node graph
    ///
    /// `mesh_keys` maps the nodes' mesh indices to registered mesh keys; nodes
    /// without a resolvable mesh become plain transform entities.
    pub fn spawn_model(
        &mut self,
        name: &str,
        model: &ModelDescription,
        mesh_keys: &[&str],
        material: &str,
        casts_shadow: bool,
    ) -> Vec<Entity> {
        let mut entities: Vec<Entity> = Vec::with_capacity(model.nodes.len());
        for (index, node) in model.nodes.iter().enumerate() {
            let parent = match node.parent {
                Some(parent) if parent < index => Some(entities[parent]),
                Some(parent) => {
                    log::warn!(
                        "Model '{}': node {} names parent {} which does not precede it; left unparented",
                        name,
                        index,
                        parent
                    );
                    None
                }
                None => None,
            };
            let mut transform = TransformComponent::from_math_transform(&node.local);
            transform.parent = parent;

            let node_name = format!("{}/{}", name, node.name);
            let entity = match node.mesh.and_then(|mesh| mesh_keys.get(mesh)) {
                Some(mesh) => self.spawn_drawable(&node_name, mesh, material, casts_shadow, transform),
                None => {
                    let entity = self.world.spawn();
                    self.world.insert(entity, NameComponent::new(node_name));
                    self.world.insert(entity, transform);
                    entity
                }
            };
            entities.push(entity);
        }
        log::debug!("Spawned model '{}' with {} nodes", name, entities.len());
        entities
    }

    /// Create a perspective camera looking at `target`
    pub fn create_camera(
        &mut self,
        id: &str,
        position: Vec3,
        target: Vec3,
        fov_degrees: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Entity {
        let mut transform = TransformComponent::from_position(position);
        let direction = target - position;
        if direction.norm_squared() > 1e-12 {
            transform = transform.with_forward(direction.normalize());
        }

        let entity = self.world.spawn();
        self.world.insert(entity, NameComponent::new(id));
        self.world.insert(entity, transform);
        self.world.insert(entity, CameraComponent::new(id, fov_degrees, aspect, near, far));
        log::debug!("Created camera '{}' as {}", id, entity);
        entity
    }

    /// Create a light; it is registered in the light index right away
    pub fn create_light(&mut self, light: LightComponent, transform: TransformComponent) -> Entity {
        let entity = self.world.spawn();
        self.world.insert(entity, transform);
        self.world.insert(entity, light);
        self.scheduler
            .light_refresh_mut()
            .sync_entity(&self.world, &mut self.lights, entity);
        entity
    }

    /// Create a bare transform, e.g. as a parent for other entities
    pub fn create_transform(&mut self, transform: TransformComponent) -> Entity {
        let entity = self.world.spawn();
        self.world.insert(entity, transform);
        entity
    }

    /// Replace an entity's local transform, keeping its parent link
    pub fn set_transform(&mut self, entity: Entity, transform: &Transform) -> bool {
        let Some(current) = self.world.get_mut::<TransformComponent>(entity) else {
            return false;
        };
        current.position = transform.position;
        current.rotation = transform.rotation;
        current.scale = transform.scale;
        self.sync_lights();
        true
    }

    /// Re-parent an entity; `None` detaches it
    pub fn set_parent(&mut self, entity: Entity, parent: Option<Entity>) -> bool {
        let Some(current) = self.world.get_mut::<TransformComponent>(entity) else {
            return false;
        };
        current.parent = parent;
        self.sync_lights();
        true
    }

    /// Enable or disable an entity
    pub fn set_enabled(&mut self, entity: Entity, enabled: bool) -> bool {
        let changed = self.world.set_enabled(entity, enabled);
        self.sync_lights();
        changed
    }

    /// Tag an entity with a scene
    pub fn set_scene(&mut self, entity: Entity, scene: SceneId) -> bool {
        let tagged = self.world.insert(entity, SceneMembership { scene });
        self.sync_lights();
        tagged
    }

    /// Enable or disable every entity of a scene
    pub fn set_scene_enabled(&mut self, scene: SceneId, enabled: bool) {
        self.world.set_scene_enabled(scene, enabled);
        self.sync_lights();
    }

    // Transform and activity changes move children too, so every light is
    // re-checked; unchanged lights leave the index untouched.
    fn sync_lights(&mut self) {
        self.scheduler
            .light_refresh_mut()
            .refresh(&self.world, &mut self.lights);
    }

    /// Despawn an entity, releasing its mesh reference and its light
    ///
    /// Children keep their (now dangling) parent link and fall back to world
    /// space.
    pub fn dispose_entity(&mut self, entity: Entity) -> RenderResult<bool> {
        if !self.world.is_alive(entity) {
            return Ok(false);
        }
        if let Some(light) = self.world.get::<LightComponent>(entity) {
            let id = light.id;
            self.scheduler.light_refresh_mut().forget(&mut self.lights, id);
        }
        if let Some(MeshLease(key)) = self.world.remove::<MeshLease>(entity) {
            for resource in self.meshes.release(&key) {
                if !self.shut_down {
                    self.device.dispose(resource)?;
                }
            }
        }
        Ok(self.world.despawn(entity))
    }

    // Frame

    /// Run one frame
    pub fn tick(&mut self, delta_seconds: f32) -> RenderResult<FrameStats> {
        self.ensure_running()?;
        self.scheduler.tick(
            delta_seconds,
            FrameContext {
                device: self.device.as_mut(),
                world: &mut self.world,
                meshes: &self.meshes,
                materials: &self.materials,
                lights: &mut self.lights,
                targets: &self.targets,
            },
        )
    }

    /// Release every GPU resource and shut the device down
    ///
    /// Resources go in rank order: textures and samplers, framebuffers, sets,
    /// pipelines and layouts, then buffers. Calling it again is a no-op.
    pub fn shutdown(&mut self) -> RenderResult<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        log::info!("Shutting down render core");

        let mut first_error = self.device.wait_for_idle().err();

        let mut resources: Vec<ResourceHandle> = self.targets.resources();
        resources.extend(self.scheduler.draw_orchestrator_mut().drain_resources());
        resources.extend(self.materials.drain_resources());
        resources.extend(self.meshes.drain_resources());
        sort_for_shutdown(&mut resources);

        for resource in &resources {
            if let Err(e) = self.device.dispose(*resource) {
                log::error!("Failed to dispose {:?}: {}", resource, e);
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.device.shutdown() {
            first_error.get_or_insert(e);
        }

        log::info!("Render core shut down ({} resources released)", resources.len());
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for RenderCore {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Render core shutdown failed: {}", e);
        }
    }
}
