//! Material registry
//!
//! Owns every material plus the GPU state they share: one single-slot buffer
//! each for the transform, material and light blocks, the common resource
//! layout that binds those three buffers (set slot 0), and the fallback
//! texture and samplers. Each material adds its own layout and resource set
//! for textures and samplers (set slot 1).
//!
//! `create_material` is idempotent by name: asking for an existing name
//! returns the existing material untouched, whatever descriptor is passed.

use std::collections::HashMap;

use slotmap::SlotMap;

use super::material::{Material, MaterialGpu, MaterialId};
use super::properties::{packed_len, PropertyValue};
use super::shader::{ResourceKind, ShaderDescriptor};
use crate::render::api::{
    BufferDescription, BufferHandle, BufferUsage, FramebufferHandle, GraphicsDevice, PipelineDescription,
    ResourceBinding, ResourceHandle, ResourceLayoutDescription, ResourceLayoutElement, ResourceLayoutHandle,
    ResourceSetDescription, ResourceSetHandle, SamplerDescription, SamplerFilter, SamplerHandle,
    TextureDescription, TextureFormat, TextureHandle, TextureUsage,
};
use crate::render::resources::uniforms::{
    material_block_byte_size, LightBlock, TransformBlock, MATERIAL_BLOCK_FLOATS,
};
use crate::render::{RenderError, RenderResult};

/// Resource name that receives the sun's shadow map
pub const SHADOW_MAP_RESOURCE: &str = "shadow_map";

/// Sampler resource name that receives the depth-comparison sampler
pub const SHADOW_SAMPLER_RESOURCE: &str = "shadow_sampler";

/// Buffers and bindings shared by every material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedUniforms {
    /// Transform block buffer
    pub transform: BufferHandle,
    /// Material block buffer
    pub material: BufferHandle,
    /// Light block buffer
    pub light: BufferHandle,
    /// Common layout (transform, material, light)
    pub layout: ResourceLayoutHandle,
    /// Common set bound at slot 0
    pub set: ResourceSetHandle,
}

/// Registry of named materials
pub struct MaterialRegistry {
    materials: SlotMap<MaterialId, Material>,
    by_name: HashMap<String, MaterialId>,
    bound_textures: HashMap<(String, String), TextureHandle>,
    shared: SharedUniforms,
    default_texture: TextureHandle,
    default_sampler: SamplerHandle,
    shadow_sampler: SamplerHandle,
    shadow_map: Option<TextureHandle>,
    default_target: FramebufferHandle,
    max_lights: usize,
    disposed: bool,
}

impl MaterialRegistry {
    /// Create the shared buffers, layout and fallback resources
    ///
    /// Materials created without an explicit target render into
    /// `default_target`.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        default_target: FramebufferHandle,
        max_lights: usize,
    ) -> RenderResult<Self> {
        let uniform = |size: usize, label: &str| BufferDescription {
            size,
            usage: BufferUsage::Uniform,
            label: label.to_string(),
        };
        let transform = device.create_buffer(&uniform(TransformBlock::byte_size(), "transform_block"))?;
        let material = device.create_buffer(&uniform(material_block_byte_size(), "material_block"))?;
        let light = device.create_buffer(&uniform(LightBlock::byte_size(max_lights), "light_block"))?;

        let element = |name: &str| ResourceLayoutElement {
            name: name.to_string(),
            kind: ResourceKind::UniformBuffer,
        };
        let layout = device.create_resource_layout(&ResourceLayoutDescription {
            elements: vec![element("transform"), element("material"), element("light")],
        })?;
        let set = device.create_resource_set(&ResourceSetDescription {
            layout,
            bindings: vec![
                ResourceBinding::Buffer(transform),
                ResourceBinding::Buffer(material),
                ResourceBinding::Buffer(light),
            ],
        })?;

        let default_texture = device.create_texture(&TextureDescription {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8,
            usage: TextureUsage::Sampled,
            label: "default_white".to_string(),
        })?;
        let default_sampler = device.create_sampler(&SamplerDescription {
            filter: SamplerFilter::Linear,
        })?;
        let shadow_sampler = device.create_sampler(&SamplerDescription {
            filter: SamplerFilter::Comparison,
        })?;

        log::debug!("Material registry ready ({} light slots)", max_lights);

        Ok(Self {
            materials: SlotMap::with_key(),
            by_name: HashMap::new(),
            bound_textures: HashMap::new(),
            shared: SharedUniforms {
                transform,
                material,
                light,
                layout,
                set,
            },
            default_texture,
            default_sampler,
            shadow_sampler,
            shadow_map: None,
            default_target,
            max_lights,
            disposed: false,
        })
    }

    /// Shared buffers and bindings
    pub fn shared(&self) -> &SharedUniforms {
        &self.shared
    }

    /// Light slots the light buffer was sized for
    pub fn max_lights(&self) -> usize {
        self.max_lights
    }

    /// Number of materials
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether no material exists
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Material by id
    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    /// Id registered under a name
    pub fn id_of(&self, name: &str) -> Option<MaterialId> {
        self.by_name.get(name).copied()
    }

    /// Material by name
    pub fn get_by_name(&self, name: &str) -> Option<&Material> {
        self.id_of(name).and_then(|id| self.materials.get(id))
    }

    /// Create and build a material, or return the existing one of that name
    pub fn create_material(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        descriptor: &ShaderDescriptor,
        target: Option<FramebufferHandle>,
    ) -> RenderResult<MaterialId> {
        if self.disposed {
            return Err(RenderError::ResourceDisposed {
                kind: "material registry",
                name: name.to_string(),
            });
        }
        if let Some(id) = self.id_of(name) {
            log::trace!("Material '{}' already exists; reusing it", name);
            return Ok(id);
        }

        descriptor.validate()?;
        let packed = packed_len(descriptor);
        if packed > MATERIAL_BLOCK_FLOATS {
            return Err(RenderError::InvalidShader {
                name: descriptor.name.clone(),
                reason: format!("properties pack to {packed} floats, block holds {MATERIAL_BLOCK_FLOATS}"),
            });
        }

        let mut material = Material::new(name, descriptor.clone());
        let gpu = self.build(device, name, descriptor, target.unwrap_or(self.default_target))?;
        material.mark_built(gpu)?;

        let id = self.materials.insert(material);
        self.by_name.insert(name.to_string(), id);
        log::info!(
            "Created material '{}' from shader '{}' ({} properties, instanced: {})",
            name,
            descriptor.name,
            descriptor.properties.len(),
            descriptor.instanced
        );
        Ok(id)
    }

    fn build(
        &self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        descriptor: &ShaderDescriptor,
        target: FramebufferHandle,
    ) -> RenderResult<MaterialGpu> {
        let outputs = device.framebuffer_outputs(target)?;

        let elements = descriptor
            .ordered_resources()
            .into_iter()
            .filter(|resource| resource.kind != ResourceKind::UniformBuffer)
            .map(|resource| ResourceLayoutElement {
                name: resource.name.clone(),
                kind: resource.kind,
            })
            .collect();
        let layout = device.create_resource_layout(&ResourceLayoutDescription { elements })?;
        let resource_set = self.create_material_set(device, name, descriptor, layout)?;

        let pipeline = device.create_pipeline(&PipelineDescription {
            label: name.to_string(),
            state: descriptor.pipeline,
            stages: descriptor.stages.clone(),
            layouts: vec![self.shared.layout, layout],
            outputs,
            instanced: descriptor.instanced,
        })?;

        Ok(MaterialGpu {
            pipeline,
            layout,
            resource_set,
        })
    }

    fn create_material_set(
        &self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        descriptor: &ShaderDescriptor,
        layout: ResourceLayoutHandle,
    ) -> RenderResult<ResourceSetHandle> {
        let bindings = descriptor
            .ordered_resources()
            .into_iter()
            .filter_map(|resource| match resource.kind {
                ResourceKind::UniformBuffer => None,
                ResourceKind::Texture => {
                    let bound = self
                        .bound_textures
                        .get(&(name.to_string(), resource.name.clone()))
                        .copied();
                    let shadow = (resource.name == SHADOW_MAP_RESOURCE)
                        .then_some(self.shadow_map)
                        .flatten();
                    Some(ResourceBinding::Texture(
                        bound.or(shadow).unwrap_or(self.default_texture),
                    ))
                }
                ResourceKind::Sampler => Some(ResourceBinding::Sampler(
                    if resource.name == SHADOW_SAMPLER_RESOURCE {
                        self.shadow_sampler
                    } else {
                        self.default_sampler
                    },
                )),
            })
            .collect();
        device.create_resource_set(&ResourceSetDescription { layout, bindings })
    }

    fn rebind(&mut self, device: &mut dyn GraphicsDevice, id: MaterialId) -> RenderResult<()> {
        let Some(material) = self.materials.get(id) else {
            return Ok(());
        };
        let Some(layout) = material.gpu().map(|gpu| gpu.layout) else {
            return Ok(());
        };
        let name = material.name().to_string();
        let descriptor = material.shader().clone();

        let set = self.create_material_set(device, &name, &descriptor, layout)?;
        if let Some(material) = self.materials.get_mut(id) {
            let previous = material.replace_resource_set(set)?;
            device.dispose(ResourceHandle::ResourceSet(previous))?;
        }
        Ok(())
    }

    /// Bind a texture to one of a material's texture resources
    pub fn bind_texture(
        &mut self,
        device: &mut dyn GraphicsDevice,
        material: &str,
        resource: &str,
        texture: TextureHandle,
    ) -> RenderResult<()> {
        let id = self
            .id_of(material)
            .ok_or_else(|| RenderError::MaterialNotFound(material.to_string()))?;
        let declared = self.materials[id]
            .shader()
            .resources
            .iter()
            .any(|r| r.name == resource && r.kind == ResourceKind::Texture);
        if !declared {
            return Err(RenderError::InvalidProperty {
                material: material.to_string(),
                property: resource.to_string(),
                reason: "no texture resource of that name".to_string(),
            });
        }

        self.bound_textures
            .insert((material.to_string(), resource.to_string()), texture);
        self.rebind(device, id)
    }

    /// Route the shadow map into every material declaring [`SHADOW_MAP_RESOURCE`]
    pub fn set_shadow_map(&mut self, device: &mut dyn GraphicsDevice, texture: TextureHandle) -> RenderResult<()> {
        self.shadow_map = Some(texture);
        let receivers: Vec<MaterialId> = self
            .materials
            .iter()
            .filter(|(_, material)| {
                material
                    .shader()
                    .resources
                    .iter()
                    .any(|resource| resource.name == SHADOW_MAP_RESOURCE)
            })
            .map(|(id, _)| id)
            .collect();
        for id in receivers {
            self.rebind(device, id)?;
        }
        Ok(())
    }

    /// Change a property value
    pub fn set_property(&mut self, material: &str, property: &str, value: PropertyValue) -> RenderResult<()> {
        let id = self
            .id_of(material)
            .ok_or_else(|| RenderError::MaterialNotFound(material.to_string()))?;
        self.materials[id]
            .properties_mut()
            .set(property, value)
            .map_err(|declared| RenderError::InvalidProperty {
                material: material.to_string(),
                property: property.to_string(),
                reason: match declared {
                    Some(shape) => format!("declared as {shape:?}, got {:?}", value.shape()),
                    None => "not declared by the shader".to_string(),
                },
            })
    }

    /// Dispose every material and the shared state, returning the handles to
    /// release; the registry refuses new materials afterwards
    pub fn drain_resources(&mut self) -> Vec<ResourceHandle> {
        let mut resources: Vec<ResourceHandle> = self
            .materials
            .values_mut()
            .flat_map(Material::mark_disposed)
            .collect();
        if !self.disposed {
            resources.extend([
                ResourceHandle::Texture(self.default_texture),
                ResourceHandle::Sampler(self.default_sampler),
                ResourceHandle::Sampler(self.shadow_sampler),
                ResourceHandle::ResourceSet(self.shared.set),
                ResourceHandle::ResourceLayout(self.shared.layout),
                ResourceHandle::Buffer(self.shared.transform),
                ResourceHandle::Buffer(self.shared.material),
                ResourceHandle::Buffer(self.shared.light),
            ]);
        }
        self.disposed = true;
        resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{FramebufferDescription, TextureDescription};
    use crate::render::backends::HeadlessDevice;
    use crate::render::resources::materials::{MaterialState, PropertyShape};

    fn setup() -> (HeadlessDevice, MaterialRegistry) {
        let mut device = HeadlessDevice::new();
        let color = device
            .create_texture(&TextureDescription {
                width: 4,
                height: 4,
                format: TextureFormat::Rgba16Float,
                usage: TextureUsage::RenderTarget,
                label: "color".into(),
            })
            .unwrap();
        let target = device
            .create_framebuffer(&FramebufferDescription {
                color: Some(color),
                depth: None,
                label: "target".into(),
            })
            .unwrap();
        let registry = MaterialRegistry::new(&mut device, target, 4).unwrap();
        (device, registry)
    }

    fn lit() -> ShaderDescriptor {
        ShaderDescriptor::new("lit")
            .with_property("gloss", PropertyShape::Scalar)
            .with_property("albedo", PropertyShape::Vec3)
            .with_resource("albedo_map", ResourceKind::Texture)
            .with_resource("albedo_sampler", ResourceKind::Sampler)
    }

    #[test]
    fn test_create_material_is_idempotent() {
        let (mut device, mut registry) = setup();
        let first = registry.create_material(&mut device, "X", &lit(), None).unwrap();
        let pipelines = device.live_pipeline_count();

        let other = ShaderDescriptor::new("other").with_property("tint", PropertyShape::Vec4);
        let second = registry.create_material(&mut device, "X", &other, None).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(device.live_pipeline_count(), pipelines);
        assert_eq!(registry.get(first).map(|m| m.shader().name.as_str()), Some("lit"));
    }

    #[test]
    fn test_built_material_has_defaults() {
        let (mut device, mut registry) = setup();
        let id = registry.create_material(&mut device, "stone", &lit(), None).unwrap();
        let material = registry.get(id).unwrap();

        assert_eq!(material.state(), MaterialState::Built);
        assert!(material.gpu().is_some());
        assert_eq!(material.properties().packed(), vec![1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_oversized_property_block_is_rejected() {
        let (mut device, mut registry) = setup();
        let mut descriptor = ShaderDescriptor::new("huge");
        for i in 0..20 {
            descriptor = descriptor.with_property(format!("p{i}"), PropertyShape::Vec4);
        }
        let result = registry.create_material(&mut device, "huge", &descriptor, None);
        assert!(matches!(result, Err(RenderError::InvalidShader { .. })));
        assert!(registry.get_by_name("huge").is_none());
    }

    #[test]
    fn test_set_property_validates_shape() {
        let (mut device, mut registry) = setup();
        registry.create_material(&mut device, "stone", &lit(), None).unwrap();

        assert!(registry.set_property("stone", "gloss", PropertyValue::Scalar(0.25)).is_ok());
        assert!(matches!(
            registry.set_property("stone", "gloss", PropertyValue::Vec2([0.0, 1.0])),
            Err(RenderError::InvalidProperty { .. })
        ));
        assert!(matches!(
            registry.set_property("missing", "gloss", PropertyValue::Scalar(0.0)),
            Err(RenderError::MaterialNotFound(_))
        ));
    }

    #[test]
    fn test_bind_texture_replaces_resource_set() {
        let (mut device, mut registry) = setup();
        let id = registry.create_material(&mut device, "stone", &lit(), None).unwrap();
        let before = registry.get(id).and_then(|m| m.gpu().map(|gpu| gpu.resource_set));

        let texture = device
            .create_texture(&TextureDescription {
                width: 8,
                height: 8,
                format: TextureFormat::Rgba8,
                usage: TextureUsage::Sampled,
                label: "stone_albedo".into(),
            })
            .unwrap();
        registry.bind_texture(&mut device, "stone", "albedo_map", texture).unwrap();

        let after = registry.get(id).and_then(|m| m.gpu().map(|gpu| gpu.resource_set));
        assert_ne!(before, after);
        assert!(device.is_disposed(ResourceHandle::ResourceSet(before.unwrap())));
        assert!(registry.bind_texture(&mut device, "stone", "albedo_sampler", texture).is_err());
    }

    #[test]
    fn test_registry_refuses_materials_after_drain() {
        let (mut device, mut registry) = setup();
        let id = registry.create_material(&mut device, "stone", &lit(), None).unwrap();
        let resources = registry.drain_resources();

        assert!(resources.len() >= 11);
        assert_eq!(registry.get(id).map(Material::state), Some(MaterialState::Disposed));
        assert!(matches!(
            registry.create_material(&mut device, "fresh", &lit(), None),
            Err(RenderError::ResourceDisposed { .. })
        ));
    }
}
