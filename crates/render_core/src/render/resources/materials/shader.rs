//! Shader descriptors
//!
//! A descriptor is everything the material system needs to build a pipeline:
//! fixed-function state, per-stage code, and the ordered lists of named
//! properties and resources. Descriptors are plain serde data and can be
//! loaded from `.ron` or `.toml` files through [`Config`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::render::{RenderError, RenderResult};

/// Shape of a material property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyShape {
    /// One float
    Scalar,
    /// Two floats
    Vec2,
    /// Three floats
    Vec3,
    /// Four floats
    Vec4,
}

impl PropertyShape {
    /// Number of floats the shape holds
    pub const fn component_count(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
        }
    }
}

/// Kind of a bound resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Uniform block
    UniformBuffer,
    /// Sampled texture
    Texture,
    /// Sampler
    Sampler,
}

/// Named, ordered material constant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderProperty {
    /// Property name
    pub name: String,
    /// Declaration order (packing order)
    pub order: u32,
    /// Value shape
    pub shape: PropertyShape,
}

/// Named, ordered resource binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderResource {
    /// Resource name
    pub name: String,
    /// Binding order
    pub order: u32,
    /// Resource kind
    pub kind: ResourceKind,
}

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    /// Vertex stage
    Vertex,
    /// Fragment stage
    Fragment,
}

/// Code for one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderStage {
    /// Stage
    pub stage: StageKind,
    /// Entry point name
    pub entry_point: String,
    /// Backend-specific code (source text or a path to compiled bytecode)
    pub code: String,
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CullMode {
    /// Draw both faces
    None,
    /// Cull back faces
    Back,
    /// Cull front faces
    Front,
}

/// Blending mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    /// Overwrite
    Opaque,
    /// Standard alpha blending
    Alpha,
    /// Additive
    Additive,
}

/// Fixed-function pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineState {
    /// Depth test enabled
    pub depth_test: bool,
    /// Depth writes enabled
    pub depth_write: bool,
    /// Face culling
    pub cull_mode: CullMode,
    /// Blending
    pub blend: BlendMode,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            cull_mode: CullMode::Back,
            blend: BlendMode::Opaque,
        }
    }
}

/// Complete description of a material's shader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderDescriptor {
    /// Descriptor name
    pub name: String,
    /// Fixed-function state
    pub pipeline: PipelineState,
    /// Stage code
    pub stages: Vec<ShaderStage>,
    /// Material constants
    pub properties: Vec<ShaderProperty>,
    /// Bound resources
    pub resources: Vec<ShaderResource>,
    /// Draw all instances of a batch with one instanced call
    pub instanced: bool,
}

impl Default for ShaderDescriptor {
    fn default() -> Self {
        Self::new("unnamed")
    }
}

impl Config for ShaderDescriptor {}

impl ShaderDescriptor {
    /// Name of the built-in shadow depth descriptor
    pub const SHADOW_DEPTH: &'static str = "shadow_depth";

    /// Descriptor with default state, vertex and fragment stages, and no
    /// properties or resources
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            stages: vec![
                ShaderStage {
                    stage: StageKind::Vertex,
                    entry_point: "main".to_string(),
                    code: format!("{name}.vert"),
                },
                ShaderStage {
                    stage: StageKind::Fragment,
                    entry_point: "main".to_string(),
                    code: format!("{name}.frag"),
                },
            ],
            name,
            pipeline: PipelineState::default(),
            properties: Vec::new(),
            resources: Vec::new(),
            instanced: false,
        }
    }

    /// Depth-only descriptor used by the shadow pass
    pub fn shadow_depth() -> Self {
        let mut descriptor = Self::new(Self::SHADOW_DEPTH);
        descriptor.stages.retain(|stage| stage.stage == StageKind::Vertex);
        descriptor.pipeline.cull_mode = CullMode::Front;
        descriptor
    }

    /// Builder pattern: append a property after the existing ones
    pub fn with_property(mut self, name: impl Into<String>, shape: PropertyShape) -> Self {
        let order = self.properties.iter().map(|p| p.order + 1).max().unwrap_or(0);
        self.properties.push(ShaderProperty {
            name: name.into(),
            order,
            shape,
        });
        self
    }

    /// Builder pattern: append a resource after the existing ones
    pub fn with_resource(mut self, name: impl Into<String>, kind: ResourceKind) -> Self {
        let order = self.resources.iter().map(|r| r.order + 1).max().unwrap_or(0);
        self.resources.push(ShaderResource {
            name: name.into(),
            order,
            kind,
        });
        self
    }

    /// Builder pattern: enable instanced drawing
    pub fn with_instancing(mut self, instanced: bool) -> Self {
        self.instanced = instanced;
        self
    }

    /// Builder pattern: set pipeline state
    pub fn with_pipeline_state(mut self, state: PipelineState) -> Self {
        self.pipeline = state;
        self
    }

    /// Properties sorted by declaration order
    pub fn ordered_properties(&self) -> Vec<&ShaderProperty> {
        let mut properties: Vec<_> = self.properties.iter().collect();
        properties.sort_by_key(|property| property.order);
        properties
    }

    /// Resources sorted by binding order
    pub fn ordered_resources(&self) -> Vec<&ShaderResource> {
        let mut resources: Vec<_> = self.resources.iter().collect();
        resources.sort_by_key(|resource| resource.order);
        resources
    }

    /// Reject duplicate names or orders and missing stages
    pub fn validate(&self) -> RenderResult<()> {
        let invalid = |reason: String| RenderError::InvalidShader {
            name: self.name.clone(),
            reason,
        };

        if !self.stages.iter().any(|stage| stage.stage == StageKind::Vertex) {
            return Err(invalid("no vertex stage".to_string()));
        }

        let mut names = HashSet::new();
        let mut orders = HashSet::new();
        for property in &self.properties {
            if !names.insert(property.name.as_str()) {
                return Err(invalid(format!("duplicate property '{}'", property.name)));
            }
            if !orders.insert(property.order) {
                return Err(invalid(format!("duplicate property order {}", property.order)));
            }
        }

        let mut names = HashSet::new();
        let mut orders = HashSet::new();
        for resource in &self.resources {
            if !names.insert(resource.name.as_str()) {
                return Err(invalid(format!("duplicate resource '{}'", resource.name)));
            }
            if !orders.insert(resource.order) {
                return Err(invalid(format!("duplicate resource order {}", resource.order)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_builder_assigns_increasing_orders() {
        let descriptor = ShaderDescriptor::new("lit")
            .with_property("roughness", PropertyShape::Scalar)
            .with_property("albedo", PropertyShape::Vec3)
            .with_resource("albedo_map", ResourceKind::Texture);

        let orders: Vec<_> = descriptor.ordered_properties().iter().map(|p| p.order).collect();
        assert_eq!(orders, vec![0, 1]);
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_ordered_properties_follow_order_not_position() {
        let mut descriptor = ShaderDescriptor::new("swapped");
        descriptor.properties = vec![
            ShaderProperty { name: "b".into(), order: 1, shape: PropertyShape::Vec4 },
            ShaderProperty { name: "a".into(), order: 0, shape: PropertyShape::Scalar },
        ];
        let names: Vec<_> = descriptor.ordered_properties().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_property_is_rejected() {
        let descriptor = ShaderDescriptor::new("dup")
            .with_property("tint", PropertyShape::Vec4)
            .with_property("tint", PropertyShape::Scalar);
        assert!(matches!(descriptor.validate(), Err(RenderError::InvalidShader { .. })));
    }

    #[test]
    fn test_shadow_depth_is_vertex_only() {
        let descriptor = ShaderDescriptor::shadow_depth();
        assert_eq!(descriptor.stages.len(), 1);
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_descriptor_parses_from_ron() {
        let text = r#"(
            name: "water",
            properties: [
                (name: "depth", order: 0, shape: Scalar),
                (name: "tint", order: 1, shape: Vec3),
            ],
            resources: [
                (name: "normals", order: 0, kind: Texture),
            ],
            instanced: true,
        )"#;
        let descriptor = ShaderDescriptor::from_str_with_format(text, ConfigFormat::Ron).unwrap();

        assert_eq!(descriptor.name, "water");
        assert_eq!(descriptor.properties.len(), 2);
        assert!(descriptor.instanced);
        assert_eq!(descriptor.pipeline, PipelineState::default());
    }
}
