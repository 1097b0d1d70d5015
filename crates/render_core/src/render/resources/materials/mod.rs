//! Material system
//!
//! Shader descriptors, property packing, material lifecycle and the registry
//! that owns shared uniform state.

pub mod material;
pub mod material_registry;
pub mod properties;
pub mod shader;

pub use material::{Material, MaterialGpu, MaterialId, MaterialState};
pub use material_registry::{MaterialRegistry, SharedUniforms, SHADOW_MAP_RESOURCE, SHADOW_SAMPLER_RESOURCE};
pub use properties::{pack_values, packed_len, MaterialProperties, PropertyValue};
pub use shader::{
    BlendMode, CullMode, PipelineState, PropertyShape, ResourceKind, ShaderDescriptor, ShaderProperty,
    ShaderResource, ShaderStage, StageKind,
};
