//! GPU-facing resources: materials, meshes, uniform blocks and render targets

pub mod materials;
pub mod mesh;
pub mod targets;
pub mod uniforms;

pub use mesh::{GpuMesh, MeshData, MeshRegistry, ModelDescription, ModelNode, Vertex};
pub use targets::RenderTargets;
pub use uniforms::{LightBlock, TransformBlock, INSTANCE_FLOATS, MATERIAL_BLOCK_FLOATS};
